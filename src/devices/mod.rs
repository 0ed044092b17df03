//! Orchestration-side devices.
//!
//! These wrap a [`DeviceClient`] pointed at a device server and keep the
//! bookkeeping an experiment runner needs: container contents and where the
//! robot arm currently is.

pub mod cleaning_station;
pub mod color_analyzer;
pub mod color_mixer;
pub mod container;
pub mod robot_arm;

pub use cleaning_station::CleaningStationDevice;
pub use color_analyzer::ColorAnalyzerDevice;
pub use color_mixer::ColorMixerDevice;
pub use container::{Container, PigmentLoad};
pub use robot_arm::RobotArmDevice;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::client::{ClientError, DeviceClient};
use crate::config::DEFAULT_HOST;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Missing initialization parameter `{0}`")]
    MissingParameter(&'static str),
    #[error("Invalid initialization parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Device is not initialized")]
    NotInitialized,
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("Unexpected result from {function}: {value}")]
    UnexpectedResult { function: &'static str, value: Value },
}

/// Lifecycle every orchestration-side device follows.
#[async_trait]
pub trait LabDevice: Send {
    /// Connect using `port` and the optional `host` and `timeout_secs` parameters.
    async fn initialize(&mut self, params: &Map<String, Value>) -> Result<(), DeviceError>;

    async fn cleanup(&mut self);

    fn report(&self) -> Map<String, Value>;
}

/// Client connection shared by the device wrappers.
#[derive(Debug, Default)]
pub struct DeviceLink {
    client: Option<DeviceClient>,
}

impl DeviceLink {
    pub fn is_open(&self) -> bool {
        self.client.as_ref().is_some_and(DeviceClient::is_open)
    }

    pub async fn open(&mut self, params: &Map<String, Value>) -> Result<(), DeviceError> {
        let port = port_param(params)?;
        let host = match params.get("host") {
            None => DEFAULT_HOST,
            Some(Value::String(host)) => host.as_str(),
            Some(other) => {
                return Err(DeviceError::InvalidParameter {
                    name: "host",
                    reason: format!("expected a string, got {other}"),
                })
            }
        };
        let mut client = match params.get("timeout_secs") {
            None => DeviceClient::new(host, port),
            Some(value) => {
                let timeout = value
                    .as_f64()
                    .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                    .filter(|timeout| !timeout.is_zero())
                    .ok_or_else(|| DeviceError::InvalidParameter {
                        name: "timeout_secs",
                        reason: format!("expected a positive number, got {value}"),
                    })?;
                DeviceClient::with_timeout(host, port, timeout)
            }
        };
        client.open().await?;
        self.client = Some(client);
        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.close().await;
        }
    }

    pub async fn call(&mut self, function: &str, params: Value) -> Result<Value, DeviceError> {
        let client = self.client.as_mut().ok_or(DeviceError::NotInitialized)?;
        debug!("Calling {} on {}", function, client.addr());
        Ok(client.call(function, params).await?)
    }
}

fn port_param(params: &Map<String, Value>) -> Result<u16, DeviceError> {
    let value = params.get("port").ok_or(DeviceError::MissingParameter("port"))?;
    let port = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    };
    port.ok_or_else(|| DeviceError::InvalidParameter {
        name: "port",
        reason: format!("expected a port number, got {value}"),
    })
}

/// Success values the device servers return for boolean operations.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_port_param_accepts_numbers_and_strings() {
        assert_eq!(port_param(&params(json!({"port": 5001}))).unwrap(), 5001);
        assert_eq!(port_param(&params(json!({"port": "5002"}))).unwrap(), 5002);
    }

    #[test]
    fn test_port_param_rejects_bad_values() {
        assert!(matches!(
            port_param(&Map::new()),
            Err(DeviceError::MissingParameter("port"))
        ));
        assert!(port_param(&params(json!({"port": 70000}))).is_err());
        assert!(port_param(&params(json!({"port": [1]}))).is_err());
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!([0, 0, 0])));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&Value::Null));
    }

    #[tokio::test]
    async fn test_call_before_initialize() {
        let mut link = DeviceLink::default();
        let err = link.call("clean", json!({})).await.unwrap_err();
        assert!(matches!(err, DeviceError::NotInitialized));
    }
}
