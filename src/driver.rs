//! Device driver contract used by the command server.
//!
//! A driver publishes a fixed set of operation names and dispatches a call
//! to a typed handler through an explicit `match`. The server only forwards
//! names that appear in [`Driver::operations`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("{operation}: invalid parameters: {reason}")]
    InvalidParams {
        operation: &'static str,
        reason: String,
    },
    #[error("{operation}: invalid argument: {reason}")]
    InvalidArgument {
        operation: &'static str,
        reason: String,
    },
    #[error("Unknown operation {0}")]
    UnknownOperation(String),
    #[error("Device failure: {0}")]
    Failure(String),
}

#[async_trait]
pub trait Driver: Send + Sync {
    /// Device type name, used in logs.
    fn kind(&self) -> &'static str;

    /// Every operation name this driver accepts.
    fn operations(&self) -> &'static [&'static str];

    /// Run one operation. Callers must check [`Driver::supports`] first.
    async fn invoke(&self, operation: &str, params: Map<String, Value>) -> Result<Value, DriverError>;

    fn supports(&self, operation: &str) -> bool {
        self.operations().contains(&operation)
    }
}

/// Decode a params map into an operation's argument struct.
///
/// Argument structs use `deny_unknown_fields`, so both extra and missing
/// keys surface here.
pub fn decode_args<T: DeserializeOwned>(
    operation: &'static str,
    params: Map<String, Value>,
) -> Result<T, DriverError> {
    serde_json::from_value(Value::Object(params)).map_err(|e| DriverError::InvalidParams {
        operation,
        reason: e.to_string(),
    })
}

/// Convert a seconds argument into a `Duration`, rejecting negative,
/// non-finite and out-of-range values.
pub fn checked_seconds(operation: &'static str, name: &str, seconds: f64) -> Result<Duration, DriverError> {
    Duration::try_from_secs_f64(seconds).map_err(|_| DriverError::InvalidArgument {
        operation,
        reason: format!("{name} must be a non-negative number of seconds, got {seconds}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        #[allow(dead_code)]
        duration_sec: f64,
    }

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_decode_args_rejects_extra_keys() {
        let result: Result<Args, _> = decode_args("clean", params(json!({"duration_sec": 1, "speed": 2})));
        let message = result.unwrap_err().to_string();
        assert!(message.contains("unknown field `speed`"), "{message}");
    }

    #[test]
    fn test_decode_args_rejects_missing_keys() {
        let result: Result<Args, _> = decode_args("clean", Map::new());
        let message = result.unwrap_err().to_string();
        assert!(message.contains("missing field `duration_sec`"), "{message}");
    }

    #[test]
    fn test_checked_seconds() {
        assert_eq!(checked_seconds("mix", "mixing_time", 2.5).unwrap(), Duration::from_millis(2500));
        assert!(checked_seconds("mix", "mixing_time", -1.0).is_err());
        assert!(checked_seconds("mix", "mixing_time", f64::NAN).is_err());
        assert!(checked_seconds("mix", "mixing_time", f64::INFINITY).is_err());
        assert!(checked_seconds("clean", "duration_sec", 1e20).is_err());
    }
}
