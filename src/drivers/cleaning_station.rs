use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::driver::{checked_seconds, decode_args, Driver, DriverError};

const OPERATIONS: &[&str] = &["clean"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CleanArgs {
    duration_sec: f64,
}

/// Self-contained cleaning station: cleaning is just a wait.
#[derive(Debug, Clone, Default)]
pub struct CleaningStationDriver {
    skip_wait: bool,
}

impl CleaningStationDriver {
    pub fn new(skip_wait: bool) -> Self {
        Self { skip_wait }
    }

    pub async fn clean(&self, duration_sec: f64) -> Result<bool, DriverError> {
        let duration = checked_seconds("clean", "duration_sec", duration_sec)?;
        info!("🧽 Cleaning for {:?}", duration);
        if !self.skip_wait {
            super::wait(duration).await;
        }
        Ok(true)
    }
}

#[async_trait]
impl Driver for CleaningStationDriver {
    fn kind(&self) -> &'static str {
        "cleaning_station"
    }

    fn operations(&self) -> &'static [&'static str] {
        OPERATIONS
    }

    async fn invoke(&self, operation: &str, params: Map<String, Value>) -> Result<Value, DriverError> {
        match operation {
            "clean" => {
                let args: CleanArgs = decode_args("clean", params)?;
                Ok(Value::Bool(self.clean(args.duration_sec).await?))
            }
            other => Err(DriverError::UnknownOperation(other.to_string())),
        }
    }
}
