use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::info;

use crate::driver::{decode_args, Driver, DriverError};

const OPERATIONS: &[&str] = &["move", "empty"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MoveArgs {
    from_location: String,
    to_location: String,
}

/// Robot arm with fixed-duration moves. It never talks to a simulation.
#[derive(Debug, Clone)]
pub struct RobotArmDriver {
    move_duration: Duration,
}

impl RobotArmDriver {
    pub fn new(move_duration: Duration) -> Self {
        Self { move_duration }
    }

    pub async fn move_between(&self, from_location: &str, to_location: &str) -> bool {
        info!("🦾 Moving from {} to {}", from_location, to_location);
        super::wait(self.move_duration).await;
        true
    }

    pub async fn empty(&self) -> bool {
        info!("🦾 Emptying container");
        super::wait(self.move_duration).await;
        true
    }
}

#[async_trait]
impl Driver for RobotArmDriver {
    fn kind(&self) -> &'static str {
        "robot_arm"
    }

    fn operations(&self) -> &'static [&'static str] {
        OPERATIONS
    }

    async fn invoke(&self, operation: &str, params: Map<String, Value>) -> Result<Value, DriverError> {
        match operation {
            "move" => {
                let args: MoveArgs = decode_args("move", params)?;
                Ok(Value::Bool(self.move_between(&args.from_location, &args.to_location).await))
            }
            "empty" => {
                super::expect_no_params("empty", &params)?;
                Ok(Value::Bool(self.empty().await))
            }
            other => Err(DriverError::UnknownOperation(other.to_string())),
        }
    }
}
