//! Device drivers dispatched by the command server.

pub mod cleaning_station;
pub mod color_analyzer;
pub mod color_mixer;
pub mod robot_arm;

pub use cleaning_station::CleaningStationDriver;
pub use color_analyzer::ColorAnalyzerDriver;
pub use color_mixer::{ColorMixerDriver, MixRecipe};
pub use robot_arm::RobotArmDriver;

use serde_json::{Map, Value};
use std::time::Duration;

// A zero wait still yields, which keeps fast runs cooperative.
pub(crate) async fn wait(duration: Duration) {
    if duration.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(duration).await;
    }
}

pub(crate) fn expect_no_params(
    operation: &'static str,
    params: &Map<String, Value>,
) -> Result<(), crate::driver::DriverError> {
    match params.keys().next() {
        None => Ok(()),
        Some(key) => Err(crate::driver::DriverError::InvalidParams {
            operation,
            reason: format!("unexpected parameter `{key}`"),
        }),
    }
}
