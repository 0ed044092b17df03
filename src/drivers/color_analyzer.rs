use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::bridge::{Rgb, Simulation};
use crate::config::TimingConfig;
use crate::driver::{Driver, DriverError};

const OPERATIONS: &[&str] = &["analyze"];

/// Reads the average color of the simulation.
///
/// When the simulation does not answer in time the result is black rather
/// than an error; callers see `[0, 0, 0]`.
pub struct ColorAnalyzerDriver {
    simulation: Arc<dyn Simulation>,
    timing: TimingConfig,
}

impl std::fmt::Debug for ColorAnalyzerDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorAnalyzerDriver").field("timing", &self.timing).finish_non_exhaustive()
    }
}

impl ColorAnalyzerDriver {
    pub fn new(simulation: Arc<dyn Simulation>, timing: TimingConfig) -> Self {
        Self { simulation, timing }
    }

    pub async fn analyze(&self) -> Rgb {
        let color = self.simulation.compute_average_color().await;
        super::wait(self.timing.analyze_settle()).await;
        match color {
            Some(color) => {
                info!("🔬 Analyzed color {:?}", color);
                color
            }
            None => {
                warn!("No average color from simulation, reporting black");
                Rgb::BLACK
            }
        }
    }
}

#[async_trait]
impl Driver for ColorAnalyzerDriver {
    fn kind(&self) -> &'static str {
        "color_analyzer"
    }

    fn operations(&self) -> &'static [&'static str] {
        OPERATIONS
    }

    async fn invoke(&self, operation: &str, params: Map<String, Value>) -> Result<Value, DriverError> {
        match operation {
            "analyze" => {
                super::expect_no_params("analyze", &params)?;
                Ok(json!(self.analyze().await.to_array()))
            }
            other => Err(DriverError::UnknownOperation(other.to_string())),
        }
    }
}
