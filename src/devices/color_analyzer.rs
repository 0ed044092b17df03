use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use super::{Container, DeviceError, DeviceLink, LabDevice};
use crate::bridge::Rgb;

#[derive(Debug, Default)]
pub struct ColorAnalyzerDevice {
    link: DeviceLink,
}

impl ColorAnalyzerDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn analyze(&mut self, container: &Container) -> Result<Rgb, DeviceError> {
        let value = self.link.call("analyze", json!({})).await?;
        let [r, g, b]: [i64; 3] = serde_json::from_value(value.clone())
            .map_err(|_| DeviceError::UnexpectedResult {
                function: "analyze",
                value,
            })?;
        let rgb = Rgb::new(r, g, b);
        info!("🔬 Container {} analyzed as {:?}", container.id(), rgb);
        Ok(rgb)
    }
}

#[async_trait]
impl LabDevice for ColorAnalyzerDevice {
    async fn initialize(&mut self, params: &Map<String, Value>) -> Result<(), DeviceError> {
        self.link.open(params).await
    }

    async fn cleanup(&mut self) {
        self.link.close().await;
    }

    fn report(&self) -> Map<String, Value> {
        Map::new()
    }
}
