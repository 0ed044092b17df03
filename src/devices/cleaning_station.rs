use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use super::{is_truthy, Container, DeviceError, DeviceLink, LabDevice};

#[derive(Debug, Default)]
pub struct CleaningStationDevice {
    link: DeviceLink,
}

impl CleaningStationDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clean the container; it is only marked clean if the station reports success.
    pub async fn clean(&mut self, container: &mut Container, duration_sec: f64) -> Result<(), DeviceError> {
        let result = self
            .link
            .call("clean", json!({ "duration_sec": duration_sec }))
            .await?;
        if is_truthy(&result) {
            container.mark_clean();
            info!("🧽 Container {} cleaned", container.id());
        }
        Ok(())
    }
}

#[async_trait]
impl LabDevice for CleaningStationDevice {
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
