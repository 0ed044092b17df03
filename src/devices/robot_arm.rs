use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use super::{is_truthy, Container, DeviceError, DeviceLink, LabDevice};

/// Where the arm parks between moves.
pub const HOME_LOCATION: &str = "center";

#[derive(Debug)]
pub struct RobotArmDevice {
    link: DeviceLink,
    arm_location: String,
}

impl Default for RobotArmDevice {
    fn default() -> Self {
        Self {
            link: DeviceLink::default(),
            arm_location: HOME_LOCATION.to_string(),
        }
    }
}

impl RobotArmDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm_location(&self) -> &str {
        &self.arm_location
    }

    async fn move_arm(&mut self, from: &str, to: &str) -> Result<(), DeviceError> {
        self.link
            .call("move", json!({ "from_location": from, "to_location": to }))
            .await?;
        self.arm_location = to.to_string();
        Ok(())
    }

    /// Fetch the container, carry it to `target` and park the arm again.
    /// Nothing moves when the container is already there.
    pub async fn move_container(&mut self, container: &mut Container, target: &str) -> Result<(), DeviceError> {
        if container.location() == target {
            return Ok(());
        }

        let source = container.location().to_string();
        if self.arm_location != source {
            let from = self.arm_location.clone();
            self.move_arm(&from, &source).await?;
        }

        self.move_arm(&source, target).await?;
        container.move_to(target);
        info!("🦾 Container {} moved from {} to {}", container.id(), source, target);

        if self.arm_location != HOME_LOCATION {
            let from = self.arm_location.clone();
            self.move_arm(&from, HOME_LOCATION).await?;
        }
        Ok(())
    }

    pub async fn empty_container(&mut self, container: &mut Container, location: &str) -> Result<(), DeviceError> {
        self.move_container(container, location).await?;
        let result = self.link.call("empty", json!({})).await?;
        if is_truthy(&result) {
            container.empty();
        }
        Ok(())
    }
}

#[async_trait]
impl LabDevice for RobotArmDevice {
    async fn initialize(&mut self, params: &Map<String, Value>) -> Result<(), DeviceError> {
        self.link.open(params).await?;
        self.arm_location = HOME_LOCATION.to_string();
        Ok(())
    }

    async fn cleanup(&mut self) {
        self.link.close().await;
    }

    fn report(&self) -> Map<String, Value> {
        let mut report = Map::new();
        report.insert("arm_location".to_string(), Value::String(self.arm_location.clone()));
        report
    }
}
