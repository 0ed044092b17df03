use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Container, DeviceError, DeviceLink, LabDevice};
use crate::drivers::MixRecipe;

#[derive(Debug, Default)]
pub struct ColorMixerDevice {
    link: DeviceLink,
}

impl ColorMixerDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the recipe in the container, then run the mix remotely.
    pub async fn mix(&mut self, container: &mut Container, recipe: &MixRecipe) -> Result<(), DeviceError> {
        let params = serde_json::to_value(recipe).map_err(|e| DeviceError::InvalidParameter {
            name: "recipe",
            reason: e.to_string(),
        })?;
        container.record_recipe(recipe);
        self.link.call("mix", params).await?;
        Ok(())
    }
}

#[async_trait]
impl LabDevice for ColorMixerDevice {
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
