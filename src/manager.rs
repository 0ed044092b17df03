//! Provisioning of replicated simulation groups.
//!
//! Each group is one simulation bridge, one static asset host serving the
//! viewer, and the mixer and analyzer drivers that talk to that bridge.

use std::sync::Arc;
use tracing::{error, info};

use crate::assets::{AssetError, AssetHost};
use crate::bridge::{BridgeConfig, BridgeError, BridgeHandle, Simulation, SimulationBridge};
use crate::config::{instance_port, SimulationConfig, TimingConfig};
use crate::driver::Driver;
use crate::drivers::{ColorAnalyzerDriver, ColorMixerDriver};

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Simulation groups are already initialized")]
    AlreadyInitialized,
    #[error("Simulation {instance}: {source}")]
    Bridge {
        instance: usize,
        source: BridgeError,
    },
    #[error("Simulation {instance}: {source}")]
    Assets {
        instance: usize,
        source: AssetError,
    },
}

/// One running simulation group.
#[derive(Debug)]
pub struct SimulationGroup {
    index: usize,
    bridge: BridgeHandle,
    assets: AssetHost,
}

impl SimulationGroup {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn bridge(&self) -> Arc<SimulationBridge> {
        self.bridge.bridge()
    }

    pub fn bridge_port(&self) -> u16 {
        self.bridge.local_addr().port()
    }

    pub fn asset_port(&self) -> u16 {
        self.assets.local_addr().port()
    }

    pub fn viewer_url(&self) -> String {
        self.assets.viewer_url(self.bridge_port())
    }

    async fn shutdown(self) {
        self.assets.shutdown().await;
        self.bridge.shutdown().await;
    }
}

/// A driver to be exposed on its own command server.
pub struct DeviceBinding {
    pub name: String,
    pub port: u16,
    pub driver: Arc<dyn Driver>,
}

impl std::fmt::Debug for DeviceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBinding")
            .field("name", &self.name)
            .field("port", &self.port)
            .field("kind", &self.driver.kind())
            .finish()
    }
}

#[derive(Debug)]
pub struct SimulationGroupManager {
    host: String,
    config: SimulationConfig,
    timing: TimingConfig,
    groups: Vec<SimulationGroup>,
}

impl SimulationGroupManager {
    pub fn new(host: impl Into<String>, config: SimulationConfig, timing: TimingConfig) -> Self {
        Self {
            host: host.into(),
            config,
            timing,
            groups: Vec::new(),
        }
    }

    /// Start every bridge and asset host. On failure everything started so far is stopped.
    pub async fn initialize(&mut self) -> Result<(), ManagerError> {
        if !self.groups.is_empty() {
            return Err(ManagerError::AlreadyInitialized);
        }

        for index in 0..self.config.instances {
            match self.start_group(index).await {
                Ok(group) => {
                    info!(
                        "🌊 Simulation {} ready: bridge port {}, viewer {}",
                        index + 1,
                        group.bridge_port(),
                        group.viewer_url()
                    );
                    self.groups.push(group);
                }
                Err(e) => {
                    error!("Failed to start simulation {}: {}", index + 1, e);
                    self.stop_groups().await;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn start_group(&self, index: usize) -> Result<SimulationGroup, ManagerError> {
        let bridge_addr = format!(
            "{}:{}",
            self.host,
            instance_port(self.config.base_bridge_port, index, 1)
        );
        let bridge_config = BridgeConfig {
            compute_timeout: self.config.compute_timeout(),
        };
        let bridge = SimulationBridge::start(&bridge_addr, bridge_config)
            .await
            .map_err(|source| ManagerError::Bridge {
                instance: index + 1,
                source,
            })?;

        let asset_addr = format!(
            "{}:{}",
            self.host,
            instance_port(self.config.base_asset_port, index, 1)
        );
        // The bridge handle drops (and stops) on the error path.
        let assets = AssetHost::start(
            &asset_addr,
            self.config.asset_dir.clone(),
            self.config.viewer_page.clone(),
        )
        .await
        .map_err(|source| ManagerError::Assets {
            instance: index + 1,
            source,
        })?;

        Ok(SimulationGroup {
            index,
            bridge,
            assets,
        })
    }

    pub fn groups(&self) -> &[SimulationGroup] {
        &self.groups
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Analyzer and mixer drivers for every group, with the ports their servers should use.
    pub fn simulation_devices(&self) -> Vec<DeviceBinding> {
        let mut devices = Vec::with_capacity(self.groups.len() * 2);
        for group in &self.groups {
            let simulation: Arc<dyn Simulation> = group.bridge();
            let instance = group.index + 1;
            devices.push(DeviceBinding {
                name: format!("color_analyzer_{instance}"),
                port: instance_port(self.config.base_device_port, group.index, 2),
                driver: Arc::new(ColorAnalyzerDriver::new(
                    Arc::clone(&simulation),
                    self.timing.clone(),
                )),
            });
            devices.push(DeviceBinding {
                name: format!("color_mixer_{instance}"),
                port: instance_port(self.config.base_device_port, 2 * group.index + 1, 1),
                driver: Arc::new(ColorMixerDriver::new(simulation, self.timing.clone())),
            });
        }
        devices
    }

    pub async fn shutdown(mut self) {
        self.stop_groups().await;
        info!("All simulation groups stopped");
    }

    async fn stop_groups(&mut self) {
        for group in self.groups.drain(..) {
            group.shutdown().await;
        }
    }
}
