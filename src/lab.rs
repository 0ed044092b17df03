//! The whole lab in one process: static device servers plus every simulation group.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ConfigError, LabConfig};
use crate::drivers::{CleaningStationDriver, RobotArmDriver};
use crate::manager::{DeviceBinding, ManagerError, SimulationGroupManager};
use crate::server::{CommandServer, ServerError, ServerHandle};

#[derive(Debug, thiserror::Error)]
pub enum LabError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error(transparent)]
    Server(#[from] ServerError),
}

#[derive(Debug)]
pub struct Lab {
    manager: SimulationGroupManager,
    servers: Vec<ServerHandle>,
}

impl Lab {
    pub async fn start(config: LabConfig) -> Result<Self, LabError> {
        config.validate()?;

        let mut manager =
            SimulationGroupManager::new(config.host.clone(), config.simulation.clone(), config.timing.clone());
        manager.initialize().await?;

        let mut devices = vec![
            DeviceBinding {
                name: "cleaning_station".to_string(),
                port: config.cleaning_station_port,
                driver: Arc::new(CleaningStationDriver::new(config.timing.skip_cleaning_wait)),
            },
            DeviceBinding {
                name: "robot_arm".to_string(),
                port: config.robot_arm_port,
                driver: Arc::new(RobotArmDriver::new(config.timing.robot_move())),
            },
        ];
        devices.extend(manager.simulation_devices());

        let mut servers = Vec::with_capacity(devices.len());
        for device in devices {
            let addr = format!("{}:{}", config.host, device.port);
            match CommandServer::bind(device.name, &addr, device.driver).await {
                Ok(server) => servers.push(server.spawn()),
                Err(e) => {
                    warn!("Lab startup failed, stopping {} servers: {}", servers.len(), e);
                    for server in servers {
                        server.shutdown().await;
                    }
                    manager.shutdown().await;
                    return Err(e.into());
                }
            }
        }

        info!("🧪 Lab ready with {} device servers", servers.len());
        Ok(Self { manager, servers })
    }

    pub fn manager(&self) -> &SimulationGroupManager {
        &self.manager
    }

    pub fn servers(&self) -> &[ServerHandle] {
        &self.servers
    }

    /// Bound port of the named device server.
    pub fn port_of(&self, name: &str) -> Option<u16> {
        self.servers
            .iter()
            .find(|server| server.name() == name)
            .map(|server| server.local_addr().port())
    }

    pub async fn shutdown(self) {
        info!("🛑 Shutting down lab");
        for server in self.servers {
            server.shutdown().await;
        }
        self.manager.shutdown().await;
    }
}
