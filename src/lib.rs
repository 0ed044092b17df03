//! # Color Lab
//!
//! Simulated laboratory devices exposed as network command servers, with the
//! color mixer and analyzer bridged to a live fluid simulation.
//!
//! ## Features
//!
//! - **Line-delimited JSON command protocol**: one request line, one response line
//! - **Per-device command servers**: explicit operation tables, concurrent connections
//! - **Simulation bridge**: single-client WebSocket with FIFO control messages and a correlated color query
//! - **Replicated simulation groups**: bridge, viewer host, mixer and analyzer per instance
//! - **Headless simulation**: run the whole lab without a browser
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use colorlab::{DeviceClient, Lab, LabConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let lab = Lab::start(LabConfig::default()).await?;
//!
//!     let mut station = DeviceClient::localhost(5001);
//!     station.open().await?;
//!     let cleaned = station.call("clean", json!({"duration_sec": 1})).await?;
//!     println!("Cleaned: {}", cleaned);
//!
//!     lab.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - Command/response line encoding
//! - [`client`] - Persistent client connection to a device server
//! - [`server`] - TCP command server bound to one driver
//! - [`driver`] / [`drivers`] - Device behavior behind an explicit operation table
//! - [`bridge`] - WebSocket gateway to one simulation instance
//! - [`manager`] - Provisioning of replicated simulation groups
//! - [`lab`] - Every device server and simulation group in one process
//! - [`devices`] - Orchestration-side wrappers with container bookkeeping
//! - [`simulator`] - Headless simulation client

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod assets;
pub mod bridge;
pub mod client;
pub mod config;
pub mod devices;
pub mod driver;
pub mod drivers;
pub mod lab;
pub mod manager;
pub mod protocol;
pub mod server;
pub mod simulator;

// Re-export main public types for convenience
pub use bridge::{BridgeConfig, BridgeHandle, Rgb, SimMessage, Simulation, SimulationBridge};
pub use client::{ClientError, DeviceClient};
pub use config::{LabConfig, SimulationConfig, TimingConfig};
pub use driver::{Driver, DriverError};
pub use lab::{Lab, LabError};
pub use manager::{DeviceBinding, ManagerError, SimulationGroupManager};
pub use protocol::{Command, Response};
pub use server::{CommandServer, ServerHandle};
pub use simulator::{HeadlessSimulation, SimulationModel};
