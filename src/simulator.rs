//! Headless stand-in for the browser fluid simulation.
//!
//! [`SimulationModel`] tracks the settings and splats a real viewer would
//! render and answers the average-color query with a subtractive blend over
//! a white canvas. [`HeadlessSimulation`] drives a model from a bridge's
//! WebSocket so the lab can run without a browser.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::bridge::{Rgb, SimMessage};
use crate::drivers::color_mixer::{Pigment, COLOR, COLOR_INTENSITY, SPLAT_RADIUS, VORTEX_STRENGTH};

/// Total splat weight at which the canvas is half covered.
pub const HALF_COVERAGE_WEIGHT: f64 = 1.0;

#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[error("Bridge rejected the connection ({code}): {reason}")]
    Rejected { code: u16, reason: String },
    #[error("WebSocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splat {
    pub pigment: Pigment,
    pub radius: f64,
    pub intensity: f64,
}

impl Splat {
    fn weight(&self) -> f64 {
        (self.radius * self.intensity).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationModel {
    splat_radius: f64,
    color: Option<Pigment>,
    color_intensity: f64,
    vortex_strength: f64,
    splats: Vec<Splat>,
}

impl Default for SimulationModel {
    fn default() -> Self {
        Self {
            splat_radius: 0.25,
            color: None,
            color_intensity: 1.0,
            vortex_strength: 0.0,
            splats: Vec::new(),
        }
    }
}

impl SimulationModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn splats(&self) -> &[Splat] {
        &self.splats
    }

    pub fn vortex_strength(&self) -> f64 {
        self.vortex_strength
    }

    /// Apply one control message; returns the reply frame, if any.
    pub fn apply(&mut self, message: &SimMessage) -> Option<Value> {
        match message {
            SimMessage::UpdateConfig { key, value } => {
                self.update_config(key, value);
                None
            }
            SimMessage::Clear => {
                self.splats.clear();
                None
            }
            SimMessage::CenterSplat => {
                self.center_splat();
                None
            }
            SimMessage::ComputeAverageColor => Some(json!({
                "type": "averageColor",
                "color": self.average_color(),
            })),
        }
    }

    fn update_config(&mut self, key: &str, value: &Value) {
        let number = value.as_f64();
        match (key, number) {
            (k, Some(v)) if k == SPLAT_RADIUS => self.splat_radius = v,
            (k, Some(v)) if k == COLOR_INTENSITY => self.color_intensity = v,
            (k, Some(v)) if k == VORTEX_STRENGTH => self.vortex_strength = v,
            (k, _) if k == COLOR => {
                self.color = value.as_str().and_then(Pigment::from_display_name);
                if self.color.is_none() {
                    warn!("Unsupported splat color {}", value);
                }
            }
            _ => warn!("Received update for unknown config key: {} = {}", key, value),
        }
    }

    fn center_splat(&mut self) {
        match self.color {
            Some(pigment) => self.splats.push(Splat {
                pigment,
                radius: self.splat_radius,
                intensity: self.color_intensity,
            }),
            None => warn!("Center splat without a color; ignored"),
        }
    }

    /// Subtractive blend of every splat over white.
    pub fn average_color(&self) -> Rgb {
        let total: f64 = self.splats.iter().map(Splat::weight).sum();
        if total <= 0.0 {
            return Rgb::new(255, 255, 255);
        }
        let coverage = total / (total + HALF_COVERAGE_WEIGHT);
        let share = |pigment: Pigment| {
            let weight: f64 = self
                .splats
                .iter()
                .filter(|splat| splat.pigment == pigment)
                .map(Splat::weight)
                .sum();
            coverage * weight / total
        };

        let (c, m, y, k) = (
            share(Pigment::Cyan),
            share(Pigment::Magenta),
            share(Pigment::Yellow),
            share(Pigment::Black),
        );
        let channel = |ink: f64| (255.0 * (1.0 - ink) * (1.0 - k)).round() as i64;
        Rgb::new(channel(c), channel(m), channel(y))
    }
}

/// A model attached to one bridge.
pub struct HeadlessSimulation {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    model: SimulationModel,
}

impl std::fmt::Debug for HeadlessSimulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessSimulation").field("model", &self.model).finish_non_exhaustive()
    }
}

impl HeadlessSimulation {
    pub async fn connect(url: &str) -> Result<Self, SimulatorError> {
        let (ws, _) = connect_async(url).await.map_err(|source| SimulatorError::Connect {
            url: url.to_string(),
            source,
        })?;
        info!("🔗 Headless simulation connected to {}", url);
        Ok(Self {
            ws,
            model: SimulationModel::new(),
        })
    }

    /// Serve bridge messages until the bridge closes the connection.
    pub async fn run(mut self) -> Result<SimulationModel, SimulatorError> {
        while let Some(frame) = self.ws.next().await {
            let text = match frame? {
                Message::Text(text) => text,
                Message::Close(Some(close)) if u16::from(close.code) != 1000 => {
                    return Err(SimulatorError::Rejected {
                        code: close.code.into(),
                        reason: close.reason.into_owned(),
                    });
                }
                Message::Close(_) => break,
                _ => continue,
            };

            let message: SimMessage = match serde_json::from_str(&text) {
                Ok(message) => message,
                Err(_) => {
                    debug!("Unknown command: {}", text);
                    continue;
                }
            };
            if let Some(reply) = self.model.apply(&message) {
                self.ws.send(Message::Text(reply.to_string())).await?;
            }
        }
        info!("🔌 Headless simulation disconnected");
        Ok(self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splat(model: &mut SimulationModel, color: &str, radius: f64, intensity: f64) {
        model.apply(&SimMessage::update_config(SPLAT_RADIUS, radius));
        model.apply(&SimMessage::update_config(COLOR, color));
        model.apply(&SimMessage::update_config(COLOR_INTENSITY, intensity));
        model.apply(&SimMessage::CenterSplat);
    }

    #[test]
    fn test_empty_canvas_is_white() {
        assert_eq!(SimulationModel::new().average_color(), Rgb::new(255, 255, 255));
    }

    #[test]
    fn test_cyan_only_removes_red() {
        let mut model = SimulationModel::new();
        splat(&mut model, "Cyan", 0.5, 2.0);
        let color = model.average_color();
        assert!(color.r < 255);
        assert_eq!((color.g, color.b), (255, 255));
    }

    #[test]
    fn test_black_darkens_every_channel() {
        let mut model = SimulationModel::new();
        splat(&mut model, "Black", 1.0, 3.0);
        let color = model.average_color();
        assert!(color.r < 255 && color.r == color.g && color.g == color.b);
    }

    #[test]
    fn test_clear_resets_splats() {
        let mut model = SimulationModel::new();
        splat(&mut model, "Magenta", 0.2, 10.0);
        assert_eq!(model.splats().len(), 1);
        model.apply(&SimMessage::Clear);
        assert!(model.splats().is_empty());
    }

    #[test]
    fn test_compute_replies_with_average_color_event() {
        let mut model = SimulationModel::new();
        let reply = model.apply(&SimMessage::ComputeAverageColor).unwrap();
        assert_eq!(reply, json!({"type": "averageColor", "color": {"r": 255, "g": 255, "b": 255}}));
    }

    #[test]
    fn test_unknown_color_splat_is_ignored() {
        let mut model = SimulationModel::new();
        splat(&mut model, "Orange", 0.5, 1.0);
        assert!(model.splats().is_empty());
    }
}
