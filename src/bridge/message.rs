//! Frames exchanged between a bridge and its simulation client.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Control message sent to the simulation, one JSON text frame each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SimMessage {
    UpdateConfig { key: String, value: Value },
    Clear,
    CenterSplat,
    ComputeAverageColor,
}

impl SimMessage {
    pub fn update_config(key: impl Into<String>, value: impl Into<Value>) -> Self {
        SimMessage::UpdateConfig {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SimMessage::UpdateConfig { .. } => "updateConfig",
            SimMessage::Clear => "clear",
            SimMessage::CenterSplat => "centerSplat",
            SimMessage::ComputeAverageColor => "computeAverageColor",
        }
    }
}

/// An 8-bit-ish RGB triple. Channels are kept as plain integers and are not clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    #[serde(deserialize_with = "rounded_channel")]
    pub r: i64,
    #[serde(deserialize_with = "rounded_channel")]
    pub g: i64,
    #[serde(deserialize_with = "rounded_channel")]
    pub b: i64,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: i64, g: i64, b: i64) -> Self {
        Self { r, g, b }
    }

    pub fn to_array(self) -> [i64; 3] {
        [self.r, self.g, self.b]
    }
}

// Browsers report averaged channels as floats.
fn rounded_channel<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() {
        Ok(value.round() as i64)
    } else {
        Err(serde::de::Error::custom("color channel must be finite"))
    }
}

/// Event received from the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    AverageColor(Rgb),
    /// Any other `type`; accepted and ignored.
    Other(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("event has no string `type` field")]
    MissingType,
    #[error("malformed {kind} event: {reason}")]
    Malformed { kind: &'static str, reason: String },
}

#[derive(Deserialize)]
struct AverageColorEvent {
    color: Rgb,
}

impl SimEvent {
    pub fn parse(text: &str) -> Result<Self, EventError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| EventError::InvalidJson(e.to_string()))?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingType)?
            .to_string();

        match kind.as_str() {
            "averageColor" => {
                let event: AverageColorEvent =
                    serde_json::from_value(value).map_err(|e| EventError::Malformed {
                        kind: "averageColor",
                        reason: e.to_string(),
                    })?;
                Ok(SimEvent::AverageColor(event.color))
            }
            _ => Ok(SimEvent::Other(kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_control_messages_wire_shape() {
        let update = serde_json::to_value(SimMessage::update_config("VORTEX_STRENGTH", 150)).unwrap();
        assert_eq!(update, json!({"type": "updateConfig", "key": "VORTEX_STRENGTH", "value": 150}));
        assert_eq!(serde_json::to_value(SimMessage::Clear).unwrap(), json!({"type": "clear"}));
        assert_eq!(serde_json::to_value(SimMessage::CenterSplat).unwrap(), json!({"type": "centerSplat"}));
        assert_eq!(
            serde_json::to_value(SimMessage::ComputeAverageColor).unwrap(),
            json!({"type": "computeAverageColor"})
        );
    }

    #[test]
    fn test_parse_average_color() {
        let event = SimEvent::parse(r#"{"type":"averageColor","color":{"r":12,"g":34,"b":56}}"#).unwrap();
        assert_eq!(event, SimEvent::AverageColor(Rgb::new(12, 34, 56)));
    }

    #[test]
    fn test_parse_rounds_float_channels() {
        let event = SimEvent::parse(r#"{"type":"averageColor","color":{"r":12.6,"g":0.2,"b":254.5}}"#).unwrap();
        assert_eq!(event, SimEvent::AverageColor(Rgb::new(13, 0, 255)));
    }

    #[test]
    fn test_parse_unknown_type_is_other() {
        let event = SimEvent::parse(r#"{"type":"colorVariance","variance":3}"#).unwrap();
        assert_eq!(event, SimEvent::Other("colorVariance".to_string()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(SimEvent::parse("not json"), Err(EventError::InvalidJson(_))));
        assert_eq!(SimEvent::parse(r#"{"color":{}}"#), Err(EventError::MissingType));
        assert!(matches!(
            SimEvent::parse(r#"{"type":"averageColor","color":{"r":1}}"#),
            Err(EventError::Malformed { .. })
        ));
    }
}
