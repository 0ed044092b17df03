//! Color mixer: dispenses pigments into the fluid simulation and stirs.
//!
//! A mix clears the display, sets the vortex strength to the mixing speed,
//! then splats each active pigment at the center in black, yellow, magenta,
//! cyan order, giving each an equal share of the mixing time. The vortex is
//! reset to zero once every pigment has had its share.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::bridge::Simulation;
use crate::config::TimingConfig;
use crate::driver::{checked_seconds, decode_args, Driver, DriverError};

const OPERATIONS: &[&str] = &["mix"];

pub const DEFAULT_MAX_COLOR_VOLUME: f64 = 25.0;

pub const VORTEX_STRENGTH: &str = "VORTEX_STRENGTH";
pub const SPLAT_RADIUS: &str = "SPLAT_RADIUS";
pub const COLOR: &str = "COLOR";
pub const COLOR_INTENSITY: &str = "COLOR_INTENSITY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pigment {
    Cyan,
    Magenta,
    Yellow,
    Black,
}

impl Pigment {
    /// Declaration order of the `mix` parameters.
    pub const ALL: [Pigment; 4] = [Pigment::Cyan, Pigment::Magenta, Pigment::Yellow, Pigment::Black];

    pub fn name(self) -> &'static str {
        match self {
            Pigment::Cyan => "cyan",
            Pigment::Magenta => "magenta",
            Pigment::Yellow => "yellow",
            Pigment::Black => "black",
        }
    }

    /// Name as the simulation's `COLOR` setting expects it.
    pub fn display_name(self) -> &'static str {
        match self {
            Pigment::Cyan => "Cyan",
            Pigment::Magenta => "Magenta",
            Pigment::Yellow => "Yellow",
            Pigment::Black => "Black",
        }
    }

    pub fn from_display_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|pigment| pigment.display_name().eq_ignore_ascii_case(name))
    }
}

/// One pigment's share of a recipe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dose {
    pub pigment: Pigment,
    pub volume: f64,
    pub strength: f64,
}

impl Dose {
    pub fn is_active(&self) -> bool {
        self.volume > 0.0 && self.strength > 0.0
    }
}

fn default_max_color_volume() -> f64 {
    DEFAULT_MAX_COLOR_VOLUME
}

/// Arguments of the `mix` operation, named exactly as on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MixRecipe {
    pub cyan_volume: f64,
    pub cyan_strength: f64,
    pub magenta_volume: f64,
    pub magenta_strength: f64,
    pub yellow_volume: f64,
    pub yellow_strength: f64,
    pub black_volume: f64,
    pub black_strength: f64,
    pub mixing_time: f64,
    pub mixing_speed: f64,
    #[serde(default = "default_max_color_volume")]
    pub max_color_volume: f64,
}

impl Default for MixRecipe {
    fn default() -> Self {
        Self {
            cyan_volume: 0.0,
            cyan_strength: 0.0,
            magenta_volume: 0.0,
            magenta_strength: 0.0,
            yellow_volume: 0.0,
            yellow_strength: 0.0,
            black_volume: 0.0,
            black_strength: 0.0,
            mixing_time: 0.0,
            mixing_speed: 0.0,
            max_color_volume: DEFAULT_MAX_COLOR_VOLUME,
        }
    }
}

impl MixRecipe {
    pub fn dose(&self, pigment: Pigment) -> Dose {
        let (volume, strength) = match pigment {
            Pigment::Cyan => (self.cyan_volume, self.cyan_strength),
            Pigment::Magenta => (self.magenta_volume, self.magenta_strength),
            Pigment::Yellow => (self.yellow_volume, self.yellow_strength),
            Pigment::Black => (self.black_volume, self.black_strength),
        };
        Dose {
            pigment,
            volume,
            strength,
        }
    }

    /// Doses in dispensing order: the reverse of declaration order.
    pub fn dispense_order(&self) -> [Dose; 4] {
        let mut doses = Pigment::ALL.map(|pigment| self.dose(pigment));
        doses.reverse();
        doses
    }

    pub fn active_count(&self) -> usize {
        Pigment::ALL
            .into_iter()
            .filter(|pigment| self.dose(*pigment).is_active())
            .count()
    }

    /// Mixing time each active pigment gets; zero when nothing is active.
    pub fn individual_mixing_time(&self) -> f64 {
        match self.active_count() {
            0 => 0.0,
            active => self.mixing_time / active as f64,
        }
    }

    pub fn total_volume(&self) -> f64 {
        self.cyan_volume + self.magenta_volume + self.yellow_volume + self.black_volume
    }

    pub fn validate(&self) -> Result<(), DriverError> {
        for dose in Pigment::ALL.map(|pigment| self.dose(pigment)) {
            for (what, value) in [("volume", dose.volume), ("strength", dose.strength)] {
                if !(value.is_finite() && value >= 0.0) {
                    return Err(DriverError::InvalidArgument {
                        operation: "mix",
                        reason: format!("{}_{what} must be >= 0, got {value}", dose.pigment.name()),
                    });
                }
            }
        }
        checked_seconds("mix", "mixing_time", self.mixing_time)?;
        if !self.mixing_speed.is_finite() {
            return Err(DriverError::InvalidArgument {
                operation: "mix",
                reason: format!("mixing_speed must be finite, got {}", self.mixing_speed),
            });
        }
        if !(self.max_color_volume.is_finite() && self.max_color_volume > 0.0) {
            return Err(DriverError::InvalidArgument {
                operation: "mix",
                reason: format!("max_color_volume must be > 0, got {}", self.max_color_volume),
            });
        }
        Ok(())
    }
}

pub struct ColorMixerDriver {
    simulation: Arc<dyn Simulation>,
    timing: TimingConfig,
}

impl std::fmt::Debug for ColorMixerDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorMixerDriver").field("timing", &self.timing).finish_non_exhaustive()
    }
}

impl ColorMixerDriver {
    pub fn new(simulation: Arc<dyn Simulation>, timing: TimingConfig) -> Self {
        Self { simulation, timing }
    }

    pub async fn mix(&self, recipe: &MixRecipe) -> Result<bool, DriverError> {
        recipe.validate()?;
        let individual = checked_seconds("mix", "mixing_time", recipe.individual_mixing_time())?;
        info!(
            "🎨 Mixing {} active colors for {:?} each at speed {}",
            recipe.active_count(),
            individual,
            recipe.mixing_speed
        );

        self.simulation.clear();
        self.simulation.update_config(VORTEX_STRENGTH, json!(recipe.mixing_speed));

        for dose in recipe.dispense_order().into_iter().filter(Dose::is_active) {
            self.simulation
                .update_config(SPLAT_RADIUS, json!(dose.volume / recipe.max_color_volume));
            self.simulation.update_config(COLOR, json!(dose.pigment.display_name()));
            self.simulation.update_config(COLOR_INTENSITY, json!(dose.strength));
            self.simulation.center_splat();
            super::wait(self.timing.splat_settle()).await;

            super::wait(individual).await;
        }

        self.simulation.update_config(VORTEX_STRENGTH, json!(0));
        super::wait(self.timing.mix_settle()).await;
        Ok(true)
    }
}

#[async_trait]
impl Driver for ColorMixerDriver {
    fn kind(&self) -> &'static str {
        "color_mixer"
    }

    fn operations(&self) -> &'static [&'static str] {
        OPERATIONS
    }

    async fn invoke(&self, operation: &str, params: Map<String, Value>) -> Result<Value, DriverError> {
        match operation {
            "mix" => {
                let recipe: MixRecipe = decode_args("mix", params)?;
                Ok(Value::Bool(self.mix(&recipe).await?))
            }
            other => Err(DriverError::UnknownOperation(other.to_string())),
        }
    }
}
