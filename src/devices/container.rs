use serde::{Deserialize, Serialize};

use crate::drivers::color_mixer::{MixRecipe, Pigment};

/// Accumulated volume and last-used strength of one pigment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PigmentLoad {
    pub volume: f64,
    pub strength: f64,
}

/// A container moving through the lab and what is in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    id: String,
    location: String,
    volume: f64,
    pigments: [PigmentLoad; 4],
    clean: bool,
    mixing_time: Option<f64>,
    mixing_speed: Option<f64>,
}

fn slot(pigment: Pigment) -> usize {
    match pigment {
        Pigment::Cyan => 0,
        Pigment::Magenta => 1,
        Pigment::Yellow => 2,
        Pigment::Black => 3,
    }
}

impl Container {
    /// A new, clean and empty container.
    pub fn new(id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
            volume: 0.0,
            pigments: [PigmentLoad::default(); 4],
            clean: true,
            mixing_time: None,
            mixing_speed: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn pigment(&self, pigment: Pigment) -> PigmentLoad {
        self.pigments[slot(pigment)]
    }

    pub fn is_clean(&self) -> bool {
        self.clean
    }

    pub fn mixing_time(&self) -> Option<f64> {
        self.mixing_time
    }

    pub fn mixing_speed(&self) -> Option<f64> {
        self.mixing_speed
    }

    /// Add pigment; the strength replaces whatever was recorded before.
    pub fn add_pigment(&mut self, pigment: Pigment, volume: f64, strength: f64) {
        let load = &mut self.pigments[slot(pigment)];
        load.volume += volume;
        load.strength = strength;
        self.volume += volume;
        self.clean = false;
    }

    pub fn record_mixing(&mut self, mixing_time: f64, mixing_speed: f64) {
        self.mixing_time = Some(mixing_time);
        self.mixing_speed = Some(mixing_speed);
        self.clean = false;
    }

    /// Record every dose of a recipe plus its mixing settings.
    pub fn record_recipe(&mut self, recipe: &MixRecipe) {
        for pigment in Pigment::ALL {
            let dose = recipe.dose(pigment);
            self.add_pigment(pigment, dose.volume, dose.strength);
        }
        self.record_mixing(recipe.mixing_time, recipe.mixing_speed);
    }

    pub fn mark_clean(&mut self) {
        self.clean = true;
    }

    /// Drop all contents. An emptied container still needs cleaning.
    pub fn empty(&mut self) {
        self.volume = 0.0;
        self.pigments = [PigmentLoad::default(); 4];
        self.mixing_time = None;
        self.mixing_speed = None;
        self.clean = false;
    }

    pub fn move_to(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_pigment_accumulates_volume() {
        let mut container = Container::new("c1", "storage");
        container.add_pigment(Pigment::Cyan, 2.0, 30.0);
        container.add_pigment(Pigment::Cyan, 3.0, 45.0);
        container.add_pigment(Pigment::Black, 1.0, 10.0);

        assert_eq!(container.pigment(Pigment::Cyan), PigmentLoad { volume: 5.0, strength: 45.0 });
        assert_eq!(container.volume(), 6.0);
        assert!(!container.is_clean());
    }

    #[test]
    fn test_empty_then_clean() {
        let mut container = Container::new("c1", "mixer");
        container.record_recipe(&MixRecipe {
            magenta_volume: 4.0,
            magenta_strength: 20.0,
            mixing_time: 10.0,
            mixing_speed: 100.0,
            ..MixRecipe::default()
        });
        assert_eq!(container.mixing_speed(), Some(100.0));

        container.empty();
        assert_eq!(container.volume(), 0.0);
        assert_eq!(container.mixing_time(), None);
        assert!(!container.is_clean());

        container.mark_clean();
        assert!(container.is_clean());
    }
}
