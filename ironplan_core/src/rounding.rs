//! Weight rounding to plate increments.
//!
//! Every computed load passes through here before it reaches a set. The
//! increment is the smallest jump the user's plates allow (typically 2.5
//! or 5 lb).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Direction to round a computed weight
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundingDirection {
    #[default]
    Nearest,
    Up,
    Down,
}

/// Rounding configuration threaded through load calculation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Rounding {
    pub increment: f64,
    pub direction: RoundingDirection,
}

impl Default for Rounding {
    fn default() -> Self {
        Self {
            increment: 5.0,
            direction: RoundingDirection::Nearest,
        }
    }
}

impl Rounding {
    pub fn new(increment: f64, direction: RoundingDirection) -> Self {
        Self {
            increment,
            direction,
        }
    }

    /// Round a weight with this configuration
    pub fn apply(&self, weight: f64) -> Result<f64> {
        round_weight(weight, self.increment, self.direction)
    }
}

/// Round a weight to the given plate increment
///
/// Zero or negative weight/increment is a validation error.
pub fn round_weight(weight: f64, increment: f64, direction: RoundingDirection) -> Result<f64> {
    if increment <= 0.0 {
        return Err(Error::Validation(format!(
            "rounding increment must be positive, got {}",
            increment
        )));
    }
    if weight <= 0.0 {
        return Err(Error::Validation(format!(
            "weight must be positive, got {}",
            weight
        )));
    }

    let steps = weight / increment;
    let rounded = match direction {
        RoundingDirection::Nearest => steps.round(),
        RoundingDirection::Up => steps.ceil(),
        RoundingDirection::Down => steps.floor(),
    };

    Ok(rounded * increment)
}
