//! RPE-to-percentage chart and estimated-1RM calculation.
//!
//! The chart maps (reps, RPE) to a fraction of 1RM. Whole-RPE rows (7, 8,
//! 9, 10) are explicit entries; half-RPE values (7.5, 8.5, 9.5) are
//! linearly interpolated between the adjacent whole-RPE rows. That
//! interpolation rule is part of the chart's contract.

use crate::{Error, Result};

/// Lowest RPE the chart covers
pub const MIN_RPE: f64 = 7.0;
/// Highest RPE the chart covers
pub const MAX_RPE: f64 = 10.0;
/// Highest rep count the chart covers
pub const MAX_REPS: u32 = 12;

/// Fraction of 1RM by [rpe - 7][reps - 1].
///
/// Structured so that each step down in RPE equals one rep in the hole:
/// 3 reps @ RPE 9 carries the same percentage as 4 reps @ RPE 10.
const PERCENTAGES: [[f64; MAX_REPS as usize]; 4] = [
    // RPE 7
    [
        0.892, 0.863, 0.837, 0.811, 0.786, 0.762, 0.739, 0.707, 0.680, 0.653, 0.626, 0.599,
    ],
    // RPE 8
    [
        0.922, 0.892, 0.863, 0.837, 0.811, 0.786, 0.762, 0.739, 0.707, 0.680, 0.653, 0.626,
    ],
    // RPE 9
    [
        0.955, 0.922, 0.892, 0.863, 0.837, 0.811, 0.786, 0.762, 0.739, 0.707, 0.680, 0.653,
    ],
    // RPE 10
    [
        1.000, 0.955, 0.922, 0.892, 0.863, 0.837, 0.811, 0.786, 0.762, 0.739, 0.707, 0.680,
    ],
];

/// Look up the fraction of 1RM for a (reps, RPE) pair
///
/// Reps must be 1..=12, RPE must be 7.0..=10.0 in 0.5 steps.
pub fn percentage(reps: u32, rpe: f64) -> Result<f64> {
    if reps == 0 || reps > MAX_REPS {
        return Err(Error::Validation(format!(
            "reps must be 1..={}, got {}",
            MAX_REPS, reps
        )));
    }
    if !(MIN_RPE..=MAX_RPE).contains(&rpe) {
        return Err(Error::Validation(format!(
            "RPE must be {}..={}, got {}",
            MIN_RPE, MAX_RPE, rpe
        )));
    }
    let half_steps = rpe * 2.0;
    if (half_steps - half_steps.round()).abs() > 1e-9 {
        return Err(Error::Validation(format!(
            "RPE must be in 0.5 steps, got {}",
            rpe
        )));
    }

    let rep_idx = (reps - 1) as usize;
    let lower_row = (rpe.floor() - MIN_RPE) as usize;

    let frac = rpe - rpe.floor();
    if frac.abs() < 1e-9 {
        return Ok(PERCENTAGES[lower_row][rep_idx]);
    }

    // Half step: interpolate between the adjacent whole-RPE rows
    let low = PERCENTAGES[lower_row][rep_idx];
    let high = PERCENTAGES[lower_row + 1][rep_idx];
    Ok(low + (high - low) * frac)
}

/// Estimate a 1RM from a submaximal set's weight, reps, and reported RPE
///
/// This is the back-calculation of the chart: e1rm = weight / percentage.
pub fn estimate_one_rm(weight: f64, reps: u32, rpe: f64) -> Result<f64> {
    if weight <= 0.0 {
        return Err(Error::Validation(format!(
            "weight must be positive, got {}",
            weight
        )));
    }
    let pct = percentage(reps, rpe)?;
    let e1rm = weight / pct;
    tracing::debug!(
        "Estimated 1RM {:.1} from {} x {} @ RPE {}",
        e1rm,
        weight,
        reps,
        rpe
    );
    Ok(e1rm)
}
