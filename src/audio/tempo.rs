//! Tempo planning for aligning synthesized speech with the original clip.
//!
//! A single `atempo` filter only accepts factors in `[0.5, 2.0]`, so larger
//! speed changes are decomposed into a chain of bounded factors that are
//! applied in order within one FFmpeg invocation.

use tracing::debug;

use crate::error::{Result, RevoiceError};

/// Smallest factor one `atempo` application accepts.
pub const MIN_TEMPO: f64 = 0.5;

/// Largest factor one `atempo` application accepts.
pub const MAX_TEMPO: f64 = 2.0;

/// Upper bound on chain length. 2^64 is far beyond any real duration ratio.
const MAX_CHAIN_LINKS: usize = 64;

const CONVERGENCE_EPSILON: f64 = 1e-12;

/// Ordered tempo factors whose product is the overall speed multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoPlan {
    factors: Vec<f64>,
}

impl TempoPlan {
    pub fn factors(&self) -> &[f64] {
        &self.factors
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Product of all factors after rounding.
    pub fn product(&self) -> f64 {
        self.factors.iter().product()
    }

    /// FFmpeg audio filter description, e.g. `atempo=2.00,atempo=1.25`.
    pub fn filter_chain(&self) -> String {
        self.factors
            .iter()
            .map(|f| format!("atempo={f:.2}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn in_range(ratio: f64) -> bool {
    (MIN_TEMPO..=MAX_TEMPO).contains(&ratio)
}

fn round_factor(factor: f64) -> f64 {
    (factor * 100.0).round() / 100.0
}

fn check_duration(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(RevoiceError::InvalidDuration(format!(
            "{name} duration must be positive and finite, got {value}"
        )));
    }
    Ok(())
}

/// Plan the tempo change that rescales audio lasting `corrected_duration`
/// seconds so it lasts `original_duration` seconds.
///
/// The speed multiplier is `corrected / original`: a value above 1 speeds the
/// audio up. Out-of-range multipliers are greedily clamped to the nearest
/// bound until the remainder fits, and the remainder becomes the last link.
pub fn plan_tempo(original_duration: f64, corrected_duration: f64) -> Result<TempoPlan> {
    check_duration("original", original_duration)?;
    check_duration("corrected", corrected_duration)?;

    let mut ratio = corrected_duration / original_duration;
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(RevoiceError::InvalidDuration(format!(
            "tempo ratio {ratio} is not usable"
        )));
    }

    let mut factors = Vec::new();

    while !in_range(ratio) {
        if factors.len() >= MAX_CHAIN_LINKS {
            return Err(RevoiceError::InvalidDuration(format!(
                "tempo ratio {} needs more than {MAX_CHAIN_LINKS} chained filters",
                corrected_duration / original_duration
            )));
        }

        let factor = ratio.clamp(MIN_TEMPO, MAX_TEMPO);
        factors.push(round_factor(factor));

        let next = ratio / factor;
        if next <= 0.0 || (next - ratio).abs() < CONVERGENCE_EPSILON {
            return Err(RevoiceError::InvalidDuration(format!(
                "tempo ratio stopped converging at {next}"
            )));
        }
        ratio = next;
    }

    factors.push(round_factor(ratio));

    debug!(
        "Tempo plan for {:.3}s -> {:.3}s: {:?}",
        corrected_duration, original_duration, factors
    );

    Ok(TempoPlan { factors })
}
