//! Health classification.
//!
//! Pure functions over already-extracted facts; nothing here touches a
//! device.

use std::fmt;

use crate::facts::{LinkAggState, PeerSummary, Reading};

/// CPU load (percent) at or above which a device is critical.
pub const CPU_CRITICAL: f64 = 80.0;

/// Temperature (Celsius) at or above which a device is critical.
pub const TEMPERATURE_CRITICAL: f64 = 80.0;

/// Overall device severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Critical,
    Caution,
    Nominal,
}

impl Health {
    /// Presentation tone for this severity.
    pub fn tone(self) -> Tone {
        match self {
            Self::Critical => Tone::Unfavorable,
            Self::Caution => Tone::Cautionary,
            Self::Nominal => Tone::Favorable,
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Critical => "critical",
            Self::Caution => "caution",
            Self::Nominal => "nominal",
        })
    }
}

/// How a rendered value should be colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Favorable,
    Cautionary,
    Unfavorable,
}

/// Classify a device from its CPU load and hottest temperature.
///
/// Either threshold alone makes the device critical. With neither reading
/// available there is nothing to judge and the result is caution.
pub fn evaluate(cpu: Option<f64>, temperature: Option<f64>) -> Health {
    let hot = temperature.is_some_and(|t| t >= TEMPERATURE_CRITICAL);
    let busy = cpu.is_some_and(|c| c >= CPU_CRITICAL);

    if busy || hot {
        Health::Critical
    } else if cpu.is_none() && temperature.is_none() {
        Health::Caution
    } else {
        Health::Nominal
    }
}

/// Tone for the BGP column: favorable while at least one peer is up.
pub fn peer_tone(summary: &Reading<PeerSummary>) -> Tone {
    match summary {
        Ok(summary) if summary.established > 0 => Tone::Favorable,
        _ => Tone::Cautionary,
    }
}

/// Tone for the MLAG column.
pub fn link_agg_tone(state: &Reading<LinkAggState>) -> Tone {
    match state {
        Ok(LinkAggState::Active | LinkAggState::Enabled) => Tone::Favorable,
        Ok(LinkAggState::Disabled) | Err(_) => Tone::Cautionary,
        Ok(LinkAggState::Inactive | LinkAggState::Other(_)) => Tone::Unfavorable,
    }
}
