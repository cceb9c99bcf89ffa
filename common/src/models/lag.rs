use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Round-trip latency from a device to the master of its /24.
///
/// `Unmeasurable` is a valid result, not an error. Callers render it as `N/A`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LagMeasurement {
    Measured { millis: f64 },
    Unmeasurable { reason: Unmeasurable },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unmeasurable {
    /// No device in the subnet carries the master flag.
    NoMaster,
    /// The ping to the master timed out, failed, or printed nothing parseable.
    Unreachable,
}

impl LagMeasurement {
    pub fn measured(rtt: Duration) -> Self {
        Self::Measured {
            millis: rtt.as_secs_f64() * 1_000.0,
        }
    }

    pub const fn no_master() -> Self {
        Self::Unmeasurable {
            reason: Unmeasurable::NoMaster,
        }
    }

    pub const fn unreachable() -> Self {
        Self::Unmeasurable {
            reason: Unmeasurable::Unreachable,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Measured { millis } => Some(Duration::from_secs_f64(millis / 1_000.0)),
            Self::Unmeasurable { .. } => None,
        }
    }
}

impl fmt::Display for Unmeasurable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMaster => f.write_str("no master configured"),
            Self::Unreachable => f.write_str("unreachable"),
        }
    }
}

impl fmt::Display for LagMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measured { millis } => write!(f, "{millis:.3} ms"),
            Self::Unmeasurable { reason } => write!(f, "N/A ({reason})"),
        }
    }
}
