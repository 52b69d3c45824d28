//! Confidence radii per distribution family
//!
//! `alpha` is the lower bound on the survival probability of the observed
//! region and `r` the configured radius multiplier.
//!
//! | Family | Radius |
//! |---|---|
//! | truncated normal | `r · sqrt(ln(1/alpha))` |
//! | censored normal | `r · ln(1/alpha) / alpha²` |
//! | regression, known variance | `r · (4 · ln(2/alpha) + 7)` |
//! | regression, unknown variance | `r · (12 + 4 · ln(2/alpha))` |

use serde::{Deserialize, Serialize};

/// Distribution family a projector is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    TruncatedNormal,
    CensoredNormal,
    RegressionKnownVariance,
    RegressionUnknownVariance,
}

impl Family {
    pub const ALL: [Family; 4] = [
        Family::TruncatedNormal,
        Family::CensoredNormal,
        Family::RegressionKnownVariance,
        Family::RegressionUnknownVariance,
    ];

    /// Confidence radius for survival bound `alpha` and multiplier `r`
    pub fn radius(&self, alpha: f64, r: f64) -> f64 {
        match self {
            Self::TruncatedNormal => r * (1.0 / alpha).ln().sqrt(),
            Self::CensoredNormal => r * (1.0 / alpha).ln() / (alpha * alpha),
            Self::RegressionKnownVariance => r * (4.0 * (2.0 / alpha).ln() + 7.0),
            Self::RegressionUnknownVariance => r * (12.0 + 4.0 * (2.0 / alpha).ln()),
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, Self::TruncatedNormal | Self::CensoredNormal)
    }
}

/// Lower bound on a projected variance: `scale · alpha² / 12`
///
/// `scale` is 1 for the normal family and the empirical noise variance for
/// regression.
pub fn variance_floor(alpha: f64, scale: f64) -> f64 {
    scale * alpha * alpha / 12.0
}
