//! Accuracy filter for raw fixes

use serde::{Deserialize, Serialize};

use crate::core::config::LocationConfig;
use crate::core::types::{LocationFix, Position};

/// Why a fix was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Platform reported a negative (unknown) accuracy
    NegativeAccuracy,
    /// Accuracy radius wider than the active threshold
    TooInaccurate { accuracy_m: f64, threshold_m: f64 },
    /// NaN or out-of-range latitude/longitude
    InvalidCoordinate,
    /// No fix arrived within the timeout window
    Missing,
}

/// Outcome for a single fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixVerdict {
    Accepted(Position),
    Rejected(RejectReason),
}

impl FixVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FixVerdict::Accepted(_))
    }
}

/// Strict/relaxed accuracy thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyFilter {
    pub threshold_m: f64,
    pub relaxed_threshold_m: f64,
}

impl Default for AccuracyFilter {
    fn default() -> Self {
        Self::new(&LocationConfig::default())
    }
}

impl AccuracyFilter {
    pub fn new(config: &LocationConfig) -> Self {
        Self {
            threshold_m: config.accuracy_threshold_m,
            relaxed_threshold_m: config.relaxed_accuracy_threshold_m,
        }
    }

    pub fn active_threshold(&self, relaxed: bool) -> f64 {
        if relaxed {
            self.relaxed_threshold_m
        } else {
            self.threshold_m
        }
    }

    /// Accept fixes with 0 <= accuracy <= threshold and a valid coordinate
    pub fn evaluate(&self, fix: &LocationFix, relaxed: bool) -> FixVerdict {
        if !fix.coordinate().is_valid() {
            return FixVerdict::Rejected(RejectReason::InvalidCoordinate);
        }
        let accuracy = fix.horizontal_accuracy_m;
        if accuracy.is_nan() || accuracy < 0.0 {
            return FixVerdict::Rejected(RejectReason::NegativeAccuracy);
        }
        let threshold = self.active_threshold(relaxed);
        if accuracy > threshold {
            return FixVerdict::Rejected(RejectReason::TooInaccurate {
                accuracy_m: accuracy,
                threshold_m: threshold,
            });
        }
        FixVerdict::Accepted(Position::from(*fix))
    }
}
