use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced to location stream consumers
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location permission restricted by device policy")]
    PermissionRestricted,

    #[error("Location services are disabled")]
    LocationServicesDisabled,

    #[error("No usable location fix after {attempts} retries")]
    LocationUnavailable { attempts: u32 },

    #[error("Location accuracy too low: {accuracy_m:.0} m (threshold {threshold_m:.0} m)")]
    AccuracyTooLow { accuracy_m: f64, threshold_m: f64 },
}

impl LocationError {
    /// Needs the user to change OS settings; retrying won't help
    pub fn is_terminal(&self) -> bool {
        matches!(self, LocationError::PermissionDenied | LocationError::PermissionRestricted)
    }
}
