use hashctl_driver::DriverError;

use crate::store::StoreError;

/// Errors from controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("device '{0}' not found")]
    DeviceNotFound(String),

    #[error("device '{device}' did not finish within {secs}s")]
    Timeout { device: String, secs: u64 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ControlError {
    /// Failures that mean the device could not be reached this time.
    pub fn is_unreachable(&self) -> bool {
        match self {
            ControlError::Driver(e) => e.is_unreachable(),
            ControlError::Timeout { .. } => true,
            _ => false,
        }
    }
}
