use std::time::Duration;
use thiserror::Error;

pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Debug, Error)]
pub enum DeviceError {
    /// No session could be (re)established within the reconnect budget.
    #[error("device unavailable: {reason}")]
    DeviceUnavailable { reason: String },

    /// The session is alive but the device refused the input.
    #[error("input rejected: {reason}")]
    InputRejected { reason: String },

    #[error("'{app_id}' did not reach the foreground within {waited:?}")]
    LaunchTimeout { app_id: String, waited: Duration },
}

impl DeviceError {
    /// Whether the scheduler must treat this as loss of the device.
    /// A launch timeout escalates the same way.
    pub fn is_device_loss(&self) -> bool {
        matches!(
            self,
            DeviceError::DeviceUnavailable { .. } | DeviceError::LaunchTimeout { .. }
        )
    }
}
