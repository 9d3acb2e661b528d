use thiserror::Error;

/// A specialized `Result` type for ADB operations.
pub type AdbResult<T> = Result<T, AdbError>;

/// The error type for all ADB-related operations.
#[derive(Debug, Error)]
pub enum AdbError {
    #[error("Failed to enumerate devices: {source}")]
    DeviceEnumerationFailed {
        #[from]
        source: adb_client::RustADBError,
    },

    #[error("No devices found")]
    NoDevices,

    #[error("Device '{name}' not found")]
    DeviceNotFound { name: String },

    #[error("Failed to connect to device: {description}")]
    ConnectionFailed { description: String },

    #[error("'adb' binary unavailable: {description}")]
    AdbBinaryUnavailable { description: String },

    #[error("Shell command '{command}' failed: {description}")]
    ShellCommandFailed {
        command: String,
        description: String,
    },

    #[error("Operation timed out after {duration:?}: {description}")]
    Timeout {
        duration: std::time::Duration,
        description: String,
    },

    #[error("Task failed to complete: {source}")]
    JoinError {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error("Could not parse screen size from 'wm size' output.")]
    ScreenSizeParseFailed,

    #[error("Framebuffer capture failed: {description}")]
    FramebufferCaptureFailed { description: String },

    #[error("Failed to convert framebuffer to PNG: {description}")]
    FramebufferToPngFailed { description: String },

    #[error("Failed to convert JPEG to PNG: {description}")]
    JpegToPngFailed { description: String },

    #[error("Tap coordinates are out of bounds: x={x}, y={y}")]
    TapOutOfBounds { x: u32, y: u32 },

    #[error("ADB protocol desync (CLSE error) - connection needs to be re-established: {description}")]
    ProtocolDesync { description: String },
}

const DISCONNECT_MARKERS: &[&str] = &[
    "CLSE",
    "no write endpoint",
    "device offline",
    "device not found",
    "no devices",
    "Broken pipe",
    "Connection reset",
    "Connection refused",
    "closed",
    "disconnected",
];

/// Heuristic classification of transport error text that means the session is gone.
pub fn is_disconnect_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    DISCONNECT_MARKERS
        .iter()
        .any(|marker| lower.contains(&marker.to_lowercase()))
}

impl AdbError {
    /// Check if this error indicates a protocol desync that requires reconnection
    pub fn is_protocol_desync(&self) -> bool {
        match self {
            AdbError::ShellCommandFailed { description, .. } => {
                description.contains("CLSE") || description.contains("no write endpoint")
            }
            AdbError::ProtocolDesync { .. } => true,
            _ => false,
        }
    }

    /// Whether the session must be re-established before the device is usable again.
    /// Timeouts count: a wedged transport looks the same as a pulled cable.
    pub fn is_disconnect(&self) -> bool {
        match self {
            AdbError::ProtocolDesync { .. }
            | AdbError::Timeout { .. }
            | AdbError::NoDevices
            | AdbError::DeviceNotFound { .. }
            | AdbError::ConnectionFailed { .. }
            | AdbError::AdbBinaryUnavailable { .. }
            | AdbError::JoinError { .. }
            | AdbError::DeviceEnumerationFailed { .. } => true,
            AdbError::ShellCommandFailed { description, .. }
            | AdbError::FramebufferCaptureFailed { description } => {
                is_disconnect_message(description)
            }
            _ => false,
        }
    }

    /// Map an adb_client failure, flagging protocol desync separately
    pub fn from_adb_error_with_desync_check(
        command: String,
        source: adb_client::RustADBError,
    ) -> Self {
        let err_str = source.to_string();
        if err_str.contains("CLSE") || err_str.contains("no write endpoint") {
            AdbError::ProtocolDesync {
                description: format!("Command '{}' failed with protocol error: {}", command, err_str),
            }
        } else {
            AdbError::ShellCommandFailed {
                command,
                description: err_str,
            }
        }
    }
}
