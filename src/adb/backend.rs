use super::error::{AdbError, AdbResult};
use super::rust_impl::RustAdb;
use super::shell::AdbShell;
use super::types::{AdbClient, Device, ImageCapture};
use serde::{Deserialize, Serialize};

/// Which transport to open sessions with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Rust,
    Shell,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rust" => Ok(BackendKind::Rust),
            "shell" | "adb" => Ok(BackendKind::Shell),
            other => Err(format!("unknown adb backend '{other}' (expected rust|shell)")),
        }
    }
}

pub enum AdbBackend {
    Shell(AdbShell),
    Rust(RustAdb),
}

// Forward a call to whichever backend is active
macro_rules! dispatch {
    ($self:expr, $b:ident => $call:expr) => {
        match $self {
            AdbBackend::Shell($b) => $call,
            AdbBackend::Rust($b) => $call,
        }
    };
}

impl AdbBackend {
    pub async fn list_devices(kind: BackendKind) -> AdbResult<Vec<Device>> {
        match kind {
            BackendKind::Rust => RustAdb::list_devices().await,
            BackendKind::Shell => AdbShell::list_devices().await,
        }
    }

    pub async fn connect_first(kind: BackendKind) -> AdbResult<Self> {
        let devices = Self::list_devices(kind).await?;
        let first = devices.into_iter().next().ok_or(AdbError::NoDevices)?;
        Self::new_with_device(&first.name, kind).await
    }

    /// Open a session on `name`, or on the first listed device when `name` is empty.
    pub async fn connect(name: &str, kind: BackendKind) -> AdbResult<Self> {
        if name.is_empty() {
            Self::connect_first(kind).await
        } else {
            Self::new_with_device(name, kind).await
        }
    }

    pub async fn new_with_device(name: &str, kind: BackendKind) -> AdbResult<Self> {
        match kind {
            BackendKind::Rust => Ok(AdbBackend::Rust(RustAdb::new_with_device(name).await?)),
            BackendKind::Shell => Ok(AdbBackend::Shell(AdbShell::new_with_device(name).await?)),
        }
    }

    pub fn device_name(&self) -> &str {
        dispatch!(self, b => b.device_name())
    }

    pub fn screen_dimensions(&self) -> (u32, u32) {
        dispatch!(self, b => b.screen_dimensions())
    }

    pub fn transport_id(&self) -> Option<u32> {
        dispatch!(self, b => b.transport_id())
    }

    pub async fn shell(&self, args: &[&str]) -> AdbResult<String> {
        dispatch!(self, b => b.shell(args).await)
    }

    pub async fn screen_capture(&self) -> AdbResult<ImageCapture> {
        dispatch!(self, b => b.screen_capture().await)
    }

    pub async fn tap(&self, x: u32, y: u32) -> AdbResult<()> {
        dispatch!(self, b => b.tap(x, y).await)
    }

    pub async fn swipe(
        &self,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        duration: Option<u32>,
    ) -> AdbResult<()> {
        dispatch!(self, b => b.swipe(x1, y1, x2, y2, duration).await)
    }

    pub async fn input_text(&self, text: &str) -> AdbResult<()> {
        dispatch!(self, b => b.input_text(text).await)
    }

    pub async fn key_event(&self, key_code: u32) -> AdbResult<()> {
        dispatch!(self, b => b.key_event(key_code).await)
    }

    pub async fn foreground_package(&self) -> AdbResult<Option<String>> {
        dispatch!(self, b => b.foreground_package().await)
    }

    pub async fn launch_app(&self, package: &str) -> AdbResult<()> {
        dispatch!(self, b => b.launch_app(package).await)
    }

    pub async fn force_stop(&self, package: &str) -> AdbResult<()> {
        dispatch!(self, b => b.force_stop(package).await)
    }
}
