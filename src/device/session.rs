// Session seam of the Device Bridge: what it opens and what it calls on it
use crate::adb::{AdbBackend, AdbResult, BackendKind, ImageCapture};

/// Calls the bridge makes on an open device session.
#[allow(async_fn_in_trait)]
pub trait DeviceSession {
    fn device_name(&self) -> &str;
    /// Physical screen size in pixels
    fn screen_dimensions(&self) -> (u32, u32);
    async fn screen_capture(&self) -> AdbResult<ImageCapture>;
    async fn tap(&self, x: u32, y: u32) -> AdbResult<()>;
    async fn swipe(
        &self,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        duration: Option<u32>,
    ) -> AdbResult<()>;
    async fn input_text(&self, text: &str) -> AdbResult<()>;
    async fn key_event(&self, key_code: u32) -> AdbResult<()>;
    async fn foreground_package(&self) -> AdbResult<Option<String>>;
    async fn launch_app(&self, package: &str) -> AdbResult<()>;
    async fn force_stop(&self, package: &str) -> AdbResult<()>;
}

/// Opens sessions for the bridge, once at start and again after every disconnect.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Session: DeviceSession;
    async fn connect(&self) -> AdbResult<Self::Session>;
}

/// Connects to `serial` (or the first listed device when empty) over `backend`.
#[derive(Debug, Clone)]
pub struct AdbConnector {
    pub serial: String,
    pub backend: BackendKind,
}

impl Connector for AdbConnector {
    type Session = AdbBackend;

    async fn connect(&self) -> AdbResult<AdbBackend> {
        AdbBackend::connect(&self.serial, self.backend).await
    }
}

impl DeviceSession for AdbBackend {
    fn device_name(&self) -> &str {
        AdbBackend::device_name(self)
    }

    fn screen_dimensions(&self) -> (u32, u32) {
        AdbBackend::screen_dimensions(self)
    }

    async fn screen_capture(&self) -> AdbResult<ImageCapture> {
        AdbBackend::screen_capture(self).await
    }

    async fn tap(&self, x: u32, y: u32) -> AdbResult<()> {
        AdbBackend::tap(self, x, y).await
    }

    async fn swipe(
        &self,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        duration: Option<u32>,
    ) -> AdbResult<()> {
        AdbBackend::swipe(self, x1, y1, x2, y2, duration).await
    }

    async fn input_text(&self, text: &str) -> AdbResult<()> {
        AdbBackend::input_text(self, text).await
    }

    async fn key_event(&self, key_code: u32) -> AdbResult<()> {
        AdbBackend::key_event(self, key_code).await
    }

    async fn foreground_package(&self) -> AdbResult<Option<String>> {
        AdbBackend::foreground_package(self).await
    }

    async fn launch_app(&self, package: &str) -> AdbResult<()> {
        AdbBackend::launch_app(self, package).await
    }

    async fn force_stop(&self, package: &str) -> AdbResult<()> {
        AdbBackend::force_stop(self, package).await
    }
}
