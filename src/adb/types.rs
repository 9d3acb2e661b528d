// Core ADB types and traits
use super::error::{AdbError, AdbResult};
use super::parse::{escape_input_text, parse_foreground_package};
use serde::Serialize;

/// Android key code for the BACK button.
pub const KEYCODE_BACK: u32 = 4;
pub const KEYCODE_HOME: u32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct ImageCapture {
    pub bytes: Vec<u8>,
    pub duration_ms: u128,
}

// Trait defining ADB capabilities (shell or rust implementations)
#[allow(async_fn_in_trait)]
pub trait AdbClient: Send + Sync {
    async fn list_devices() -> AdbResult<Vec<Device>>
    where
        Self: Sized;
    async fn new_with_device(device_name: &str) -> AdbResult<Self>
    where
        Self: Sized;

    /// Run `adb shell <args>` and return stdout as text.
    async fn shell(&self, args: &[&str]) -> AdbResult<String>;

    // Raw backend-specific capture (implemented per backend)
    async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>>;

    async fn screen_capture(&self) -> AdbResult<ImageCapture> {
        let start = std::time::Instant::now();
        let bytes = self.screen_capture_bytes().await?;
        Ok(ImageCapture {
            bytes,
            duration_ms: start.elapsed().as_millis(),
        })
    }

    async fn tap(&self, x: u32, y: u32) -> AdbResult<()> {
        let (sx, sy) = self.screen_dimensions();
        if x > sx || y > sy {
            return Err(AdbError::TapOutOfBounds { x, y });
        }
        self.shell(&["input", "tap", &x.to_string(), &y.to_string()])
            .await
            .map(|_| ())
    }

    async fn swipe(
        &self,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        duration: Option<u32>,
    ) -> AdbResult<()> {
        let (sx, sy) = self.screen_dimensions();
        for &(x, y) in &[(x1, y1), (x2, y2)] {
            if x > sx || y > sy {
                return Err(AdbError::TapOutOfBounds { x, y });
            }
        }
        let mut parts = vec![
            x1.to_string(),
            y1.to_string(),
            x2.to_string(),
            y2.to_string(),
        ];
        if let Some(d) = duration {
            parts.push(d.to_string());
        }
        let mut args = vec!["input", "swipe"];
        args.extend(parts.iter().map(String::as_str));
        self.shell(&args).await.map(|_| ())
    }

    async fn input_text(&self, text: &str) -> AdbResult<()> {
        let escaped = escape_input_text(text);
        self.shell(&["input", "text", &escaped]).await.map(|_| ())
    }

    async fn key_event(&self, key_code: u32) -> AdbResult<()> {
        self.shell(&["input", "keyevent", &key_code.to_string()])
            .await
            .map(|_| ())
    }

    /// Package name of the app currently holding window focus, if any.
    async fn foreground_package(&self) -> AdbResult<Option<String>> {
        let out = self.shell(&["dumpsys", "window"]).await?;
        Ok(parse_foreground_package(&out))
    }

    async fn launch_app(&self, package: &str) -> AdbResult<()> {
        self.shell(&[
            "monkey",
            "-p",
            package,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ])
        .await
        .map(|_| ())
    }

    async fn force_stop(&self, package: &str) -> AdbResult<()> {
        self.shell(&["am", "force-stop", package]).await.map(|_| ())
    }

    fn screen_dimensions(&self) -> (u32, u32);
    fn device_name(&self) -> &str;
    fn transport_id(&self) -> Option<u32>;
}

#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct Device {
    pub name: String,
    pub transport_id: Option<String>,
}
