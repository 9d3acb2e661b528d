// https://crates.io/crates/adb_client
use super::error::{AdbError, AdbResult, is_disconnect_message};
use super::framebuffer::framebuffer_to_png;
use super::parse::parse_screen_size;
use super::types::{AdbClient, Device};
use adb_client::{ADBDeviceExt, ADBServer, ADBServerDevice};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const SHELL_TIMEOUT: Duration = Duration::from_secs(5);
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend speaking the ADB server protocol through adb_client.
pub struct RustAdb {
    device: Device,
    server_device: Arc<Mutex<ADBServerDevice>>, // underlying connected device
    screen_x: u32,
    screen_y: u32,
}

impl RustAdb {
    /// Run a shell command on a blocking thread so the timeout can fire even
    /// when adb_client is stuck on a dead socket.
    async fn run_shell(
        server_device: Arc<Mutex<ADBServerDevice>>,
        args: Vec<String>,
        timeout: Duration,
    ) -> AdbResult<Vec<u8>> {
        let command = args.join(" ");
        let cmd_for_task = command.clone();
        let task = tokio::task::spawn_blocking(move || -> AdbResult<Vec<u8>> {
            let mut out: Vec<u8> = Vec::new();
            let mut dev = server_device.blocking_lock();
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            dev.shell_command(&refs, &mut out)
                .map_err(|e| AdbError::from_adb_error_with_desync_check(cmd_for_task, e))?;
            Ok(out)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => Err(AdbError::Timeout {
                duration: timeout,
                description: format!("'{}' (device may be disconnected)", command),
            }),
        }
    }

    async fn capture_screen_bytes_internal(&self) -> AdbResult<Vec<u8>> {
        let server_device = Arc::clone(&self.server_device);
        let framebuffer = tokio::task::spawn_blocking(move || {
            let mut dev = server_device.blocking_lock();
            dev.framebuffer_bytes()
        })
        .await?;

        match framebuffer {
            Ok(raw) => match framebuffer_to_png(raw, self.screen_x, self.screen_y) {
                Ok(png) => return Ok(png),
                Err(e) => log::debug!("Framebuffer conversion failed: {e}, falling back to screencap"),
            },
            Err(e) => {
                let description = e.to_string();
                if is_disconnect_message(&description) {
                    return Err(AdbError::FramebufferCaptureFailed { description });
                }
                log::debug!("Framebuffer capture failed: {description}, falling back to screencap");
            }
        }

        Self::run_shell(
            Arc::clone(&self.server_device),
            vec!["screencap".into(), "-p".into()],
            CAPTURE_TIMEOUT,
        )
        .await
    }

    /// Connect to the first available device
    pub async fn connect_first() -> AdbResult<Self> {
        let devices = Self::list_devices().await?;
        let first = devices.into_iter().next().ok_or(AdbError::NoDevices)?;
        Self::new_with_device(&first.name).await
    }
}

impl AdbClient for RustAdb {
    async fn list_devices() -> AdbResult<Vec<Device>> {
        let mut server = ADBServer::default();
        let device_list = tokio::task::spawn_blocking(move || server.devices()).await??;
        Ok(device_list
            .into_iter()
            .map(|d| Device {
                name: d.identifier,
                transport_id: None,
            })
            .collect())
    }

    async fn new_with_device(device_name: &str) -> AdbResult<Self> {
        let mut server = ADBServer::default();
        let name = device_name.to_string();
        let dev = tokio::task::spawn_blocking(move || {
            if name.is_empty() {
                server.get_device()
            } else {
                server.get_device_by_name(&name)
            }
        })
        .await?
        .map_err(|e| AdbError::ConnectionFailed {
            description: e.to_string(),
        })?;

        let server_device = Arc::new(Mutex::new(dev));
        let out = Self::run_shell(
            Arc::clone(&server_device),
            vec!["wm".into(), "size".into()],
            SHELL_TIMEOUT,
        )
        .await?;
        let (screen_x, screen_y) =
            parse_screen_size(&String::from_utf8_lossy(&out)).ok_or(AdbError::ScreenSizeParseFailed)?;
        log::info!("RustAdb connected to '{}' ({}x{})", device_name, screen_x, screen_y);

        Ok(RustAdb {
            device: Device {
                name: device_name.to_string(),
                transport_id: None,
            },
            server_device,
            screen_x,
            screen_y,
        })
    }

    async fn shell(&self, args: &[&str]) -> AdbResult<String> {
        let owned = args.iter().map(|s| s.to_string()).collect();
        let out = Self::run_shell(Arc::clone(&self.server_device), owned, SHELL_TIMEOUT).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>> {
        match tokio::time::timeout(CAPTURE_TIMEOUT, self.capture_screen_bytes_internal()).await {
            Ok(result) => result,
            Err(_) => Err(AdbError::Timeout {
                duration: CAPTURE_TIMEOUT,
                description: "screenshot capture (device may be disconnected)".into(),
            }),
        }
    }

    fn screen_dimensions(&self) -> (u32, u32) {
        (self.screen_x, self.screen_y)
    }

    fn device_name(&self) -> &str {
        &self.device.name
    }

    fn transport_id(&self) -> Option<u32> {
        None
    }
}
