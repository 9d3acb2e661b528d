use super::error::{AdbError, AdbResult, is_disconnect_message};
use super::parse::parse_screen_size;
use super::types::{AdbClient, Device};
use std::time::Duration;
use tokio::process::Command;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend driving the external `adb` binary, addressed by transport id.
pub struct AdbShell {
    pub device: Device,
    pub transport_id: u32,
    pub screen_x: u32,
    pub screen_y: u32,
}

impl AdbShell {
    fn ensure_adb_available() -> AdbResult<()> {
        match std::process::Command::new("adb").arg("version").output() {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => Err(AdbError::AdbBinaryUnavailable {
                description: format!(
                    "'adb' returned non-zero ({}). Ensure Android Platform Tools are properly installed, or use --impl=rust.",
                    out.status
                ),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AdbError::AdbBinaryUnavailable {
                description: "'adb' not found in PATH. Install Android Platform Tools or run with --impl=rust.".into(),
            }),
            Err(e) => Err(AdbError::AdbBinaryUnavailable {
                description: format!("Failed to invoke 'adb': {e}"),
            }),
        }
    }

    /// Run `adb <args>` with a timeout and return stdout.
    async fn run_adb(args: &[String]) -> AdbResult<Vec<u8>> {
        let command = format!("adb {}", args.join(" "));
        let output = tokio::time::timeout(COMMAND_TIMEOUT, Command::new("adb").args(args).output())
            .await
            .map_err(|_| AdbError::Timeout {
                duration: COMMAND_TIMEOUT,
                description: command.clone(),
            })?
            .map_err(|e| AdbError::AdbBinaryUnavailable {
                description: e.to_string(),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(if is_disconnect_message(&stderr) {
                AdbError::ProtocolDesync {
                    description: format!("{command}: {stderr}"),
                }
            } else {
                AdbError::ShellCommandFailed {
                    command,
                    description: stderr,
                }
            });
        }
        Ok(output.stdout)
    }

    fn transport_args(&self, rest: &[&str]) -> Vec<String> {
        let mut args = vec!["-t".to_string(), self.transport_id.to_string()];
        args.extend(rest.iter().map(|s| s.to_string()));
        args
    }

    pub async fn new(transport_id: Option<&str>) -> AdbResult<Self> {
        Self::ensure_adb_available()?;
        let devices = Self::list_devices().await?;
        if devices.is_empty() {
            return Err(AdbError::NoDevices);
        }
        let device = match transport_id {
            Some(tid) => devices
                .into_iter()
                .find(|d| d.transport_id.as_deref() == Some(tid)),
            None => devices.into_iter().next(),
        }
        .ok_or_else(|| AdbError::DeviceNotFound {
            name: transport_id.unwrap_or_default().to_string(),
        })?;
        let transport_id = device
            .transport_id
            .as_deref()
            .and_then(|t| t.parse::<u32>().ok())
            .ok_or_else(|| AdbError::ConnectionFailed {
                description: format!("device '{}' has no usable transport_id", device.name),
            })?;
        let size_out = Self::run_adb(&[
            "-t".into(),
            transport_id.to_string(),
            "shell".into(),
            "wm".into(),
            "size".into(),
        ])
        .await?;
        let (screen_x, screen_y) = parse_screen_size(&String::from_utf8_lossy(&size_out))
            .ok_or(AdbError::ScreenSizeParseFailed)?;
        log::info!(
            "AdbShell connected to '{}' transport {} ({}x{})",
            device.name,
            transport_id,
            screen_x,
            screen_y
        );
        Ok(Self {
            device,
            transport_id,
            screen_x,
            screen_y,
        })
    }

    pub fn parse_devices(output: &str) -> Vec<Device> {
        output
            .lines()
            .skip(1)
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 2 && parts[1] == "device" {
                    let transport_id = parts
                        .iter()
                        .find_map(|part| part.strip_prefix("transport_id:"))
                        .map(str::to_string);
                    Some(Device {
                        name: parts[0].to_string(),
                        transport_id,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

impl AdbClient for AdbShell {
    async fn list_devices() -> AdbResult<Vec<Device>> {
        let out = Self::run_adb(&["devices".into(), "-l".into()]).await?;
        Ok(Self::parse_devices(&String::from_utf8_lossy(&out)))
    }

    async fn new_with_device(device_name: &str) -> AdbResult<Self> {
        if device_name.is_empty() {
            return Self::new(None).await;
        }
        let devices = Self::list_devices().await?;
        if let Some(device) = devices.iter().find(|d| d.name == device_name) {
            return Self::new(device.transport_id.as_deref()).await;
        }
        // Network serials (host:port) may need an explicit connect
        let out = Self::run_adb(&["connect".into(), device_name.into()]).await?;
        let stdout = String::from_utf8_lossy(&out);
        if stdout.contains("Connection refused") || stdout.contains("failed") {
            return Err(AdbError::ConnectionFailed {
                description: format!("adb connect {device_name}: {}", stdout.trim()),
            });
        }
        let devices = Self::list_devices().await?;
        match devices.iter().find(|d| d.name == device_name) {
            Some(device) => Self::new(device.transport_id.as_deref()).await,
            None => Err(AdbError::DeviceNotFound {
                name: device_name.to_string(),
            }),
        }
    }

    async fn shell(&self, args: &[&str]) -> AdbResult<String> {
        let mut rest = vec!["shell"];
        rest.extend_from_slice(args);
        let out = Self::run_adb(&self.transport_args(&rest)).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>> {
        Self::run_adb(&self.transport_args(&["exec-out", "screencap", "-p"])).await
    }

    fn screen_dimensions(&self) -> (u32, u32) {
        (self.screen_x, self.screen_y)
    }

    fn device_name(&self) -> &str {
        &self.device.name
    }

    fn transport_id(&self) -> Option<u32> {
        Some(self.transport_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_devices_basic() {
        let adb_output = "List of devices attached\nabc123 device transport_id:5\n";
        let devs = AdbShell::parse_devices(adb_output);
        assert_eq!(devs.len(), 1);
        assert_eq!(devs[0].name, "abc123");
        assert_eq!(devs[0].transport_id, Some("5".to_string()));
    }

    #[test]
    fn parse_devices_skips_offline_and_unauthorized() {
        let adb_output = "List of devices attached\n\
            emulator-5554          device product:sdk model:Pixel transport_id:1\n\
            R58M12345              unauthorized usb:1-2 transport_id:2\n\
            192.168.1.20:5555      offline transport_id:3\n";
        let devices = AdbShell::parse_devices(adb_output);
        assert_eq!(
            devices,
            vec![Device {
                name: "emulator-5554".to_string(),
                transport_id: Some("1".to_string())
            }]
        );
    }

    #[test]
    fn parse_devices_empty_list() {
        assert!(AdbShell::parse_devices("List of devices attached\n\n").is_empty());
    }
}
