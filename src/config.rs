//! Engine configuration loaded from `config/default.toml` and environment variables.
//!
//! Load order: the TOML file first, then `WOS__*` environment variables on top
//! (double underscore marks nesting, e.g. `WOS__DEVICE__SERIAL=emulator-5554`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adb::BackendKind;
use crate::tasks::ChiefOrderKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration could not be loaded: {0}")]
    Load(#[from] config::ConfigError),

    #[error("config file {0} does not exist")]
    MissingFile(PathBuf),
}

/// Configuration root (top level of config/default.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub device: DeviceSection,
    pub vision: VisionSection,
    pub executor: ExecutorSection,
    pub scheduler: SchedulerSection,
    pub persistence: PersistenceSection,
    /// Per-task overrides keyed by task id (`[tasks.chief_order]`)
    pub tasks: BTreeMap<String, TaskSection>,
}

/// [device] section: which device, which transport, timing of the bridge
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceSection {
    /// Serial to connect to; empty picks the first listed device
    pub serial: String,
    pub backend: BackendKind,
    /// Android package of the game
    pub app_id: String,
    pub settle_ms: u64,
    pub reconnect_attempts: u32,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    pub launch_timeout_secs: u64,
    pub launch_poll_ms: u64,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            serial: String::new(),
            backend: BackendKind::Rust,
            app_id: "com.gof.global".to_string(),
            settle_ms: 800,
            reconnect_attempts: 4,
            reconnect_base_ms: 500,
            reconnect_max_ms: 8_000,
            launch_timeout_secs: 60,
            launch_poll_ms: 2_000,
        }
    }
}

impl DeviceSection {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }

    pub fn launch_poll(&self) -> Duration {
        Duration::from_millis(self.launch_poll_ms)
    }
}

/// [vision] section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VisionSection {
    /// Directory holding catalog.json and the template images it names
    pub assets_dir: PathBuf,
    /// Threshold for templates that do not declare their own
    pub default_threshold: f32,
    /// ocrs detection model (.rten); text regions use glyph matching when unset
    pub ocr_detection_model: Option<PathBuf>,
    pub ocr_recognition_model: Option<PathBuf>,
}

impl Default for VisionSection {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            default_threshold: 0.9,
            ocr_detection_model: None,
            ocr_recognition_model: None,
        }
    }
}

/// [executor] section: post-action verification polling
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorSection {
    pub verify_attempts: u32,
    pub verify_interval_ms: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            verify_attempts: 5,
            verify_interval_ms: 600,
        }
    }
}

impl ExecutorSection {
    pub fn verify_interval(&self) -> Duration {
        Duration::from_millis(self.verify_interval_ms)
    }
}

/// What the scheduler does with the game while nothing is due
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleBehavior {
    #[default]
    DoNothing,
    /// Press Home so the game stops rendering until the next task
    SendToBackground,
}

/// [scheduler] section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// VerificationFailed results tolerated before a run fails
    pub retry_ceiling: u32,
    /// Consecutive Unknown recognitions tolerated before a run fails
    pub unknown_ceiling: u32,
    pub failure_backoff_secs: u64,
    pub max_steps_per_run: u32,
    /// Pause between re-observations of an Unknown screen
    pub idle_poll_ms: u64,
    pub idle_behavior: IdleBehavior,
    /// Only idle waits at least this long apply `idle_behavior`
    pub idle_background_after_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            retry_ceiling: 3,
            unknown_ceiling: 5,
            failure_backoff_secs: 600,
            max_steps_per_run: 40,
            idle_poll_ms: 1_000,
            idle_behavior: IdleBehavior::DoNothing,
            idle_background_after_secs: 300,
        }
    }
}

impl SchedulerSection {
    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn idle_background_after(&self) -> Duration {
        Duration::from_secs(self.idle_background_after_secs)
    }
}

/// [persistence] section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceSection {
    pub database: PathBuf,
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self {
            database: PathBuf::from("wos-automator.db"),
        }
    }
}

/// [tasks.<id>] section; unset fields fall back to the task kind's defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskSection {
    pub enabled: bool,
    pub priority: Option<u32>,
    pub interval_minutes: Option<u64>,
    /// Only read by the chief order task
    pub order: Option<ChiefOrderKind>,
}

impl Default for TaskSection {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: None,
            interval_minutes: None,
            order: None,
        }
    }
}

impl EngineConfig {
    pub fn task(&self, id: &str) -> TaskSection {
        self.tasks.get(id).cloned().unwrap_or_default()
    }
}

/// Load configuration:
///
/// 1. `config/default.toml` when present
/// 2. `config_path` on top (must exist when given)
/// 3. `WOS__*` environment variables last
pub fn load_config(config_path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let mut builder = config::Config::builder();

    if Path::new("config/default.toml").exists() {
        builder = builder.add_source(config::File::with_name("config/default").required(false));
    }

    if let Some(path) = config_path {
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }
        builder = builder.add_source(config::File::from(path.to_path_buf()));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WOS")
            .separator("__")
            .try_parsing(true),
    );

    Ok(builder.build()?.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_usable() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.device.backend, BackendKind::Rust);
        assert!(cfg.scheduler.retry_ceiling > 0);
        assert_eq!(cfg.scheduler.idle_behavior, IdleBehavior::DoNothing);
        assert!(cfg.task("exploration").enabled);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[device]
serial = "emulator-5554"
backend = "shell"
settle_ms = 250

[scheduler]
retry_ceiling = 7
idle_behavior = "send_to_background"

[tasks.chief_order]
priority = 2
order = "urgent_mobilization"

[tasks.exploration]
enabled = false
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.device.serial, "emulator-5554");
        assert_eq!(cfg.device.backend, BackendKind::Shell);
        assert_eq!(cfg.device.settle(), Duration::from_millis(250));
        // untouched keys keep their defaults
        assert_eq!(cfg.device.app_id, "com.gof.global");
        assert_eq!(cfg.scheduler.retry_ceiling, 7);
        assert_eq!(cfg.scheduler.unknown_ceiling, 5);
        assert_eq!(cfg.scheduler.idle_behavior, IdleBehavior::SendToBackground);
        let chief = cfg.task("chief_order");
        assert_eq!(chief.priority, Some(2));
        assert_eq!(chief.order, Some(ChiefOrderKind::UrgentMobilization));
        assert!(!cfg.task("exploration").enabled);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(_)));
    }
}
