pub mod adb;
pub mod config;
pub mod device;
pub mod executor;
pub mod persistence;
pub mod recognizer;
pub mod scheduler;
pub mod tasks;
pub mod vision;

#[cfg(test)]
pub(crate) mod testkit;

pub use config::{EngineConfig, load_config};
pub use device::{AdbDeviceBridge, DeviceBridge};
pub use scheduler::Scheduler;
