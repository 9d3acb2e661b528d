// Device Bridge - the only owner of the live device session
// Tasks reach the device exclusively through the action executor.

pub mod backoff;
pub mod bridge;
pub mod error;
pub mod frame;
pub mod session;

#[cfg(test)]
pub mod scripted;

pub use backoff::ReconnectPolicy;
pub use bridge::AdbDeviceBridge;
pub use error::{DeviceError, DeviceResult};
pub use frame::Frame;
pub use session::{AdbConnector, Connector, DeviceSession};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A screen position in catalog reference coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Map from a `from` resolution to a `to` resolution, rounding to nearest.
    pub fn scale(self, from: (u32, u32), to: (u32, u32)) -> Self {
        if from == to || from.0 == 0 || from.1 == 0 {
            return self;
        }
        let sx = (self.x as u64 * to.0 as u64 + from.0 as u64 / 2) / from.0 as u64;
        let sy = (self.y as u64 * to.1 as u64 + from.1 as u64 / 2) / from.1 as u64;
        Self {
            x: (sx as u32).min(to.0.saturating_sub(1)),
            y: (sy as u32).min(to.1.saturating_sub(1)),
        }
    }
}

/// Device operations the engine needs. Every input method returns only after
/// the settle delay has elapsed.
#[allow(async_fn_in_trait)]
pub trait DeviceBridge {
    async fn capture(&mut self) -> DeviceResult<Frame>;
    async fn tap(&mut self, at: Point) -> DeviceResult<()>;
    /// Swipe through `path` (at least two points) over `duration` in total.
    async fn swipe(&mut self, path: &[Point], duration: Duration) -> DeviceResult<()>;
    async fn type_text(&mut self, text: &str) -> DeviceResult<()>;
    async fn back(&mut self) -> DeviceResult<()>;
    /// Relaunch `app_id` unless it already holds the foreground.
    async fn ensure_foreground(&mut self, app_id: &str) -> DeviceResult<()>;
    /// Force-stop then relaunch `app_id`.
    async fn restart_app(&mut self, app_id: &str) -> DeviceResult<()>;
    /// Leave the app for the launcher; the next `ensure_foreground` brings it back.
    async fn send_to_background(&mut self) -> DeviceResult<()>;
}
