// Scripted in-memory device for tests: replays frames, records inputs
use super::error::{DeviceError, DeviceResult};
use super::frame::Frame;
use super::{DeviceBridge, Point};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Tap(Point),
    Swipe(Vec<Point>, Duration),
    Text(String),
    Back,
    Foreground(String),
    Restart(String),
    Home,
}

/// Each `capture` pops the next frame; the last frame repeats once the script runs out.
#[derive(Default)]
pub struct ScriptedDevice {
    frames: VecDeque<Frame>,
    last: Option<Frame>,
    pub inputs: Vec<Input>,
    pub captures: usize,
    /// When set, every call fails with DeviceUnavailable
    pub offline: bool,
    /// When set, `ensure_foreground` fails with InputRejected carrying this reason
    pub launch_rejection: Option<String>,
}

impl ScriptedDevice {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    pub fn taps(&self) -> Vec<Point> {
        self.inputs
            .iter()
            .filter_map(|i| match i {
                Input::Tap(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    fn check_online(&self) -> DeviceResult<()> {
        if self.offline {
            Err(DeviceError::DeviceUnavailable {
                reason: "scripted device offline".into(),
            })
        } else {
            Ok(())
        }
    }
}

impl DeviceBridge for ScriptedDevice {
    async fn capture(&mut self) -> DeviceResult<Frame> {
        self.check_online()?;
        self.captures += 1;
        if let Some(next) = self.frames.pop_front() {
            self.last = Some(next);
        }
        self.last.clone().ok_or_else(|| DeviceError::DeviceUnavailable {
            reason: "no frames scripted".into(),
        })
    }

    async fn tap(&mut self, at: Point) -> DeviceResult<()> {
        self.check_online()?;
        self.inputs.push(Input::Tap(at));
        Ok(())
    }

    async fn swipe(&mut self, path: &[Point], duration: Duration) -> DeviceResult<()> {
        self.check_online()?;
        self.inputs.push(Input::Swipe(path.to_vec(), duration));
        Ok(())
    }

    async fn type_text(&mut self, text: &str) -> DeviceResult<()> {
        self.check_online()?;
        self.inputs.push(Input::Text(text.to_string()));
        Ok(())
    }

    async fn back(&mut self) -> DeviceResult<()> {
        self.check_online()?;
        self.inputs.push(Input::Back);
        Ok(())
    }

    async fn ensure_foreground(&mut self, app_id: &str) -> DeviceResult<()> {
        self.check_online()?;
        if let Some(reason) = &self.launch_rejection {
            return Err(DeviceError::InputRejected {
                reason: reason.clone(),
            });
        }
        self.inputs.push(Input::Foreground(app_id.to_string()));
        Ok(())
    }

    async fn restart_app(&mut self, app_id: &str) -> DeviceResult<()> {
        self.check_online()?;
        self.inputs.push(Input::Restart(app_id.to_string()));
        Ok(())
    }

    async fn send_to_background(&mut self) -> DeviceResult<()> {
        self.check_online()?;
        self.inputs.push(Input::Home);
        Ok(())
    }
}
