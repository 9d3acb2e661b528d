//! Action Executor: perform one input, then re-observe until the expected
//! state shows up or the verification budget runs out.
//!
//! The input itself is never repeated here; retry policy belongs to the task.

pub mod action;

pub use action::{Action, ActionKind, Expectation};

use crate::config::ExecutorSection;
use crate::device::{DeviceBridge, DeviceResult};
use crate::recognizer::{RecognizedState, Recognizer};
use crate::vision::VisionPipeline;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Success(RecognizedState),
    /// Not an error: the caller decides whether to retry
    VerificationFailed { last: RecognizedState },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success(_))
    }

    /// The last observed state either way
    pub fn state(&self) -> &RecognizedState {
        match self {
            ExecutionResult::Success(state) => state,
            ExecutionResult::VerificationFailed { last } => last,
        }
    }

    pub fn into_state(self) -> RecognizedState {
        match self {
            ExecutionResult::Success(state) => state,
            ExecutionResult::VerificationFailed { last } => last,
        }
    }
}

/// Capture -> observe -> recognize in one call.
pub struct StateObserver {
    pipeline: VisionPipeline,
    recognizer: Recognizer,
}

impl StateObserver {
    /// Screen rules come from the pipeline's catalog.
    pub fn new(pipeline: VisionPipeline) -> Self {
        let recognizer = Recognizer::new(pipeline.catalog().rules().to_vec());
        Self {
            pipeline,
            recognizer,
        }
    }

    pub fn pipeline(&self) -> &VisionPipeline {
        &self.pipeline
    }

    pub fn recognizer(&self) -> &Recognizer {
        &self.recognizer
    }

    pub async fn look<D: DeviceBridge>(&self, device: &mut D) -> DeviceResult<RecognizedState> {
        let frame = device.capture().await?;
        let observation = self.pipeline.observe_all(&frame);
        let state = self.recognizer.recognize(observation);
        log::debug!(
            "Recognized '{}'{}",
            state.name(),
            if state.ambiguous { " (ambiguous)" } else { "" }
        );
        Ok(state)
    }
}

pub struct Executor {
    verify_attempts: u32,
    verify_interval: Duration,
}

impl Executor {
    pub fn new(cfg: &ExecutorSection) -> Self {
        Self {
            verify_attempts: cfg.verify_attempts.max(1),
            verify_interval: cfg.verify_interval(),
        }
    }

    /// Perform `action` and verify its expectation. Device failures propagate;
    /// an unmet expectation is `VerificationFailed`.
    pub async fn perform<D: DeviceBridge>(
        &self,
        device: &mut D,
        observer: &StateObserver,
        action: &Action,
    ) -> DeviceResult<ExecutionResult> {
        log::info!("▶ {action}");
        match &action.kind {
            ActionKind::Tap(at) => device.tap(*at).await?,
            ActionKind::Swipe { path, duration } => device.swipe(path, *duration).await?,
            ActionKind::TypeText(text) => device.type_text(text).await?,
            ActionKind::Back => device.back().await?,
            ActionKind::Wait(duration) => sleep(*duration).await,
            ActionKind::RestartApp(app_id) => device.restart_app(app_id).await?,
        }

        let mut attempt = 0;
        loop {
            let state = observer.look(device).await?;
            attempt += 1;
            if action.expect.accepts(&state) {
                log::debug!("Verified '{}' after {attempt} observation(s)", state.name());
                return Ok(ExecutionResult::Success(state));
            }
            if attempt >= self.verify_attempts {
                log::warn!(
                    "Verification failed for {action}: still on '{}' after {attempt} observation(s)",
                    state.name()
                );
                return Ok(ExecutionResult::VerificationFailed { last: state });
            }
            sleep(self.verify_interval).await;
        }
    }
}

#[cfg(test)]
mod tests;
