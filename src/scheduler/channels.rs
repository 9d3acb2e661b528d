// Communication channels between the scheduler and its controllers
use super::types::{ControlCommand, Notification};
use tokio::sync::mpsc;

/// Helper function to create control channels
pub fn create_control_channels() -> (
    mpsc::Sender<ControlCommand>,
    mpsc::Receiver<ControlCommand>,
    mpsc::Sender<Notification>,
    mpsc::Receiver<Notification>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, event_rx) = mpsc::channel(32);
    (cmd_tx, cmd_rx, event_tx, event_rx)
}
