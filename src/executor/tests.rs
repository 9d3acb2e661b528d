use super::*;
use crate::device::Point;
use crate::device::scripted::{Input, ScriptedDevice};
use crate::testkit::{dialog_frame, map_frame, observer, unknown_frame};

fn executor(attempts: u32) -> Executor {
    Executor::new(&ExecutorSection {
        verify_attempts: attempts,
        verify_interval_ms: 1,
    })
}

#[tokio::test]
async fn tap_verified_on_first_observation() {
    let mut device = ScriptedDevice::new([map_frame()]);
    let action = Action::tap(Point::new(128, 28)).expect_screen("home");

    let result = executor(3)
        .perform(&mut device, &observer(), &action)
        .await
        .unwrap();

    assert!(result.is_success());
    assert!(result.state().is("home"));
    assert_eq!(device.inputs, vec![Input::Tap(Point::new(128, 28))]);
    assert_eq!(device.captures, 1);
}

#[tokio::test]
async fn polls_until_expected_state_appears() {
    let mut device = ScriptedDevice::new([dialog_frame(), unknown_frame(), map_frame()]);
    let action = Action::tap(Point::new(128, 28)).expect_not("popup");

    let result = executor(5)
        .perform(&mut device, &observer(), &action)
        .await
        .unwrap();

    assert!(result.state().is("home"));
    assert_eq!(device.captures, 3);
    // the input is performed once regardless of polling
    assert_eq!(device.taps().len(), 1);
}

#[tokio::test]
async fn exhausted_attempts_report_last_state() {
    let mut device = ScriptedDevice::new([dialog_frame()]);
    let action = Action::tap(Point::new(128, 28)).expect_not("popup");

    let result = executor(3)
        .perform(&mut device, &observer(), &action)
        .await
        .unwrap();

    match result {
        ExecutionResult::VerificationFailed { last } => assert!(last.is("popup")),
        other => panic!("expected VerificationFailed, got {other:?}"),
    }
    assert_eq!(device.captures, 3);
    assert_eq!(device.taps().len(), 1);
}

#[tokio::test]
async fn wait_sends_no_input() {
    let mut device = ScriptedDevice::new([unknown_frame()]);
    let result = executor(1)
        .perform(&mut device, &observer(), &Action::wait(Duration::from_millis(1)))
        .await
        .unwrap();
    assert!(result.is_success());
    assert!(result.state().is_unknown());
    assert!(device.inputs.is_empty());
}

#[tokio::test]
async fn device_failure_propagates() {
    let mut device = ScriptedDevice::new([map_frame()]);
    device.offline = true;
    let err = executor(2)
        .perform(&mut device, &observer(), &Action::back())
        .await
        .unwrap_err();
    assert!(err.is_device_loss());
}

#[test]
fn not_screen_rejects_unknown() {
    let obs = observer();
    let unknown = obs.recognizer().recognize(obs.pipeline().observe_all(&unknown_frame()));
    let home = obs.recognizer().recognize(obs.pipeline().observe_all(&map_frame()));
    let expect = Expectation::NotScreen("popup".into());
    assert!(!expect.accepts(&unknown));
    assert!(expect.accepts(&home));
    assert!(Expectation::AnyOf(vec!["world".into(), "home".into()]).accepts(&home));
}

#[test]
fn display_names_the_expectation() {
    let action = Action::tap(Point::new(3, 4)).expect_screen("home");
    assert_eq!(action.to_string(), "tap (3, 4) -> home");
    assert_eq!(Action::back().expect_not("popup").to_string(), "back -> not popup");
}
