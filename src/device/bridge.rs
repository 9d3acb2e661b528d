// ADB-backed Device Bridge: owns the session, reconnects, scales coordinates
use super::backoff::ReconnectPolicy;
use super::error::{DeviceError, DeviceResult};
use super::frame::Frame;
use super::session::{AdbConnector, Connector, DeviceSession};
use super::{DeviceBridge, Point};
use crate::adb::{AdbError, AdbResult, KEYCODE_BACK, KEYCODE_HOME};
use crate::config::DeviceSection;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Device Bridge over an ADB session. The session is opened lazily and
/// dropped on any disconnect-looking failure, then re-opened with backoff.
pub struct AdbDeviceBridge<C: Connector = AdbConnector> {
    connector: C,
    session: Option<C::Session>,
    policy: ReconnectPolicy,
    settle: Duration,
    launch_timeout: Duration,
    launch_poll: Duration,
    /// Resolution that incoming coordinates are expressed in
    reference_size: (u32, u32),
}

impl AdbDeviceBridge {
    pub fn new(cfg: &DeviceSection, reference_size: (u32, u32)) -> Self {
        let connector = AdbConnector {
            serial: cfg.serial.clone(),
            backend: cfg.backend,
        };
        Self::with_connector(connector, cfg, reference_size)
    }
}

impl<C: Connector> AdbDeviceBridge<C> {
    pub fn with_connector(connector: C, cfg: &DeviceSection, reference_size: (u32, u32)) -> Self {
        Self {
            connector,
            session: None,
            policy: ReconnectPolicy::new(
                cfg.reconnect_attempts,
                Duration::from_millis(cfg.reconnect_base_ms),
                Duration::from_millis(cfg.reconnect_max_ms),
            ),
            settle: cfg.settle(),
            launch_timeout: cfg.launch_timeout(),
            launch_poll: cfg.launch_poll(),
            reference_size,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Drop the session; the next call reconnects.
    pub fn release(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("Releasing device session '{}'", session.device_name());
        }
    }

    /// Open the session now instead of on first use.
    pub async fn acquire(&mut self) -> DeviceResult<()> {
        self.with_session("connect", async |_| Ok(())).await
    }

    /// Physical screen size of the current session.
    pub fn screen_size(&self) -> Option<(u32, u32)> {
        self.session.as_ref().map(|s| s.screen_dimensions())
    }

    /// Run `op` against the session, reconnecting with backoff on disconnects.
    /// Non-disconnect failures are returned as `InputRejected` without retrying.
    async fn with_session<T>(
        &mut self,
        what: &str,
        op: impl AsyncFn(&C::Session) -> AdbResult<T>,
    ) -> DeviceResult<T> {
        let mut attempt = 0u32;
        loop {
            let failure: AdbError = if let Some(session) = self.session.as_ref() {
                match op(session).await {
                    Ok(value) => return Ok(value),
                    Err(e) if e.is_disconnect() => e,
                    Err(e) => {
                        return Err(DeviceError::InputRejected {
                            reason: format!("{what}: {e}"),
                        });
                    }
                }
            } else {
                match self.connector.connect().await {
                    Ok(session) => {
                        let (w, h) = session.screen_dimensions();
                        log::info!("Device session open on '{}' ({}x{})", session.device_name(), w, h);
                        self.session = Some(session);
                        continue;
                    }
                    Err(e) => e,
                }
            };

            self.session = None;
            if attempt >= self.policy.attempts {
                log::error!("{what}: device unreachable after {attempt} reconnect attempts: {failure}");
                return Err(DeviceError::DeviceUnavailable {
                    reason: format!("{what}: {failure}"),
                });
            }
            let delay = self.policy.delay(attempt);
            log::warn!(
                "{what}: {failure}; reconnecting in {:?} (attempt {}/{})",
                delay,
                attempt + 1,
                self.policy.attempts
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    async fn foreground_matches(&mut self, app_id: &str) -> DeviceResult<bool> {
        let current = self
            .with_session("foreground query", async |s| s.foreground_package().await)
            .await?;
        log::debug!("Foreground package: {:?}", current);
        Ok(current.as_deref() == Some(app_id))
    }
}

impl<C: Connector> DeviceBridge for AdbDeviceBridge<C> {
    /// A capture that arrives but does not decode is `InputRejected`; the
    /// session itself is fine.
    async fn capture(&mut self) -> DeviceResult<Frame> {
        self.with_session("capture", async |s| {
            let capture = s.screen_capture().await?;
            log::debug!(
                "Captured {} bytes in {}ms",
                capture.bytes.len(),
                capture.duration_ms
            );
            Frame::from_png(&capture.bytes).map_err(|e| AdbError::FramebufferToPngFailed {
                description: format!("capture could not be decoded: {e}"),
            })
        })
        .await
    }

    async fn tap(&mut self, at: Point) -> DeviceResult<()> {
        let reference = self.reference_size;
        self.with_session("tap", async |s| {
            let p = at.scale(reference, s.screen_dimensions());
            s.tap(p.x, p.y).await
        })
        .await?;
        sleep(self.settle).await;
        Ok(())
    }

    async fn swipe(&mut self, path: &[Point], duration: Duration) -> DeviceResult<()> {
        if path.len() < 2 {
            return Err(DeviceError::InputRejected {
                reason: format!("swipe needs at least two points, got {}", path.len()),
            });
        }
        let segments = (path.len() - 1) as u32;
        let per_segment = (duration.as_millis() as u32 / segments).max(1);
        for pair in path.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let reference = self.reference_size;
            self.with_session("swipe", async |s| {
                let physical = s.screen_dimensions();
                let a = from.scale(reference, physical);
                let b = to.scale(reference, physical);
                s.swipe(a.x, a.y, b.x, b.y, Some(per_segment)).await
            })
            .await?;
        }
        sleep(self.settle).await;
        Ok(())
    }

    async fn type_text(&mut self, text: &str) -> DeviceResult<()> {
        self.with_session("type text", async |s| s.input_text(text).await)
            .await?;
        sleep(self.settle).await;
        Ok(())
    }

    async fn back(&mut self) -> DeviceResult<()> {
        self.with_session("back", async |s| s.key_event(KEYCODE_BACK).await)
            .await?;
        sleep(self.settle).await;
        Ok(())
    }

    async fn ensure_foreground(&mut self, app_id: &str) -> DeviceResult<()> {
        if self.foreground_matches(app_id).await? {
            return Ok(());
        }
        log::info!("'{app_id}' is not in the foreground, launching");
        self.with_session("launch", async |s| s.launch_app(app_id).await)
            .await?;

        let started = Instant::now();
        loop {
            sleep(self.launch_poll).await;
            if self.foreground_matches(app_id).await? {
                log::info!("'{app_id}' in foreground after {:?}", started.elapsed());
                sleep(self.settle).await;
                return Ok(());
            }
            if started.elapsed() >= self.launch_timeout {
                return Err(DeviceError::LaunchTimeout {
                    app_id: app_id.to_string(),
                    waited: started.elapsed(),
                });
            }
        }
    }

    async fn restart_app(&mut self, app_id: &str) -> DeviceResult<()> {
        log::warn!("Restarting '{app_id}'");
        self.with_session("force-stop", async |s| s.force_stop(app_id).await)
            .await?;
        sleep(self.settle).await;
        self.ensure_foreground(app_id).await
    }

    async fn send_to_background(&mut self) -> DeviceResult<()> {
        self.with_session("home", async |s| s.key_event(KEYCODE_HOME).await)
            .await?;
        sleep(self.settle).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::ImageCapture;
    use image::{DynamicImage, ImageFormat};
    use std::cell::{Cell, RefCell};
    use std::io::Cursor;
    use std::rc::Rc;

    const APP: &str = "com.gof.global";

    /// What the fake device saw, shared between connector and sessions
    #[derive(Default)]
    struct Log {
        connects: Cell<u32>,
        launches: Cell<u32>,
        /// Taps that fail as a dropped transport before taps go through
        desyncs: Cell<u32>,
        taps: RefCell<Vec<(u32, u32)>>,
        keys: RefCell<Vec<u32>>,
    }

    struct FakeConnector {
        log: Rc<Log>,
        /// Connects refused before the device answers
        refuse: u32,
        foreground: Option<&'static str>,
        png: Vec<u8>,
    }

    struct FakeSession {
        log: Rc<Log>,
        foreground: Option<&'static str>,
        png: Vec<u8>,
    }

    impl Connector for FakeConnector {
        type Session = FakeSession;

        async fn connect(&self) -> AdbResult<FakeSession> {
            let n = self.log.connects.get() + 1;
            self.log.connects.set(n);
            if n <= self.refuse {
                return Err(AdbError::ConnectionFailed {
                    description: "device offline".into(),
                });
            }
            Ok(FakeSession {
                log: self.log.clone(),
                foreground: self.foreground,
                png: self.png.clone(),
            })
        }
    }

    impl DeviceSession for FakeSession {
        fn device_name(&self) -> &str {
            "fake"
        }

        fn screen_dimensions(&self) -> (u32, u32) {
            (1080, 1920)
        }

        async fn screen_capture(&self) -> AdbResult<ImageCapture> {
            Ok(ImageCapture {
                bytes: self.png.clone(),
                duration_ms: 1,
            })
        }

        async fn tap(&self, x: u32, y: u32) -> AdbResult<()> {
            let pending = self.log.desyncs.get();
            if pending > 0 {
                self.log.desyncs.set(pending - 1);
                return Err(AdbError::ProtocolDesync {
                    description: "CLSE".into(),
                });
            }
            self.log.taps.borrow_mut().push((x, y));
            Ok(())
        }

        async fn swipe(&self, _: u32, _: u32, _: u32, _: u32, _: Option<u32>) -> AdbResult<()> {
            Ok(())
        }

        async fn input_text(&self, _: &str) -> AdbResult<()> {
            Ok(())
        }

        async fn key_event(&self, key_code: u32) -> AdbResult<()> {
            self.log.keys.borrow_mut().push(key_code);
            Ok(())
        }

        async fn foreground_package(&self) -> AdbResult<Option<String>> {
            Ok(self.foreground.map(str::to_string))
        }

        async fn launch_app(&self, _: &str) -> AdbResult<()> {
            self.log.launches.set(self.log.launches.get() + 1);
            Ok(())
        }

        async fn force_stop(&self, _: &str) -> AdbResult<()> {
            Ok(())
        }
    }

    fn section() -> DeviceSection {
        DeviceSection {
            settle_ms: 10,
            reconnect_attempts: 3,
            reconnect_base_ms: 100,
            reconnect_max_ms: 1_000,
            launch_timeout_secs: 10,
            launch_poll_ms: 2_000,
            ..DeviceSection::default()
        }
    }

    fn png() -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::new_rgb8(4, 4)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn bridge(
        refuse: u32,
        foreground: Option<&'static str>,
    ) -> (AdbDeviceBridge<FakeConnector>, Rc<Log>) {
        let log = Rc::new(Log::default());
        let connector = FakeConnector {
            log: log.clone(),
            refuse,
            foreground,
            png: png(),
        };
        (AdbDeviceBridge::with_connector(connector, &section(), (720, 1280)), log)
    }

    #[test]
    fn bridge_starts_disconnected() {
        let bridge = AdbDeviceBridge::new(&DeviceSection::default(), (720, 1280));
        assert!(!bridge.is_connected());
        assert_eq!(bridge.screen_size(), None);
        assert_eq!(bridge.reference_size, (720, 1280));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_device_gives_up_after_the_reconnect_budget() {
        let (mut bridge, log) = bridge(u32::MAX, Some(APP));
        let started = Instant::now();

        let err = bridge.tap(Point::new(10, 10)).await.unwrap_err();

        assert!(matches!(err, DeviceError::DeviceUnavailable { .. }), "{err:?}");
        assert!(err.is_device_loss());
        // first try plus one per allowed reconnect
        assert_eq!(log.connects.get(), 4);
        // 100 + 200 + 400 ms of backoff
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(700), "{waited:?}");
        assert!(waited < Duration::from_millis(750), "{waited:?}");
        assert!(!bridge.is_connected());
        assert!(log.taps.borrow().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn device_that_returns_within_budget_gets_the_input() {
        let (mut bridge, log) = bridge(2, Some(APP));

        bridge.tap(Point::new(100, 200)).await.unwrap();

        assert_eq!(log.connects.get(), 3);
        assert!(bridge.is_connected());
        assert_eq!(bridge.screen_size(), Some((1080, 1920)));
        // reference 720x1280 scaled to the physical 1080x1920
        assert_eq!(*log.taps.borrow(), vec![(150, 300)]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_session_is_reopened_and_the_call_repeated() {
        let (mut bridge, log) = bridge(0, Some(APP));
        log.desyncs.set(1);

        bridge.tap(Point::new(0, 0)).await.unwrap();

        assert_eq!(log.connects.get(), 2);
        assert_eq!(log.taps.borrow().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn launch_that_never_reaches_foreground_times_out() {
        let (mut bridge, log) = bridge(0, Some("com.android.launcher3"));

        let err = bridge.ensure_foreground(APP).await.unwrap_err();

        match &err {
            DeviceError::LaunchTimeout { app_id, waited } => {
                assert_eq!(app_id, APP);
                assert!(*waited >= Duration::from_secs(10), "{waited:?}");
            }
            other => panic!("expected LaunchTimeout, got {other:?}"),
        }
        assert!(err.is_device_loss());
        assert_eq!(log.launches.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn foreground_app_is_not_relaunched() {
        let (mut bridge, log) = bridge(0, Some(APP));
        bridge.ensure_foreground(APP).await.unwrap();
        assert_eq!(log.launches.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_decodes_the_png() {
        let (mut bridge, _log) = bridge(0, Some(APP));
        let frame = bridge.capture().await.unwrap();
        assert_eq!(frame.size(), (4, 4));
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_capture_is_rejected_not_lost() {
        let log = Rc::new(Log::default());
        let connector = FakeConnector {
            log: log.clone(),
            refuse: 0,
            foreground: Some(APP),
            png: b"not a png".to_vec(),
        };
        let mut bridge = AdbDeviceBridge::with_connector(connector, &section(), (720, 1280));

        let err = bridge.capture().await.unwrap_err();

        assert!(matches!(err, DeviceError::InputRejected { .. }), "{err:?}");
        assert!(!err.is_device_loss());
        assert_eq!(log.connects.get(), 1);
        assert!(bridge.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn back_and_home_are_key_events() {
        let (mut bridge, log) = bridge(0, Some(APP));
        bridge.back().await.unwrap();
        bridge.send_to_background().await.unwrap();
        assert_eq!(*log.keys.borrow(), vec![KEYCODE_BACK, KEYCODE_HOME]);
    }
}
