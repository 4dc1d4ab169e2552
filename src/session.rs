use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use log::{info, warn};

use crate::clock::Clock;
use crate::config::{AppConfig, EngineKind};
use crate::encoder::QuadratureDecoder;
use crate::engine::{EdgeConsumer, Engine};
use crate::error::GestureError;
use crate::event::{EventSink, Level};
use crate::gesture::{GestureClassifier, Thresholds};
use crate::poller::{EdgePoller, LevelSource};

/// Owns the polling thread. Dropping the handle stops the session.
pub struct SessionHandle {
    cancel: Arc<AtomicBool>,
    initial_levels: Vec<Level>,
    handle: Option<JoinHandle<Result<(), GestureError>>>,
}

pub struct Session;

impl Session {
    pub fn start<S, C, K>(
        config: &AppConfig,
        source: S,
        clock: C,
        mut sink: K,
    ) -> Result<SessionHandle, GestureError>
    where
        S: LevelSource + 'static,
        C: Clock + 'static,
        K: EventSink + Send + 'static,
    {
        config.validate()?;
        let poller = EdgePoller::open(source, &config.lines, config.timing.poll_timeout())?;

        let consumer: Box<dyn EdgeConsumer + Send> = match config.engine {
            EngineKind::Buttons => Box::new(GestureClassifier::new(
                config.lines.len(),
                Thresholds {
                    short_press: config.timing.short_press(),
                    long_press: config.timing.long_press(),
                },
            )),
            EngineKind::Encoder => Box::new(QuadratureDecoder::new()),
        };
        let initial_levels = poller.levels();
        let engine = Engine::new(poller, consumer, clock);

        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = cancel.clone();
        let handle = std::thread::Builder::new()
            .name("edge-poller".into())
            .spawn(move || engine.run(&mut sink, &cancel_flag))
            .map_err(|e| GestureError::Session(format!("cannot spawn poll thread: {e}")))?;

        info!("{:?} session started", config.engine);
        Ok(SessionHandle {
            cancel,
            initial_levels,
            handle: Some(handle),
        })
    }
}

impl SessionHandle {
    pub fn initial_levels(&self) -> &[Level] {
        &self.initial_levels
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn request_stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn stop(mut self) -> Result<(), GestureError> {
        self.request_stop();
        self.join_inner()
    }

    /// Waits for the loop to end on its own, e.g. after a read failure.
    pub fn join(mut self) -> Result<(), GestureError> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<(), GestureError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(GestureError::Session("poll thread panicked".into()))),
            None => Ok(()),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.request_stop();
        if let Err(e) = self.join_inner() {
            warn!("session ended with error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use tokio::sync::mpsc;

    use super::*;
    use crate::backend::MockLevelSource;
    use crate::clock::MonotonicClock;
    use crate::event::{Direction, InputEvent, Level};

    fn config(engine: &str) -> AppConfig {
        serde_json::from_str(&format!(
            r#"{{
                "http": {{ "path": "/api/v1" }},
                "engine": "{engine}",
                "lines": [
                    {{ "name": "A", "gpio": 2 }},
                    {{ "name": "B", "gpio": 21 }}
                ]
            }}"#
        ))
        .unwrap()
    }

    fn wait_for(rx: &mut mpsc::UnboundedReceiver<InputEvent>, want: InputEvent) -> Vec<InputEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            match rx.try_recv() {
                Ok(ev) => {
                    seen.push(ev);
                    if ev == want {
                        return seen;
                    }
                }
                Err(_) => std::thread::sleep(Duration::from_millis(1)),
            }
        }
        panic!("timed out waiting for {want:?}, saw {seen:?}");
    }

    #[test]
    fn stop_closes_lines_and_reports_termination() {
        let mock = MockLevelSource::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = Session::start(&config("buttons"), mock.clone(), MonotonicClock, tx).unwrap();
        assert_eq!(mock.open_count(), 2);

        mock.set_level(0, Level::High);
        wait_for(&mut rx, InputEvent::LineDown { line: 0 });

        assert!(session.stop().is_ok());
        assert_eq!(mock.open_count(), 0);
        wait_for(&mut rx, InputEvent::ReadingTerminated);
    }

    #[test]
    fn initial_levels_come_from_the_opening_read() {
        let mock = MockLevelSource::new();
        mock.set_level(1, Level::High);
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = Session::start(&config("buttons"), mock.clone(), MonotonicClock, tx).unwrap();
        assert_eq!(session.initial_levels(), &[Level::Low, Level::High]);
    }

    #[test]
    fn read_failure_ends_the_session() {
        let mock = MockLevelSource::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = Session::start(&config("buttons"), mock.clone(), MonotonicClock, tx).unwrap();

        mock.fail_reads(1);
        wait_for(&mut rx, InputEvent::ReadingTerminated);
        assert!(matches!(session.join(), Err(GestureError::Read(_))));
        assert_eq!(mock.open_count(), 0);
    }

    #[test]
    fn open_failure_is_reported_before_polling() {
        let mock = MockLevelSource::new();
        mock.refuse_open(1);
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = Session::start(&config("buttons"), mock.clone(), MonotonicClock, tx);
        assert!(matches!(result, Err(GestureError::LineOpen(_))));
        assert_eq!(mock.open_count(), 0);
    }

    #[test]
    fn encoder_session_reports_rotation() {
        let mock = MockLevelSource::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _session = Session::start(&config("encoder"), mock.clone(), MonotonicClock, tx).unwrap();

        mock.set_level(0, Level::High);
        let seen = wait_for(
            &mut rx,
            InputEvent::Rotate {
                direction: Direction::Clockwise,
            },
        );
        assert_eq!(seen.len(), 1);
    }
}
