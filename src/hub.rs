use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::config::{AppConfig, EngineKind, LineConfig};
use crate::error::GestureError;
use crate::event::{InputEvent, Level};

#[derive(Debug, Clone, Serialize)]
pub struct DispatchedEvent {
    #[serde(flatten)]
    pub event: InputEvent,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineDescriptor {
    pub line: usize,
    pub info: LineConfig,
    pub held: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub engine: EngineKind,
    pub running: bool,
}

pub struct EventHub {
    engine: EngineKind,
    lines: Vec<LineConfig>,
    // None until the line is seeded or sees a raw edge
    held: RwLock<Vec<Option<bool>>>,
    running: AtomicBool,
    event_tx: broadcast::Sender<DispatchedEvent>,
}

impl EventHub {
    pub fn new(config: &AppConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.broadcast_capacity);
        Self {
            engine: config.engine,
            lines: config.lines.clone(),
            held: RwLock::new(vec![None; config.lines.len()]),
            running: AtomicBool::new(true),
            event_tx,
        }
    }

    pub fn dispatch(&self, event: InputEvent) {
        match event {
            InputEvent::LineDown { line } | InputEvent::LineUp { line } => {
                if let Some(slot) = self.held.write().get_mut(line) {
                    *slot = Some(matches!(event, InputEvent::LineDown { .. }));
                }
            }
            InputEvent::ReadingTerminated => {
                self.running.store(false, Ordering::Relaxed);
                for slot in self.held.write().iter_mut() {
                    *slot = Some(false);
                }
            }
            _ => {}
        }

        let dispatched = DispatchedEvent {
            event,
            timestamp_ms: epoch_millis(),
        };
        if self.event_tx.send(dispatched).is_err() {
            debug!("no subscribers for {event:?}");
        }
    }

    /// Takes the levels read when the lines were opened. A line that has
    /// already reported a raw edge keeps the newer state.
    pub fn seed_levels(&self, levels: &[Level]) {
        let mut held = self.held.write();
        for (slot, level) in held.iter_mut().zip(levels) {
            if slot.is_none() {
                *slot = Some(*level == Level::High);
            }
        }
    }

    pub async fn pump(&self, mut rx: mpsc::UnboundedReceiver<InputEvent>) {
        while let Some(event) = rx.recv().await {
            self.dispatch(event);
        }
        info!("event channel closed");
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DispatchedEvent> {
        self.event_tx.subscribe()
    }

    fn line_config(&self, line: usize) -> Result<&LineConfig, GestureError> {
        self.lines
            .get(line)
            .ok_or_else(|| GestureError::NotFoundLine(line.to_string()))
    }

    pub fn is_held(&self, line: usize) -> Result<bool, GestureError> {
        self.line_config(line)?;
        Ok(self.held.read().get(line).copied().flatten().unwrap_or(false))
    }

    pub fn line_descriptor(&self, line: usize) -> Result<LineDescriptor, GestureError> {
        let info = self.line_config(line)?.clone();
        Ok(LineDescriptor {
            line,
            info,
            held: self.is_held(line)?,
        })
    }

    pub fn list_lines(&self) -> Vec<LineDescriptor> {
        let held = self.held.read();
        self.lines
            .iter()
            .enumerate()
            .map(|(line, info)| LineDescriptor {
                line,
                info: info.clone(),
                held: held.get(line).copied().flatten().unwrap_or(false),
            })
            .collect()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            engine: self.engine,
            running: self.running.load(Ordering::Relaxed),
        }
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub() -> EventHub {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "http": { "path": "/api/v1" },
                "lines": [ { "name": "A", "gpio": 2 }, { "name": "B", "gpio": 21 } ]
            }"#,
        )
        .unwrap();
        EventHub::new(&config)
    }

    #[test]
    fn tracks_held_lines_from_raw_edges() {
        let hub = hub();
        hub.dispatch(InputEvent::LineDown { line: 1 });
        assert!(hub.is_held(1).unwrap());
        assert!(!hub.is_held(0).unwrap());

        hub.dispatch(InputEvent::ShortPress { line: 1 });
        assert!(hub.is_held(1).unwrap());

        hub.dispatch(InputEvent::LineUp { line: 1 });
        assert!(!hub.is_held(1).unwrap());
        assert!(matches!(hub.is_held(5), Err(GestureError::NotFoundLine(_))));
    }

    #[test]
    fn termination_clears_state_and_stops_running() {
        let hub = hub();
        hub.dispatch(InputEvent::LineDown { line: 0 });
        hub.dispatch(InputEvent::ReadingTerminated);
        assert!(!hub.status().running);
        assert!(!hub.is_held(0).unwrap());
    }

    #[test]
    fn seeded_levels_never_override_raw_edges() {
        let hub = hub();
        hub.dispatch(InputEvent::LineUp { line: 1 });
        hub.seed_levels(&[Level::High, Level::High]);
        assert!(hub.is_held(0).unwrap());
        assert!(!hub.is_held(1).unwrap());

        hub.dispatch(InputEvent::LineUp { line: 0 });
        assert!(!hub.is_held(0).unwrap());
    }

    #[tokio::test]
    async fn pump_preserves_emission_order() {
        let hub = hub();
        let mut sub = hub.subscribe_events();
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = vec![
            InputEvent::LineDown { line: 0 },
            InputEvent::LineUp { line: 0 },
            InputEvent::LineDown { line: 0 },
            InputEvent::DoubleTap { line: 0 },
            InputEvent::ReadingTerminated,
        ];
        for ev in &sent {
            tx.send(*ev).unwrap();
        }
        drop(tx);
        hub.pump(rx).await;

        let mut received = Vec::new();
        while let Ok(ev) = sub.try_recv() {
            received.push(ev.event);
        }
        assert_eq!(received, sent);
    }
}
