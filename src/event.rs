use log::debug;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::GestureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn from_sysfs(raw: &[u8]) -> Result<Self, GestureError> {
        match raw.first() {
            Some(b'0') => Ok(Level::Low),
            Some(b'1') => Ok(Level::High),
            Some(other) => Err(GestureError::Read(format!(
                "unexpected level byte 0x{other:02x}"
            ))),
            None => Err(GestureError::Read("empty level read".into())),
        }
    }

    pub fn as_bit(&self) -> u8 {
        match self {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Clockwise,
    CounterClockwise,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum InputEvent {
    LineDown { line: usize },
    LineUp { line: usize },
    ShortPress { line: usize },
    LongPress { line: usize },
    DoubleTap { line: usize },
    Rotate { direction: Direction },
    ReadingTerminated,
}

impl InputEvent {
    pub fn line(&self) -> Option<usize> {
        match self {
            InputEvent::LineDown { line }
            | InputEvent::LineUp { line }
            | InputEvent::ShortPress { line }
            | InputEvent::LongPress { line }
            | InputEvent::DoubleTap { line } => Some(*line),
            InputEvent::Rotate { .. } | InputEvent::ReadingTerminated => None,
        }
    }
}

pub trait EventSink {
    fn emit(&mut self, event: InputEvent);
}

impl EventSink for Vec<InputEvent> {
    fn emit(&mut self, event: InputEvent) {
        self.push(event);
    }
}

impl EventSink for mpsc::UnboundedSender<InputEvent> {
    fn emit(&mut self, event: InputEvent) {
        if self.send(event).is_err() {
            debug!("event receiver gone, dropping {event:?}");
        }
    }
}
