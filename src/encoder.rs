use std::time::Instant;

use log::{debug, warn};

use crate::engine::EdgeConsumer;
use crate::error::GestureError;
use crate::event::{Direction, EventSink, InputEvent, Level};

pub const CHANNEL_A: usize = 0;
pub const CHANNEL_B: usize = 1;

/// Two-bit quadrature code, channel A in the high bit and B in the low bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderState(u8);

impl EncoderState {
    pub const A: EncoderState = EncoderState(0b00);
    pub const B: EncoderState = EncoderState(0b01);
    pub const C: EncoderState = EncoderState(0b11);
    pub const D: EncoderState = EncoderState(0b10);

    pub fn from_levels(a: Level, b: Level) -> Self {
        EncoderState((a.as_bit() << 1) | b.as_bit())
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

pub fn direction(previous: EncoderState, current: EncoderState) -> Direction {
    use EncoderState as S;
    match (previous, current) {
        (S::A, S::D) | (S::B, S::A) | (S::C, S::B) | (S::D, S::C) => Direction::Clockwise,
        (S::A, S::B) | (S::B, S::C) | (S::C, S::D) | (S::D, S::A) => Direction::CounterClockwise,
        _ => Direction::Invalid,
    }
}

/// Couples lines 0 and 1 as channels A and B. The state is evaluated once per
/// poll pass; after an invalid jump the next differing state is taken as the
/// new baseline without a decision.
#[derive(Debug)]
pub struct QuadratureDecoder {
    a: Level,
    b: Level,
    last: Option<EncoderState>,
    armed: bool,
}

impl Default for QuadratureDecoder {
    fn default() -> Self {
        Self {
            a: Level::Low,
            b: Level::Low,
            last: None,
            armed: false,
        }
    }
}

impl QuadratureDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn observe(&mut self, current: EncoderState) -> Option<Direction> {
        if self.last == Some(current) {
            return None;
        }
        let previous = self.last.replace(current);
        let Some(previous) = previous.filter(|_| self.armed) else {
            debug!("encoder baseline {:02b}", current.bits());
            self.armed = true;
            return None;
        };

        let direction = direction(previous, current);
        if direction == Direction::Invalid {
            let err = GestureError::Protocol(format!(
                "encoder jumped {:02b} -> {:02b}, resynchronizing",
                previous.bits(),
                current.bits()
            ));
            warn!("{err}");
            self.armed = false;
        }
        Some(direction)
    }
}

impl EdgeConsumer for QuadratureDecoder {
    fn begin(&mut self, baseline: &[Level]) {
        if let (Some(&a), Some(&b)) = (baseline.get(CHANNEL_A), baseline.get(CHANNEL_B)) {
            self.a = a;
            self.b = b;
            self.last = None;
            self.armed = false;
            self.observe(EncoderState::from_levels(a, b));
        }
    }

    fn level_changed(&mut self, line: usize, level: Level, _now: Instant, _sink: &mut dyn EventSink) {
        match line {
            CHANNEL_A => self.a = level,
            CHANNEL_B => self.b = level,
            _ => {}
        }
    }

    fn pass_complete(&mut self, _now: Instant, sink: &mut dyn EventSink) {
        let current = EncoderState::from_levels(self.a, self.b);
        if let Some(direction) = self.observe(current) {
            sink.emit(InputEvent::Rotate { direction });
        }
    }
}
