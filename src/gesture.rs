use std::time::{Duration, Instant};

use log::debug;

use crate::engine::EdgeConsumer;
use crate::event::{EventSink, InputEvent, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub short_press: Duration,
    pub long_press: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            short_press: Duration::from_millis(500),
            long_press: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    AfterDown,
    AfterUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    AwaitingResolution { since: Instant, branch: Branch },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    ShortPress,
    LongPress,
    DoubleTap,
}

impl Gesture {
    fn event(self, line: usize) -> InputEvent {
        match self {
            Gesture::ShortPress => InputEvent::ShortPress { line },
            Gesture::LongPress => InputEvent::LongPress { line },
            Gesture::DoubleTap => InputEvent::DoubleTap { line },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LineClassifier {
    state: GestureState,
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self {
            state: GestureState::Idle,
        }
    }
}

impl LineClassifier {
    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn on_edge(&mut self, level: Level, now: Instant, th: &Thresholds) -> Option<Gesture> {
        match (self.state, level) {
            (GestureState::Idle, Level::High) => {
                self.await_from(now, Branch::AfterDown);
                None
            }
            (GestureState::Idle, Level::Low) => None,
            (GestureState::AwaitingResolution { since, branch: Branch::AfterDown }, Level::Low) => {
                if now.saturating_duration_since(since) >= th.long_press {
                    self.state = GestureState::Idle;
                    Some(Gesture::LongPress)
                } else {
                    self.await_from(now, Branch::AfterUp);
                    None
                }
            }
            (GestureState::AwaitingResolution { since, branch: Branch::AfterUp }, Level::High) => {
                if now.saturating_duration_since(since) < th.short_press {
                    self.state = GestureState::Idle;
                    Some(Gesture::DoubleTap)
                } else {
                    // the tap window closed before this pass noticed; this
                    // press starts a new cycle
                    self.await_from(now, Branch::AfterDown);
                    Some(Gesture::ShortPress)
                }
            }
            // repeated level within a branch carries no new information
            (GestureState::AwaitingResolution { .. }, _) => None,
        }
    }

    pub fn on_tick(&mut self, now: Instant, th: &Thresholds) -> Option<Gesture> {
        let GestureState::AwaitingResolution { since, branch } = self.state else {
            return None;
        };
        let elapsed = now.saturating_duration_since(since);
        // reaching a threshold exactly takes the timeout branch
        let gesture = match branch {
            Branch::AfterDown if elapsed >= th.long_press => Gesture::LongPress,
            Branch::AfterUp if elapsed >= th.short_press => Gesture::ShortPress,
            _ => return None,
        };
        self.state = GestureState::Idle;
        Some(gesture)
    }

    fn await_from(&mut self, now: Instant, branch: Branch) {
        self.state = GestureState::AwaitingResolution { since: now, branch };
    }
}

pub struct GestureClassifier {
    thresholds: Thresholds,
    lines: Vec<LineClassifier>,
}

impl GestureClassifier {
    pub fn new(line_count: usize, thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            lines: vec![LineClassifier::default(); line_count],
        }
    }

    pub fn state(&self, line: usize) -> Option<GestureState> {
        self.lines.get(line).map(|l| l.state())
    }
}

impl EdgeConsumer for GestureClassifier {
    fn level_changed(&mut self, line: usize, level: Level, now: Instant, sink: &mut dyn EventSink) {
        let Some(classifier) = self.lines.get_mut(line) else {
            return;
        };
        sink.emit(match level {
            Level::High => InputEvent::LineDown { line },
            Level::Low => InputEvent::LineUp { line },
        });
        if let Some(gesture) = classifier.on_edge(level, now, &self.thresholds) {
            debug!("line {line}: {gesture:?}");
            sink.emit(gesture.event(line));
        }
    }

    fn pass_complete(&mut self, now: Instant, sink: &mut dyn EventSink) {
        for (line, classifier) in self.lines.iter_mut().enumerate() {
            if let Some(gesture) = classifier.on_tick(now, &self.thresholds) {
                debug!("line {line}: {gesture:?}");
                sink.emit(gesture.event(line));
            }
        }
    }
}
