use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{error, info};

use crate::clock::Clock;
use crate::error::GestureError;
use crate::event::{EventSink, InputEvent, Level};
use crate::poller::{EdgePoller, LevelChange, LevelSource};

pub trait EdgeConsumer {
    fn begin(&mut self, _baseline: &[Level]) {}
    fn level_changed(&mut self, line: usize, level: Level, now: Instant, sink: &mut dyn EventSink);
    fn pass_complete(&mut self, now: Instant, sink: &mut dyn EventSink);
}

pub struct Engine<S: LevelSource, C: Clock> {
    poller: EdgePoller<S>,
    consumer: Box<dyn EdgeConsumer + Send>,
    clock: C,
    changes: Vec<LevelChange>,
}

impl<S: LevelSource, C: Clock> Engine<S, C> {
    pub fn new(poller: EdgePoller<S>, mut consumer: Box<dyn EdgeConsumer + Send>, clock: C) -> Self {
        consumer.begin(&poller.levels());
        Self {
            poller,
            consumer,
            clock,
            changes: Vec::new(),
        }
    }

    pub fn step(&mut self, sink: &mut dyn EventSink) -> Result<(), GestureError> {
        self.poller.poll(&mut self.changes)?;
        let now = self.clock.now();
        for change in self.changes.drain(..) {
            self.consumer
                .level_changed(change.line, change.level, now, sink);
        }
        self.consumer.pass_complete(now, sink);
        Ok(())
    }

    /// Loops until `cancel` is raised or a read fails. Every exit closes all
    /// lines and emits `ReadingTerminated`.
    pub fn run(mut self, sink: &mut dyn EventSink, cancel: &AtomicBool) -> Result<(), GestureError> {
        info!("polling {} line(s)", self.poller.line_count());
        let result = loop {
            if cancel.load(Ordering::Relaxed) {
                break Ok(());
            }
            if let Err(e) = self.step(sink) {
                error!("stopping poll loop: {e}");
                break Err(e);
            }
        };
        self.shutdown(sink);
        result
    }

    pub fn shutdown(&mut self, sink: &mut dyn EventSink) {
        self.poller.close_all();
        sink.emit(InputEvent::ReadingTerminated);
        info!("reading terminated");
    }
}
