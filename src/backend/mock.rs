use std::sync::Arc;
use std::time::Duration;

use log::debug;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use crate::config::LineConfig;
use crate::error::GestureError;
use crate::event::Level;
use crate::poller::LevelSource;

/// In-memory level source. Clones share state, so one clone can be handed to
/// a session while another drives the lines.
#[derive(Clone, Default)]
pub struct MockLevelSource {
    shared: Arc<MockShared>,
}

#[derive(Default)]
struct MockShared {
    lines: Mutex<FxHashMap<usize, MockLineState>>, // keyed by line index
    wake: Condvar,
}

#[derive(Clone)]
struct MockLineState {
    level: Level,
    pending_wake: bool,
    open: bool,
    refuse_open: bool,
    fail_reads: bool,
}

impl Default for MockLineState {
    fn default() -> Self {
        Self {
            level: Level::Low,
            pending_wake: false,
            open: false,
            refuse_open: false,
            fail_reads: false,
        }
    }
}

#[derive(Debug)]
pub struct MockHandle {
    index: usize,
}

impl MockLevelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_level(&self, index: usize, level: Level) {
        let mut lines = self.shared.lines.lock();
        let line = lines.entry(index).or_default();
        line.level = level;
        line.pending_wake = true;
        self.shared.wake.notify_all();
    }

    pub fn spurious_wake(&self, index: usize) {
        let mut lines = self.shared.lines.lock();
        lines.entry(index).or_default().pending_wake = true;
        self.shared.wake.notify_all();
    }

    pub fn refuse_open(&self, index: usize) {
        self.shared.lines.lock().entry(index).or_default().refuse_open = true;
    }

    /// Every subsequent read of the line fails, as if its value file vanished.
    pub fn fail_reads(&self, index: usize) {
        let mut lines = self.shared.lines.lock();
        let line = lines.entry(index).or_default();
        line.fail_reads = true;
        line.pending_wake = true;
        self.shared.wake.notify_all();
    }

    pub fn is_open(&self, index: usize) -> bool {
        self.shared
            .lines
            .lock()
            .get(&index)
            .map(|l| l.open)
            .unwrap_or(false)
    }

    pub fn open_count(&self) -> usize {
        self.shared.lines.lock().values().filter(|l| l.open).count()
    }

    fn take_ready(lines: &mut FxHashMap<usize, MockLineState>, handles: &[MockHandle]) -> Vec<usize> {
        handles
            .iter()
            .enumerate()
            .filter_map(|(pos, h)| {
                let line = lines.get_mut(&h.index)?;
                if line.open && line.pending_wake {
                    line.pending_wake = false;
                    Some(pos)
                } else {
                    None
                }
            })
            .collect()
    }
}

impl LevelSource for MockLevelSource {
    type Handle = MockHandle;

    fn open_line(&mut self, index: usize, line: &LineConfig) -> Result<MockHandle, GestureError> {
        let mut lines = self.shared.lines.lock();
        let state = lines.entry(index).or_default();
        if state.refuse_open {
            return Err(GestureError::LineOpen(format!(
                "mock line {index} ({}) refused to open",
                line.name
            )));
        }
        state.open = true;
        state.pending_wake = false;
        debug!("mock line {index} opened");
        Ok(MockHandle { index })
    }

    fn current_level(&mut self, handle: &mut MockHandle) -> Result<Level, GestureError> {
        let lines = self.shared.lines.lock();
        let state = lines
            .get(&handle.index)
            .ok_or_else(|| GestureError::Read(format!("mock line {} missing", handle.index)))?;
        if state.fail_reads || !state.open {
            return Err(GestureError::Read(format!(
                "mock line {} read failed",
                handle.index
            )));
        }
        Ok(state.level)
    }

    fn wait_any(
        &mut self,
        handles: &[MockHandle],
        timeout: Duration,
    ) -> Result<Vec<usize>, GestureError> {
        let mut lines = self.shared.lines.lock();
        let ready = Self::take_ready(&mut lines, handles);
        if !ready.is_empty() || timeout.is_zero() {
            return Ok(ready);
        }
        let _ = self.shared.wake.wait_for(&mut lines, timeout);
        Ok(Self::take_ready(&mut lines, handles))
    }

    fn close(&mut self, handle: MockHandle) {
        if let Some(state) = self.shared.lines.lock().get_mut(&handle.index) {
            state.open = false;
        }
        debug!("mock line {} closed", handle.index);
    }
}
