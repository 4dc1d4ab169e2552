use std::time::Duration;

use log::{debug, info};

use crate::config::LineConfig;
use crate::error::GestureError;
use crate::event::Level;

pub trait LevelSource: Send {
    type Handle: Send;

    fn open_line(&mut self, index: usize, line: &LineConfig) -> Result<Self::Handle, GestureError>;
    fn current_level(&mut self, handle: &mut Self::Handle) -> Result<Level, GestureError>;
    /// Positions in `handles` that signalled readiness. An expired timeout is
    /// an empty result, not an error.
    fn wait_any(
        &mut self,
        handles: &[Self::Handle],
        timeout: Duration,
    ) -> Result<Vec<usize>, GestureError>;
    fn close(&mut self, handle: Self::Handle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub line: usize,
    pub level: Level,
}

struct Line {
    name: String,
    previous: Level,
}

pub struct EdgePoller<S: LevelSource> {
    source: S,
    lines: Vec<Line>,
    handles: Vec<S::Handle>,
    poll_timeout: Duration,
}

impl<S: LevelSource> EdgePoller<S> {
    /// Opens every line and captures its baseline level. On failure, lines
    /// opened so far are closed before the error is returned.
    pub fn open(
        mut source: S,
        configs: &[LineConfig],
        poll_timeout: Duration,
    ) -> Result<Self, GestureError> {
        let mut lines = Vec::with_capacity(configs.len());
        let mut handles = Vec::with_capacity(configs.len());

        for (index, cfg) in configs.iter().enumerate() {
            let opened = source.open_line(index, cfg).and_then(|mut handle| {
                match source.current_level(&mut handle) {
                    Ok(level) => Ok((handle, level)),
                    Err(e) => {
                        source.close(handle);
                        Err(GestureError::LineOpen(format!(
                            "initial read of line {index} ({}): {e}",
                            cfg.name
                        )))
                    }
                }
            });

            match opened {
                Ok((handle, level)) => {
                    debug!("line {index} ({}) opened at {level:?}", cfg.name);
                    handles.push(handle);
                    lines.push(Line {
                        name: cfg.name.clone(),
                        previous: level,
                    });
                }
                Err(e) => {
                    for handle in handles.drain(..) {
                        source.close(handle);
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            source,
            lines,
            handles,
            poll_timeout,
        })
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn levels(&self) -> Vec<Level> {
        self.lines.iter().map(|l| l.previous).collect()
    }

    pub fn is_open(&self) -> bool {
        !self.handles.is_empty()
    }

    pub fn poll(&mut self, changes: &mut Vec<LevelChange>) -> Result<(), GestureError> {
        if self.handles.is_empty() {
            return Err(GestureError::Read("poller is closed".into()));
        }

        let mut ready = self.source.wait_any(&self.handles, self.poll_timeout)?;
        ready.sort_unstable();
        ready.dedup();

        for index in ready {
            let Some(handle) = self.handles.get_mut(index) else {
                continue;
            };
            let line = &mut self.lines[index];
            let level = self
                .source
                .current_level(handle)
                .map_err(|e| GestureError::Read(format!("line {index} ({}): {e}", line.name)))?;

            if level != line.previous {
                line.previous = level;
                changes.push(LevelChange { line: index, level });
            }
        }
        Ok(())
    }

    pub fn close_all(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        for handle in self.handles.drain(..) {
            self.source.close(handle);
        }
        info!("closed {} line(s)", self.lines.len());
    }
}

impl<S: LevelSource> Drop for EdgePoller<S> {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockLevelSource;

    fn lines(n: usize) -> Vec<LineConfig> {
        (0..n)
            .map(|i| LineConfig {
                name: format!("BUTTON {i}"),
                gpio: i as u32 + 2,
                chip: "/dev/gpiochip0".into(),
                offset: None,
                edge: Default::default(),
                active_low: false,
            })
            .collect()
    }

    #[test]
    fn reports_only_real_transitions() {
        let mock = MockLevelSource::new();
        let mut poller = EdgePoller::open(mock.clone(), &lines(2), Duration::ZERO).unwrap();
        let mut changes = Vec::new();

        mock.set_level(1, Level::High);
        mock.spurious_wake(0);
        poller.poll(&mut changes).unwrap();
        assert_eq!(
            changes,
            vec![LevelChange {
                line: 1,
                level: Level::High
            }]
        );

        changes.clear();
        mock.spurious_wake(1);
        poller.poll(&mut changes).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn processes_ready_lines_in_index_order() {
        let mock = MockLevelSource::new();
        let mut poller = EdgePoller::open(mock.clone(), &lines(3), Duration::ZERO).unwrap();
        let mut changes = Vec::new();

        mock.set_level(2, Level::High);
        mock.set_level(0, Level::High);
        poller.poll(&mut changes).unwrap();
        let order: Vec<usize> = changes.iter().map(|c| c.line).collect();
        assert_eq!(order, vec![0, 2]);
    }

    #[test]
    fn idle_timeouts_produce_nothing() {
        let mock = MockLevelSource::new();
        let mut poller =
            EdgePoller::open(mock.clone(), &lines(2), Duration::from_millis(1)).unwrap();
        let mut changes = Vec::new();
        for _ in 0..10 {
            poller.poll(&mut changes).unwrap();
        }
        assert!(changes.is_empty());
    }

    #[test]
    fn open_failure_closes_earlier_lines() {
        let mock = MockLevelSource::new();
        mock.refuse_open(1);
        let result = EdgePoller::open(mock.clone(), &lines(3), Duration::ZERO);
        assert!(matches!(result, Err(GestureError::LineOpen(_))));
        assert_eq!(mock.open_count(), 0);
    }

    #[test]
    fn read_failure_is_a_read_error_and_close_releases_everything() {
        let mock = MockLevelSource::new();
        let mut poller = EdgePoller::open(mock.clone(), &lines(2), Duration::ZERO).unwrap();
        assert_eq!(mock.open_count(), 2);

        mock.fail_reads(0);
        let mut changes = Vec::new();
        assert!(matches!(
            poller.poll(&mut changes),
            Err(GestureError::Read(_))
        ));

        poller.close_all();
        assert!(!poller.is_open());
        assert_eq!(mock.open_count(), 0);
    }

    #[test]
    fn baseline_comes_from_initial_read() {
        let mock = MockLevelSource::new();
        mock.set_level(1, Level::High);
        let poller = EdgePoller::open(mock.clone(), &lines(2), Duration::ZERO).unwrap();
        assert_eq!(poller.levels(), vec![Level::Low, Level::High]);
    }
}
