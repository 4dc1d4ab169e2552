use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::time::Duration;

use log::debug;

use crate::config::{LineConfig, PollMode};
use crate::error::GestureError;
use crate::event::Level;
use crate::poller::LevelSource;

pub struct SysfsLevelSource {
    root: PathBuf,
    mode: PollMode,
    pfds: Vec<libc::pollfd>,
}

pub struct SysfsLine {
    gpio: u32,
    file: File,
}

impl SysfsLevelSource {
    pub fn new(root: impl Into<PathBuf>, mode: PollMode) -> Self {
        Self {
            root: root.into(),
            mode,
            pfds: Vec::new(),
        }
    }

    fn wake_mask(&self) -> libc::c_short {
        match self.mode {
            PollMode::Interrupt => libc::POLLPRI | libc::POLLERR,
            PollMode::Level => libc::POLLIN,
        }
    }
}

pub(crate) fn poll_timeout_ms(timeout: Duration) -> libc::c_int {
    timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int
}

pub(crate) fn poll_ready(
    pfds: &mut [libc::pollfd],
    mask: libc::c_short,
    timeout: Duration,
) -> Result<Vec<usize>, GestureError> {
    // SAFETY: `pfds` is a live, exclusively borrowed slice of `pollfd` and the
    // count passed is its length.
    let ret = unsafe {
        libc::poll(
            pfds.as_mut_ptr(),
            pfds.len() as libc::nfds_t,
            poll_timeout_ms(timeout),
        )
    };
    if ret < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(Vec::new());
        }
        return Err(GestureError::Read(format!("poll: {err}")));
    }
    if ret == 0 {
        return Ok(Vec::new());
    }

    Ok(pfds
        .iter()
        .enumerate()
        .filter(|(_, pfd)| pfd.revents & mask != 0)
        .map(|(pos, _)| pos)
        .collect())
}

impl LevelSource for SysfsLevelSource {
    type Handle = SysfsLine;

    fn open_line(&mut self, index: usize, line: &LineConfig) -> Result<SysfsLine, GestureError> {
        let path = self.root.join(format!("gpio{}", line.gpio)).join("value");
        let file = File::open(&path).map_err(|e| {
            GestureError::LineOpen(format!("line {index} ({}) {}: {e}", line.name, path.display()))
        })?;
        debug!("opened {}", path.display());
        Ok(SysfsLine {
            gpio: line.gpio,
            file,
        })
    }

    fn current_level(&mut self, handle: &mut SysfsLine) -> Result<Level, GestureError> {
        let mut buf = [0u8; 2];
        handle
            .file
            .seek(SeekFrom::Start(0))
            .map_err(|e| GestureError::Read(format!("seek gpio{}: {e}", handle.gpio)))?;
        let n = handle
            .file
            .read(&mut buf)
            .map_err(|e| GestureError::Read(format!("read gpio{}: {e}", handle.gpio)))?;
        Level::from_sysfs(&buf[..n])
    }

    fn wait_any(
        &mut self,
        handles: &[SysfsLine],
        timeout: Duration,
    ) -> Result<Vec<usize>, GestureError> {
        let mask = self.wake_mask();
        self.pfds.clear();
        self.pfds.extend(handles.iter().map(|h| libc::pollfd {
            fd: h.file.as_raw_fd(),
            events: mask,
            revents: 0,
        }));
        poll_ready(&mut self.pfds, mask, timeout)
    }

    fn close(&mut self, handle: SysfsLine) {
        debug!("closing gpio{}", handle.gpio);
        drop(handle.file);
    }
}
