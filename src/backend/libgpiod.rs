use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::time::Duration;

use libgpiod::{chip::Chip, line, request};
use log::{debug, warn};

use crate::backend::sysfs::poll_ready;
use crate::config::{EdgeDetect, LineConfig};
use crate::error::GestureError;
use crate::event::Level;
use crate::poller::LevelSource;

const LIBGPIOD_EVENT_BUFFER_CAPACITY: usize = 64;

pub struct LibgpiodLevelSource {
    buffer: request::Buffer,
    pfds: Vec<libc::pollfd>,
}

pub struct GpiodLine {
    offset: u32,
    request: request::Request,
}

impl LibgpiodLevelSource {
    pub fn new() -> Result<Self, GestureError> {
        let buffer = request::Buffer::new(LIBGPIOD_EVENT_BUFFER_CAPACITY)
            .map_err(|e| GestureError::Provisioning(format!("event buffer: {e}")))?;
        Ok(Self {
            buffer,
            pfds: Vec::new(),
        })
    }

    fn make_line_settings(cfg: &LineConfig) -> Result<line::Settings, GestureError> {
        let mut ls = line::Settings::new()
            .map_err(|e| GestureError::Provisioning(format!("libgpiod settings: {e}")))?;
        ls.set_direction(line::Direction::Input)
            .map_err(|e| GestureError::Provisioning(format!("set direction: {e}")))?;
        ls.set_active_low(cfg.active_low);

        let edge = match cfg.edge {
            EdgeDetect::None => None,
            EdgeDetect::Rising => Some(line::Edge::Rising),
            EdgeDetect::Falling => Some(line::Edge::Falling),
            EdgeDetect::Both => Some(line::Edge::Both),
        };
        ls.set_edge_detection(edge)
            .map_err(|e| GestureError::Provisioning(format!("set edge detection: {e}")))?;
        Ok(ls)
    }

    fn request_line(cfg: &LineConfig) -> Result<request::Request, GestureError> {
        let chip = Chip::open(&PathBuf::from(&cfg.chip))
            .map_err(|e| GestureError::LineOpen(format!("open chip {}: {e}", cfg.chip)))?;

        let mut line_cfg = line::Config::new()
            .map_err(|e| GestureError::Provisioning(format!("line config: {e}")))?;
        line_cfg
            .add_line_settings(&[cfg.chip_offset()], Self::make_line_settings(cfg)?)
            .map_err(|e| GestureError::Provisioning(format!("line config add settings: {e}")))?;

        let mut req_cfg = request::Config::new()
            .map_err(|e| GestureError::Provisioning(format!("request config: {e}")))?;
        req_cfg
            .set_consumer(env!("CARGO_PKG_NAME"))
            .map_err(|e| GestureError::Provisioning(format!("request consumer: {e}")))?;

        chip.request_lines(Some(&req_cfg), &line_cfg)
            .map_err(|e| GestureError::LineOpen(format!("request line {}: {e}", cfg.name)))
    }

    fn drain_edge_events(&mut self, handle: &GpiodLine) -> Result<(), GestureError> {
        let events = handle
            .request
            .read_edge_events(&mut self.buffer)
            .map_err(|e| GestureError::Read(format!("read edge events {}: {e}", handle.offset)))?;
        let mut drained = 0usize;
        for event in events {
            match event {
                Ok(_) => drained += 1,
                Err(e) => warn!("offset {}: bad edge event: {e}", handle.offset),
            }
        }
        debug!("offset {}: drained {drained} edge event(s)", handle.offset);
        Ok(())
    }
}

impl LevelSource for LibgpiodLevelSource {
    type Handle = GpiodLine;

    fn open_line(&mut self, index: usize, line: &LineConfig) -> Result<GpiodLine, GestureError> {
        let request = Self::request_line(line)?;
        debug!(
            "line {index} ({}) requested on {}:{}",
            line.name,
            line.chip,
            line.chip_offset()
        );
        Ok(GpiodLine {
            offset: line.chip_offset(),
            request,
        })
    }

    fn current_level(&mut self, handle: &mut GpiodLine) -> Result<Level, GestureError> {
        let value = handle
            .request
            .value(handle.offset)
            .map_err(|e| GestureError::Read(format!("get value {}: {e}", handle.offset)))?;
        Ok(match value {
            line::Value::InActive => Level::Low,
            line::Value::Active => Level::High,
        })
    }

    fn wait_any(
        &mut self,
        handles: &[GpiodLine],
        timeout: Duration,
    ) -> Result<Vec<usize>, GestureError> {
        let mask = libc::POLLIN | libc::POLLPRI | libc::POLLERR;
        self.pfds.clear();
        self.pfds.extend(handles.iter().map(|h| libc::pollfd {
            fd: h.request.as_raw_fd(),
            events: mask,
            revents: 0,
        }));

        let ready = poll_ready(&mut self.pfds, mask, timeout)?;
        for &pos in &ready {
            self.drain_edge_events(&handles[pos])?;
        }
        Ok(ready)
    }

    fn close(&mut self, handle: GpiodLine) {
        debug!("releasing offset {}", handle.offset);
        drop(handle.request);
    }
}
