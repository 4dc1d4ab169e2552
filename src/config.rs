use std::{collections::HashSet, fs, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::GestureError;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub unix_socket: Option<String>,
    pub host: Option<String>,
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeDetect {
    None,
    Rising,
    Falling,
    Both,
}

impl Default for EdgeDetect {
    fn default() -> Self {
        EdgeDetect::Both
    }
}

impl EdgeDetect {
    pub fn as_sysfs(&self) -> &'static str {
        match self {
            EdgeDetect::None => "none",
            EdgeDetect::Rising => "rising",
            EdgeDetect::Falling => "falling",
            EdgeDetect::Both => "both",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    #[default]
    Buttons,
    Encoder,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    Sysfs,
    Libgpiod,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PollMode {
    /// Wake on edge interrupts (`POLLPRI`); requires an `edge` other than `none`.
    #[default]
    Interrupt,
    Level,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LineConfig {
    pub name: String,
    pub gpio: u32,
    #[serde(default = "default_chip")]
    pub chip: String,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub edge: EdgeDetect,
    #[serde(default)]
    pub active_low: bool,
}

impl LineConfig {
    pub fn chip_offset(&self) -> u32 {
        self.offset.unwrap_or(self.gpio)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct TimingConfig {
    #[serde(default = "default_short_press_ms")]
    pub short_press_ms: u64,
    #[serde(default = "default_long_press_ms")]
    pub long_press_ms: u64,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            short_press_ms: default_short_press_ms(),
            long_press_ms: default_long_press_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl TimingConfig {
    pub fn short_press(&self) -> Duration {
        Duration::from_millis(self.short_press_ms)
    }

    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub http: HttpConfig,
    #[serde(default)]
    pub engine: EngineKind,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
    #[serde(default)]
    pub provision: bool,
    #[serde(default)]
    pub poll_mode: PollMode,
    #[serde(default)]
    pub timing: TimingConfig,
    pub lines: Vec<LineConfig>,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, GestureError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| GestureError::Config(format!("Failed to read config: {e}")))?;
        let config: AppConfig = serde_json::from_str(&contents)
            .map_err(|e| GestureError::Config(format!("Invalid config json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GestureError> {
        if self.lines.is_empty() {
            return Err(GestureError::Config("at least one line is required".into()));
        }
        if self.engine == EngineKind::Encoder && self.lines.len() != 2 {
            return Err(GestureError::Config(format!(
                "encoder engine needs exactly 2 lines, got {}",
                self.lines.len()
            )));
        }
        if self.timing.short_press_ms == 0 || self.timing.long_press_ms == 0 {
            return Err(GestureError::Config(
                "press thresholds must be greater than zero".into(),
            ));
        }
        if self.broadcast_capacity == 0 {
            return Err(GestureError::Config(
                "broadcast_capacity must be greater than zero".into(),
            ));
        }

        let mut seen = HashSet::new();
        for line in &self.lines {
            if !seen.insert(line.gpio) {
                return Err(GestureError::Config(format!(
                    "gpio {} is configured more than once",
                    line.gpio
                )));
            }
            if line.edge == EdgeDetect::None && self.poll_mode == PollMode::Interrupt {
                return Err(GestureError::Config(format!(
                    "line '{}' has no edge detection but poll_mode is interrupt",
                    line.name
                )));
            }
        }
        Ok(())
    }
}

fn default_chip() -> String {
    "/dev/gpiochip0".to_string()
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

fn default_short_press_ms() -> u64 {
    500
}

fn default_long_press_ms() -> u64 {
    1500
}

fn default_poll_timeout_ms() -> u64 {
    1
}

fn default_broadcast_capacity() -> usize {
    64
}
