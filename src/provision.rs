use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::{EdgeDetect, LineConfig};
use crate::error::GestureError;

pub struct SysfsProvisioner {
    root: PathBuf,
}

impl SysfsProvisioner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pin_dir(&self, gpio: u32) -> PathBuf {
        self.root.join(format!("gpio{gpio}"))
    }

    fn write_attr(path: &Path, value: &str) -> Result<(), GestureError> {
        fs::write(path, value)
            .map_err(|e| GestureError::Provisioning(format!("write {value:?} to {}: {e}", path.display())))
    }

    pub fn export(&self, gpio: u32) -> Result<(), GestureError> {
        if self.pin_dir(gpio).exists() {
            debug!("gpio{gpio} already exported");
            return Ok(());
        }
        Self::write_attr(&self.root.join("export"), &gpio.to_string())
    }

    pub fn set_direction_input(&self, gpio: u32) -> Result<(), GestureError> {
        Self::write_attr(&self.pin_dir(gpio).join("direction"), "in")
    }

    pub fn set_edge(&self, gpio: u32, edge: EdgeDetect) -> Result<(), GestureError> {
        Self::write_attr(&self.pin_dir(gpio).join("edge"), edge.as_sysfs())
    }

    pub fn set_active_low(&self, gpio: u32, active_low: bool) -> Result<(), GestureError> {
        let value = if active_low { "1" } else { "0" };
        Self::write_attr(&self.pin_dir(gpio).join("active_low"), value)
    }

    pub fn provision(&self, line: &LineConfig) -> Result<(), GestureError> {
        self.export(line.gpio)?;
        self.set_direction_input(line.gpio)?;
        self.set_edge(line.gpio, line.edge)?;
        self.set_active_low(line.gpio, line.active_low)?;
        info!(
            "gpio{} provisioned (edge {}, active_low {})",
            line.gpio,
            line.edge.as_sysfs(),
            line.active_low
        );
        Ok(())
    }

    pub fn provision_all(&self, lines: &[LineConfig]) -> Result<(), GestureError> {
        lines.iter().try_for_each(|line| self.provision(line))
    }
}
