#[cfg(feature = "hardware-gpio")]
mod libgpiod;
mod mock;
mod sysfs;

#[cfg(feature = "hardware-gpio")]
pub use libgpiod::{GpiodLine, LibgpiodLevelSource};
pub use mock::{MockHandle, MockLevelSource};
pub use sysfs::{SysfsLevelSource, SysfsLine};
