//! Object enablers served by the device.
//!
//! - [`DeviceObject`]: identity resources, clock, reboot
//! - [`SecurityObject`]: server accounts, never exposed remotely
//! - [`ConnectivityStatistics`]: refuses every caller with 4.01

mod connectivity_stats;
mod device;
mod security;

pub use connectivity_stats::ConnectivityStatistics;
pub use device::{DeviceInfo, DeviceObject};
pub use security::{SecurityAccount, SecurityObject};
