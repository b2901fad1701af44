//! Device (object 3).

use std::time::{SystemTime, UNIX_EPOCH};

use lwm2m_client::{ObjectEnabler, OperationContext};
use lwm2m_proto::{InstanceId, ResourceId, ResponseCode, Value};
use parking_lot::Mutex;
use tracing::{info, warn};

/// Resource ids within the Device instance.
mod resource {
    pub const MANUFACTURER: u16 = 0;
    pub const MODEL_NUMBER: u16 = 1;
    pub const SERIAL_NUMBER: u16 = 2;
    pub const FIRMWARE_VERSION: u16 = 3;
    pub const REBOOT: u16 = 4;
    pub const FACTORY_RESET: u16 = 5;
    pub const ERROR_CODE: u16 = 11;
    pub const RESET_ERROR_CODE: u16 = 12;
    pub const CURRENT_TIME: u16 = 13;
    pub const UTC_OFFSET: u16 = 14;
    pub const TIMEZONE: u16 = 15;
    pub const SUPPORTED_BINDINGS: u16 = 16;
}

/// Error Code value meaning "no error".
const NO_ERROR: i64 = 0;

/// Static identity reported by the Device object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model number.
    pub model_number: String,
    /// Serial number.
    pub serial_number: String,
    /// Firmware version.
    pub firmware_version: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            manufacturer: "lwm2m-rs".to_owned(),
            model_number: "lwm2m-device".to_owned(),
            serial_number: "0000-0001".to_owned(),
            firmware_version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    clock_offset_secs: i64,
    utc_offset: String,
    timezone: String,
    error_code: i64,
    reboots: u64,
}

/// Device object with one instance (0).
///
/// Identity resources are read-only. Current Time, UTC Offset and Timezone
/// are writable; writing the time shifts an offset from the system clock.
/// Reboot is recorded and logged; the process keeps running.
#[derive(Debug, Default)]
pub struct DeviceObject {
    info: DeviceInfo,
    state: Mutex<DeviceState>,
}

impl DeviceObject {
    /// Device object reporting `info`.
    pub fn new(info: DeviceInfo) -> Self {
        Self { info, state: Mutex::default() }
    }

    /// Identity reported to servers.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Reboots requested by servers so far.
    pub fn reboots(&self) -> u64 {
        self.state.lock().reboots
    }

    fn now(&self) -> i64 {
        system_time().saturating_add(self.state.lock().clock_offset_secs)
    }

    fn read(&self, resource: ResourceId) -> Option<Value> {
        let value = match resource {
            resource::MANUFACTURER => Value::from(self.info.manufacturer.as_str()),
            resource::MODEL_NUMBER => Value::from(self.info.model_number.as_str()),
            resource::SERIAL_NUMBER => Value::from(self.info.serial_number.as_str()),
            resource::FIRMWARE_VERSION => Value::from(self.info.firmware_version.as_str()),
            resource::ERROR_CODE => {
                Value::Multiple(vec![(0, Value::Integer(self.state.lock().error_code))])
            },
            resource::CURRENT_TIME => Value::Time(self.now()),
            resource::UTC_OFFSET => Value::String(self.state.lock().utc_offset.clone()),
            resource::TIMEZONE => Value::String(self.state.lock().timezone.clone()),
            resource::SUPPORTED_BINDINGS => Value::from("U"),
            _ => return None,
        };
        Some(value)
    }
}

impl ObjectEnabler for DeviceObject {
    fn on_read(
        &self,
        instance: InstanceId,
        resource: ResourceId,
        _ctx: &OperationContext<'_>,
    ) -> (Value, ResponseCode) {
        if instance != 0 {
            return (Value::Empty, ResponseCode::NotFound);
        }
        match self.read(resource) {
            Some(value) => (value, ResponseCode::Content),
            None => (Value::Empty, ResponseCode::NotFound),
        }
    }

    fn on_write(
        &self,
        instance: InstanceId,
        resource: ResourceId,
        ctx: &OperationContext<'_>,
    ) -> ResponseCode {
        if instance != 0 {
            return ResponseCode::NotFound;
        }

        let mut state = self.state.lock();
        match (resource, ctx.value) {
            (resource::CURRENT_TIME, Some(Value::Time(t) | Value::Integer(t))) => {
                state.clock_offset_secs = t.saturating_sub(system_time());
                ResponseCode::Changed
            },
            (resource::UTC_OFFSET, Some(Value::String(s))) => {
                state.utc_offset.clone_from(s);
                ResponseCode::Changed
            },
            (resource::TIMEZONE, Some(Value::String(s))) => {
                state.timezone.clone_from(s);
                ResponseCode::Changed
            },
            _ => ResponseCode::BadRequest,
        }
    }

    fn on_execute(
        &self,
        instance: InstanceId,
        resource: ResourceId,
        _ctx: &OperationContext<'_>,
    ) -> ResponseCode {
        if instance != 0 {
            return ResponseCode::NotFound;
        }

        let mut state = self.state.lock();
        match resource {
            resource::REBOOT => {
                state.reboots += 1;
                info!(reboots = state.reboots, "reboot requested");
                ResponseCode::Changed
            },
            resource::FACTORY_RESET => {
                let reboots = state.reboots;
                *state = DeviceState { reboots, ..DeviceState::default() };
                warn!("factory reset");
                ResponseCode::Changed
            },
            resource::RESET_ERROR_CODE => {
                state.error_code = NO_ERROR;
                ResponseCode::Changed
            },
            _ => ResponseCode::MethodNotAllowed,
        }
    }
}

/// Seconds since the Unix epoch by the system clock.
fn system_time() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
