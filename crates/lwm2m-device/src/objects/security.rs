//! LWM2M Security (object 0).
//!
//! Holds one account per server the device may talk to. Security resources
//! carry keys, so the enabler keeps the defaults and refuses every remote
//! operation; the data is only read locally.

use std::collections::BTreeMap;

use lwm2m_client::ObjectEnabler;
use lwm2m_proto::{InstanceId, ResourceId, Value};

/// Security Mode value for unsecured (NoSec) connections.
pub const SECURITY_MODE_NOSEC: i64 = 3;

/// Resource ids within a Security instance.
mod resource {
    pub const SERVER_URI: u16 = 0;
    pub const BOOTSTRAP_SERVER: u16 = 1;
    pub const SECURITY_MODE: u16 = 2;
    pub const PUBLIC_KEY: u16 = 3;
    pub const SECRET_KEY: u16 = 5;
    pub const SHORT_SERVER_ID: u16 = 10;
    pub const HOLD_OFF_TIME: u16 = 11;
}

/// One server account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityAccount {
    /// Server URI, e.g. `coap://127.0.0.1:5683`.
    pub server_uri: String,
    /// Whether this is a bootstrap server.
    pub bootstrap: bool,
    /// Short Server ID linking the account to a Server instance.
    pub short_server_id: u16,
    /// Seconds to wait before initiating bootstrap.
    pub hold_off_secs: u32,
}

impl SecurityAccount {
    /// NoSec account for a regular LWM2M server.
    pub fn server(server_uri: impl Into<String>, short_server_id: u16) -> Self {
        Self { server_uri: server_uri.into(), bootstrap: false, short_server_id, hold_off_secs: 0 }
    }

    fn resources(&self) -> [(ResourceId, Value); 7] {
        [
            (resource::SERVER_URI, Value::String(self.server_uri.clone())),
            (resource::BOOTSTRAP_SERVER, Value::Boolean(self.bootstrap)),
            (resource::SECURITY_MODE, Value::Integer(SECURITY_MODE_NOSEC)),
            (resource::PUBLIC_KEY, Value::Opaque(Default::default())),
            (resource::SECRET_KEY, Value::Opaque(Default::default())),
            (resource::SHORT_SERVER_ID, Value::Integer(i64::from(self.short_server_id))),
            (resource::HOLD_OFF_TIME, Value::Integer(i64::from(self.hold_off_secs))),
        ]
    }
}

/// Security object backed by a data map keyed by `(instance, resource)`.
#[derive(Debug, Clone, Default)]
pub struct SecurityObject {
    data: BTreeMap<(InstanceId, ResourceId), Value>,
}

impl SecurityObject {
    /// Empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Object with one instance per account, numbered from 0.
    pub fn with_accounts<I>(accounts: I) -> Self
    where
        I: IntoIterator<Item = SecurityAccount>,
    {
        let mut object = Self::new();
        for (instance, account) in (0..).zip(accounts) {
            object.insert(instance, &account);
        }
        object
    }

    /// Store `account` as `instance`, replacing any previous data.
    pub fn insert(&mut self, instance: InstanceId, account: &SecurityAccount) {
        self.data.retain(|(i, _), _| *i != instance);
        for (resource, value) in account.resources() {
            self.data.insert((instance, resource), value);
        }
    }

    /// Stored value of a resource.
    pub fn value(&self, instance: InstanceId, resource: ResourceId) -> Option<&Value> {
        self.data.get(&(instance, resource))
    }

    /// Instances holding data, ascending.
    pub fn instances(&self) -> Vec<InstanceId> {
        let mut ids: Vec<_> = self.data.keys().map(|(i, _)| *i).collect();
        ids.dedup();
        ids
    }

    /// Server URI of `instance`.
    pub fn server_uri(&self, instance: InstanceId) -> Option<&str> {
        match self.value(instance, resource::SERVER_URI) {
            Some(Value::String(uri)) => Some(uri),
            _ => None,
        }
    }
}

impl ObjectEnabler for SecurityObject {}
