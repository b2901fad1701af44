//! Per-object behavior.
//!
//! An [`ObjectEnabler`] supplies the application logic behind one object
//! type. The dispatcher has already resolved the object, checked the
//! resource's access flags and decoded any written value before an enabler
//! callback runs, so implementations only deal with their own data.
//!
//! Every callback has a default that answers `4.05 Method Not Allowed`;
//! implementations override only the operations they support.

use std::sync::Arc;

use lwm2m_proto::{InstanceId, ObjectPath, Request, ResourceId, ResponseCode, Value};

use crate::dispatch::Operation;

/// Enabler shared between the object table and in-flight dispatches.
pub type SharedEnabler = Arc<dyn ObjectEnabler>;

/// Everything an enabler callback may need beyond the addressed ids.
#[derive(Debug, Clone, Copy)]
pub struct OperationContext<'a> {
    /// Operation being performed.
    pub operation: Operation,
    /// Full target path.
    pub path: ObjectPath,
    /// Inbound request.
    pub request: &'a Request,
    /// Decoded value for writes.
    pub value: Option<&'a Value>,
}

impl<'a> OperationContext<'a> {
    /// Context for an operation on `path` carrying no decoded value.
    pub fn new(operation: Operation, path: ObjectPath, request: &'a Request) -> Self {
        Self { operation, path, request, value: None }
    }

    /// Attach the decoded write value.
    #[must_use]
    pub fn with_value(mut self, value: &'a Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Application behavior for one object type.
///
/// Callbacks take `&self`; enablers that keep mutable state use interior
/// mutability since dispatches may run on the transport's threads.
pub trait ObjectEnabler: Send + Sync {
    /// Create `instance`, optionally seeded with `resource`.
    fn on_create(
        &self,
        _instance: InstanceId,
        _resource: Option<ResourceId>,
        _ctx: &OperationContext<'_>,
    ) -> ResponseCode {
        ResponseCode::MethodNotAllowed
    }

    /// Read the current value of a resource.
    fn on_read(
        &self,
        _instance: InstanceId,
        _resource: ResourceId,
        _ctx: &OperationContext<'_>,
    ) -> (Value, ResponseCode) {
        (Value::Empty, ResponseCode::MethodNotAllowed)
    }

    /// Store the value carried by `ctx.value`.
    fn on_write(
        &self,
        _instance: InstanceId,
        _resource: ResourceId,
        _ctx: &OperationContext<'_>,
    ) -> ResponseCode {
        ResponseCode::MethodNotAllowed
    }

    /// Remove `instance`.
    fn on_delete(&self, _instance: InstanceId, _ctx: &OperationContext<'_>) -> ResponseCode {
        ResponseCode::MethodNotAllowed
    }

    /// Trigger the action behind an executable resource.
    fn on_execute(
        &self,
        _instance: InstanceId,
        _resource: ResourceId,
        _ctx: &OperationContext<'_>,
    ) -> ResponseCode {
        ResponseCode::MethodNotAllowed
    }
}

/// Placeholder enabler that refuses every operation.
///
/// Installed on mandatory objects until the application supplies real
/// behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEnabler;

impl ObjectEnabler for NullEnabler {}
