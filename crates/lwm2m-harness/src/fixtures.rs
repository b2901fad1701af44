//! Shared test fixtures.
//!
//! The fixture registry is the OMA catalog plus one synthetic object whose
//! resources cover every access-flag combination:
//!
//! | id | name        | access     | type    |
//! |----|-------------|------------|---------|
//! | 0  | Counter     | read       | integer |
//! | 1  | Label       | write      | string  |
//! | 2  | Trigger     | execute    | none    |
//! | 3  | Setpoint    | read/write | integer |
//! | 4  | Sealed      | none       | integer |
//! | 5  | Samples     | read       | integer (multiple) |

use std::{collections::BTreeMap, sync::Arc};

use lwm2m_client::{ObjectEnabler, Operation, OperationContext};
use lwm2m_proto::{
    InstanceId, ObjectDefinition, ObjectType, OmaRegistry, Operations, Registry, ResourceDefinition,
    ResourceId, ResourceType, ResponseCode, StaticRegistry, Value,
};
use parking_lot::Mutex;

/// Synthetic object type covering every access combination.
pub const FIXTURE_OBJECT: ObjectType = ObjectType(9000);

/// Definition of [`FIXTURE_OBJECT`].
pub fn fixture_definition() -> ObjectDefinition {
    ObjectDefinition::new(
        FIXTURE_OBJECT,
        "Harness Fixture",
        true,
        false,
        vec![
            ResourceDefinition::new(0, "Counter", Operations::READ, ResourceType::Integer),
            ResourceDefinition::new(1, "Label", Operations::WRITE, ResourceType::String),
            ResourceDefinition::new(2, "Trigger", Operations::EXECUTE, ResourceType::None),
            ResourceDefinition::new(3, "Setpoint", Operations::READ_WRITE, ResourceType::Integer),
            ResourceDefinition::new(4, "Sealed", Operations::empty(), ResourceType::Integer),
            ResourceDefinition::new(5, "Samples", Operations::READ, ResourceType::Integer).multiple(),
        ],
    )
}

/// OMA catalog (objects 0-7) plus [`FIXTURE_OBJECT`].
pub fn fixture_registry() -> Arc<dyn Registry> {
    let oma = OmaRegistry::new();
    let mut registry = StaticRegistry::new();
    for id in 0..=7 {
        if let Some(definition) = oma.definition(ObjectType(id)) {
            registry.insert((*definition).clone());
        }
    }
    registry.insert(fixture_definition());
    Arc::new(registry)
}

/// One recorded enabler invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Operation performed.
    pub operation: Operation,
    /// Addressed instance.
    pub instance: InstanceId,
    /// Addressed resource, if any.
    pub resource: Option<ResourceId>,
    /// Written value, for writes.
    pub value: Option<Value>,
}

#[derive(Debug, Default)]
struct RecorderState {
    calls: Vec<Call>,
    values: BTreeMap<(InstanceId, ResourceId), Value>,
}

/// Enabler that accepts every operation, stores written values and records
/// each call.
///
/// Reads return the last written value, or `Integer(0)` for resources never
/// written. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct RecordingEnabler {
    state: Arc<Mutex<RecorderState>>,
}

impl RecordingEnabler {
    /// Fresh recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the value returned for a resource.
    pub fn set_value(&self, instance: InstanceId, resource: ResourceId, value: Value) {
        self.state.lock().values.insert((instance, resource), value);
    }

    /// Stored value of a resource.
    pub fn value(&self, instance: InstanceId, resource: ResourceId) -> Option<Value> {
        self.state.lock().values.get(&(instance, resource)).cloned()
    }

    /// All calls so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Number of calls so far.
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    fn record(
        &self,
        operation: Operation,
        instance: InstanceId,
        resource: Option<ResourceId>,
        value: Option<Value>,
    ) {
        self.state.lock().calls.push(Call { operation, instance, resource, value });
    }
}

impl ObjectEnabler for RecordingEnabler {
    fn on_create(
        &self,
        instance: InstanceId,
        resource: Option<ResourceId>,
        _ctx: &OperationContext<'_>,
    ) -> ResponseCode {
        self.record(Operation::Create, instance, resource, None);
        ResponseCode::Created
    }

    fn on_read(
        &self,
        instance: InstanceId,
        resource: ResourceId,
        _ctx: &OperationContext<'_>,
    ) -> (Value, ResponseCode) {
        self.record(Operation::Read, instance, Some(resource), None);
        let value = self.value(instance, resource).unwrap_or(Value::Integer(0));
        (value, ResponseCode::Content)
    }

    fn on_write(
        &self,
        instance: InstanceId,
        resource: ResourceId,
        ctx: &OperationContext<'_>,
    ) -> ResponseCode {
        let value = ctx.value.cloned().unwrap_or_default();
        self.record(Operation::Write, instance, Some(resource), Some(value.clone()));
        self.set_value(instance, resource, value);
        ResponseCode::Changed
    }

    fn on_delete(&self, instance: InstanceId, _ctx: &OperationContext<'_>) -> ResponseCode {
        self.record(Operation::Delete, instance, None, None);
        self.state.lock().values.retain(|(i, _), _| *i != instance);
        ResponseCode::Deleted
    }

    fn on_execute(
        &self,
        instance: InstanceId,
        resource: ResourceId,
        _ctx: &OperationContext<'_>,
    ) -> ResponseCode {
        self.record(Operation::Execute, instance, Some(resource), None);
        ResponseCode::Changed
    }
}

/// Enabler answering every callback with one fixed code.
#[derive(Debug, Clone, Copy)]
pub struct FixedEnabler(pub ResponseCode);

impl ObjectEnabler for FixedEnabler {
    fn on_create(
        &self,
        _: InstanceId,
        _: Option<ResourceId>,
        _: &OperationContext<'_>,
    ) -> ResponseCode {
        self.0
    }

    fn on_read(
        &self,
        _: InstanceId,
        _: ResourceId,
        _: &OperationContext<'_>,
    ) -> (Value, ResponseCode) {
        (Value::Empty, self.0)
    }

    fn on_write(&self, _: InstanceId, _: ResourceId, _: &OperationContext<'_>) -> ResponseCode {
        self.0
    }

    fn on_delete(&self, _: InstanceId, _: &OperationContext<'_>) -> ResponseCode {
        self.0
    }

    fn on_execute(&self, _: InstanceId, _: ResourceId, _: &OperationContext<'_>) -> ResponseCode {
        self.0
    }
}

/// Plain-text payload that decodes for `resource_type`.
pub fn sample_text(resource_type: ResourceType) -> &'static str {
    match resource_type {
        ResourceType::String | ResourceType::Opaque => "harness",
        ResourceType::Integer | ResourceType::Time => "7",
        ResourceType::Float => "1.5",
        ResourceType::Boolean => "1",
        ResourceType::None => "",
    }
}
