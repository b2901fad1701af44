//! Actions for model-based testing.
//!
//! Actions cover the whole client surface: table configuration, inbound
//! requests and the registration lifecycle. They are generated randomly and
//! applied to both the model and the real client.

use arbitrary::Arbitrary;
use lwm2m_proto::{ObjectType, ResponseCode};

use crate::fixtures::FIXTURE_OBJECT;

/// Index into [`OBJECT_CHOICES`].
pub type ModelObject = u8;

/// Object types actions may target: the mandatory trio, an optional
/// catalog object, the fixture object, and a type no registry defines.
pub const OBJECT_CHOICES: [ObjectType; 6] = [
    ObjectType::SECURITY,
    ObjectType::SERVER,
    ObjectType::DEVICE,
    ObjectType::LOCATION,
    FIXTURE_OBJECT,
    ObjectType(4242),
];

/// Resolve a generated object index.
pub fn object_type(object: ModelObject) -> ObjectType {
    OBJECT_CHOICES[usize::from(object) % OBJECT_CHOICES.len()]
}

/// Instance ids are folded into a small range so actions collide.
pub fn instance_id(instance: u8) -> u16 {
    u16::from(instance % 4)
}

/// Resource ids span the fixture's defined resources plus undefined ones.
pub fn resource_id(resource: u8) -> u16 {
    u16::from(resource % 8)
}

/// Enabler configured for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum ModelEnabler {
    /// Enabled without an enabler.
    Missing,
    /// Placeholder enabler refusing everything.
    Null,
    /// Shared recording enabler accepting everything.
    Recording,
}

/// Inbound request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum RequestKind {
    /// GET.
    Read,
    /// PUT.
    Write,
    /// POST on a resource.
    Execute,
    /// POST on an instance.
    Create,
    /// DELETE on an instance.
    Delete,
}

/// Actions that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Action {
    /// Enable an object type.
    Enable {
        /// Target object.
        object: ModelObject,
        /// Enabler to install.
        enabler: ModelEnabler,
    },

    /// Replace an object's enabler with the recording enabler.
    SetEnabler {
        /// Target object.
        object: ModelObject,
    },

    /// Provision an instance.
    AddInstance {
        /// Target object.
        object: ModelObject,
        /// Instance (folded by [`instance_id`]).
        instance: u8,
    },

    /// Deliver an inbound request.
    Request {
        /// Request kind.
        kind: RequestKind,
        /// Target object.
        object: ModelObject,
        /// Target instance.
        instance: u8,
        /// Target resource; `None` addresses the instance. Execute always
        /// addresses a resource and falls back to resource 0.
        resource: Option<u8>,
    },

    /// Register, with a valid or an over-long endpoint name.
    Register {
        /// Use a name longer than the bound.
        long_name: bool,
    },

    /// Refresh the registration.
    Update,

    /// Deregister.
    Deregister,
}

/// Result of applying an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    /// Configuration or lifecycle call succeeded.
    Ok,
    /// Inbound request answered with this code.
    Code(ResponseCode),
    /// Call failed.
    Error(ActionError),
}

impl ActionResult {
    /// Whether the call succeeded or the request got a 2.xx answer.
    pub fn is_ok(&self) -> bool {
        match self {
            Self::Ok => true,
            Self::Code(code) => code.is_success(),
            Self::Error(_) => false,
        }
    }
}

/// Expected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionError {
    /// Object already enabled.
    AlreadyEnabled,
    /// Object not enabled.
    NotEnabled,
    /// Object not in the registry.
    UnknownObject,
    /// Endpoint name over the bound.
    NameTooLong,
    /// Lifecycle call in the wrong state.
    StateConflict,
    /// Anything the model does not predict.
    Unexpected,
}
