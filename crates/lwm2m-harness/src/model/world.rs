//! Model world.
//!
//! Tracks which objects are enabled, with which enabler kind, which
//! instances exist, the registration state, and how many times the
//! recording enabler has been invoked. Request outcomes are computed straight
//! from the registry definitions, so the model is the oracle the real client
//! is checked against.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use lwm2m_client::RegistrationState;
use lwm2m_proto::{ObjectType, Operations, Registry, ResponseCode};

use super::operation::{
    Action, ActionError, ActionResult, ModelEnabler, RequestKind, instance_id, object_type,
    resource_id,
};
use crate::fixtures::fixture_registry;

/// Model of one enabled object.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ModelObjectState {
    enabler: ModelEnabler,
    instances: BTreeSet<u16>,
}

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Enabled objects and their instance ids.
    pub instances: BTreeMap<ObjectType, Vec<u16>>,
    /// Registration state.
    pub registration: RegistrationState,
    /// Calls made on the recording enabler.
    pub enabler_calls: usize,
}

/// Reference model.
#[derive(Clone)]
pub struct ModelWorld {
    registry: Arc<dyn Registry>,
    objects: BTreeMap<ObjectType, ModelObjectState>,
    registration: RegistrationState,
    enabler_calls: usize,
}

impl Default for ModelWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelWorld {
    /// Fresh client: mandatory objects enabled with the null enabler.
    pub fn new() -> Self {
        let registry = fixture_registry();
        let objects = registry
            .mandatory_types()
            .into_iter()
            .map(|t| (t, ModelObjectState { enabler: ModelEnabler::Null, instances: BTreeSet::new() }))
            .collect();
        Self { registry, objects, registration: RegistrationState::Unregistered, enabler_calls: 0 }
    }

    /// Apply an action and return the predicted result.
    pub fn apply(&mut self, action: &Action) -> ActionResult {
        match *action {
            Action::Enable { object, enabler } => self.enable(object_type(object), enabler),
            Action::SetEnabler { object } => match self.objects.get_mut(&object_type(object)) {
                Some(state) => {
                    state.enabler = ModelEnabler::Recording;
                    ActionResult::Ok
                },
                None => ActionResult::Error(ActionError::NotEnabled),
            },
            Action::AddInstance { object, instance } => {
                match self.objects.get_mut(&object_type(object)) {
                    Some(state) => {
                        state.instances.insert(instance_id(instance));
                        ActionResult::Ok
                    },
                    None => ActionResult::Error(ActionError::NotEnabled),
                }
            },
            Action::Request { kind, object, instance, resource } => {
                let code = self.request(
                    kind,
                    object_type(object),
                    instance_id(instance),
                    resource.map(resource_id),
                );
                ActionResult::Code(code)
            },
            Action::Register { long_name } => {
                if self.registration != RegistrationState::Unregistered {
                    return ActionResult::Error(ActionError::StateConflict);
                }
                if long_name {
                    return ActionResult::Error(ActionError::NameTooLong);
                }
                self.registration = RegistrationState::Registered;
                ActionResult::Ok
            },
            Action::Update => {
                if self.registration == RegistrationState::Registered {
                    ActionResult::Ok
                } else {
                    ActionResult::Error(ActionError::StateConflict)
                }
            },
            Action::Deregister => {
                if self.registration != RegistrationState::Registered {
                    return ActionResult::Error(ActionError::StateConflict);
                }
                self.registration = RegistrationState::Deregistered;
                ActionResult::Ok
            },
        }
    }

    fn enable(&mut self, object_type: ObjectType, enabler: ModelEnabler) -> ActionResult {
        if self.objects.contains_key(&object_type) {
            return ActionResult::Error(ActionError::AlreadyEnabled);
        }
        if self.registry.definition(object_type).is_none() {
            return ActionResult::Error(ActionError::UnknownObject);
        }
        self.objects.insert(object_type, ModelObjectState { enabler, instances: BTreeSet::new() });
        ActionResult::Ok
    }

    fn request(
        &mut self,
        kind: RequestKind,
        object_type: ObjectType,
        instance: u16,
        resource: Option<u16>,
    ) -> ResponseCode {
        let Some(state) = self.objects.get_mut(&object_type) else {
            return ResponseCode::NotFound;
        };
        let Some(definition) = self.registry.definition(object_type) else {
            return ResponseCode::NotFound;
        };
        let recording = match state.enabler {
            ModelEnabler::Missing => return ResponseCode::MethodNotAllowed,
            ModelEnabler::Null => false,
            ModelEnabler::Recording => true,
        };

        let access = match kind {
            RequestKind::Read => Operations::READ,
            RequestKind::Write => Operations::WRITE,
            RequestKind::Execute => Operations::EXECUTE,
            RequestKind::Create => {
                if !recording {
                    return ResponseCode::MethodNotAllowed;
                }
                self.enabler_calls += 1;
                state.instances.insert(instance);
                return ResponseCode::Created;
            },
            RequestKind::Delete => {
                if !recording {
                    return ResponseCode::MethodNotAllowed;
                }
                self.enabler_calls += 1;
                state.instances.remove(&instance);
                return ResponseCode::Deleted;
            },
        };

        let resource = match (kind, resource) {
            (RequestKind::Execute, None) => Some(0),
            (_, resource) => resource,
        };

        let Some(resource) = resource else {
            if kind != RequestKind::Read {
                return ResponseCode::MethodNotAllowed;
            }
            let readable = definition.resource_ids_with(Operations::READ).count();
            if readable == 0 || !recording {
                return ResponseCode::MethodNotAllowed;
            }
            self.enabler_calls += readable;
            return ResponseCode::Content;
        };

        let Some(definition) = definition.resource(resource) else {
            return ResponseCode::NotFound;
        };
        if !definition.allows(access) || !recording {
            return ResponseCode::MethodNotAllowed;
        }

        self.enabler_calls += 1;
        match kind {
            RequestKind::Read => ResponseCode::Content,
            _ => ResponseCode::Changed,
        }
    }

    /// Registration state.
    pub fn registration(&self) -> RegistrationState {
        self.registration
    }

    /// Whether `object_type` is enabled.
    pub fn is_enabled(&self, object_type: ObjectType) -> bool {
        self.objects.contains_key(&object_type)
    }

    /// Snapshot for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            instances: self
                .objects
                .iter()
                .map(|(t, state)| (*t, state.instances.iter().copied().collect()))
                .collect(),
            registration: self.registration,
            enabler_calls: self.enabler_calls,
        }
    }
}
