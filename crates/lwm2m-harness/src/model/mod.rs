//! Reference model for model-based testing.
//!
//! The model restates the client's observable behavior as plain maps and
//! sets: which objects are enabled, which enabler each has, which instances
//! exist, and where the registration lifecycle stands. It is the oracle the
//! real client is verified against.

pub mod operation;
mod world;

pub use operation::{
    Action, ActionError, ActionResult, ModelEnabler, ModelObject, OBJECT_CHOICES, RequestKind,
    instance_id, object_type, resource_id,
};
pub use world::{ModelWorld, ObservableState};
