//! Test harness for the LWM2M client.
//!
//! - [`LoopbackTransport`]: in-process transport with a scripted server
//! - [`fixtures`]: a registry with an object covering every access-flag
//!   combination, plus recording and fixed-code enablers
//! - [`model`]: reference model for model-based testing, mirrored by
//!   [`ClientWorld`] over the real client

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod loopback;
pub mod model;
pub mod world;

pub use fixtures::{
    Call, FIXTURE_OBJECT, FixedEnabler, RecordingEnabler, fixture_definition, fixture_registry,
    sample_text,
};
pub use loopback::LoopbackTransport;
pub use model::{
    Action, ActionError, ActionResult, ModelEnabler, ModelWorld, ObservableState, RequestKind,
};
pub use world::ClientWorld;
