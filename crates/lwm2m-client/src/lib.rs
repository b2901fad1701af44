//! LWM2M client object model.
//!
//! Applications enable object types from a registry, attach an
//! [`ObjectEnabler`] to each, and provision instances. The [`Client`] then
//! installs one route per operation on a [`Transport`], dispatches inbound
//! requests through the [`Dispatcher`], and registers with the server.
//!
//! # Architecture
//!
//! ```text
//! lwm2m-client
//!   ├─ table / object       (enabled objects, instance sets)
//!   ├─ enabler              (application behavior per object type)
//!   ├─ dispatch             (access checks, payload coding, enabler calls)
//!   ├─ registration         (register / update / deregister lifecycle)
//!   ├─ transport            (Transport trait, route patterns)
//!   └─ client               (facade + hooks)
//! ```
//!
//! The crate performs no I/O of its own; transports live in adapter crates.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod dispatch;
pub mod enabler;
pub mod error;
pub mod hooks;
pub mod object;
pub mod registration;
pub mod table;
pub mod transport;

pub use client::Client;
pub use config::ClientConfig;
pub use dispatch::{Dispatcher, Operation};
pub use enabler::{NullEnabler, ObjectEnabler, OperationContext, SharedEnabler};
pub use error::{ClientError, TransportError};
pub use hooks::Hooks;
pub use object::Object;
pub use registration::{RegistrationSession, RegistrationState};
pub use table::ObjectTable;
pub use transport::{Handler, RoutePattern, Router, Transport};
