//! LWM2M wire-level types.
//!
//! Everything the client object model shares with the outside world:
//!
//! - Object identifiers and `/object/instance/resource` paths
//! - Static object/resource definitions and the [`Registry`] catalog
//! - Resource [`Value`]s and their OMA-TLV encoding
//! - CoAP method/response codes, transport-neutral [`Request`]/[`Response`]
//!   records, and the CoAP datagram codec
//! - The CoRE link-format registration payload
//!
//! # Architecture
//!
//! ```text
//! lwm2m-proto
//!   ├─ types / definition / registry   (object model metadata)
//!   ├─ value / tlv                     (resource value encoding)
//!   ├─ code / message / coap           (request/response wire format)
//!   └─ link_format                     (registration payload)
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod coap;
pub mod code;
pub mod definition;
pub mod error;
pub mod link_format;
pub mod message;
pub mod registry;
pub mod tlv;
pub mod types;
pub mod value;

pub use code::{Method, ResponseCode};
pub use definition::{ObjectDefinition, Operations, ResourceDefinition, ResourceType};
pub use error::{CoapError, LinkFormatError, PathError, RegistryError, TlvError};
pub use link_format::ObjectLink;
pub use message::{Request, Response};
pub use registry::{OmaRegistry, Registry, StaticRegistry};
pub use types::{InstanceId, ObjectPath, ObjectType, ResourceId, parse_segment};
pub use value::Value;
