//! Static object and resource metadata.
//!
//! Definitions are loaded once by a [`Registry`](crate::Registry) and shared
//! by `Arc` with every enabled object. Nothing here is ever mutated after
//! construction.
//!
//! Definitions also have a JSON form, used by
//! [`StaticRegistry::from_json`](crate::StaticRegistry::from_json):
//!
//! ```json
//! {
//!   "object_type": 3303,
//!   "name": "Temperature",
//!   "multiple_instances": true,
//!   "resources": [
//!     { "id": 5700, "name": "Sensor Value", "operations": "READ",
//!       "resource_type": "float", "mandatory": true }
//!   ]
//! }
//! ```
//!
//! Operations are written as flag names joined by `|`; `multiple` and
//! `mandatory` default to `false`.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::types::{ObjectType, ResourceId};

bitflags! {
    /// Remote operations permitted on a resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Operations: u8 {
        /// Readable (GET).
        const READ = 0b001;
        /// Writable (PUT).
        const WRITE = 0b010;
        /// Executable (POST on a resource).
        const EXECUTE = 0b100;
        /// Readable and writable.
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Data type carried by a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// UTF-8 text.
    String,
    /// Signed integer (1, 2, 4 or 8 bytes on the wire).
    Integer,
    /// IEEE-754 float (4 or 8 bytes).
    Float,
    /// Single byte 0/1.
    Boolean,
    /// Raw bytes.
    Opaque,
    /// Seconds since the Unix epoch, encoded as an integer.
    Time,
    /// Executable resources carry no value.
    None,
}

impl ResourceType {
    /// Lowercase name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Opaque => "opaque",
            Self::Time => "time",
            Self::None => "none",
        }
    }
}

/// Definition of a single resource within an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Resource id.
    pub id: ResourceId,
    /// Human-readable name.
    pub name: String,
    /// Permitted remote operations.
    pub operations: Operations,
    /// Whether the resource holds multiple resource instances.
    #[serde(default)]
    pub multiple: bool,
    /// Whether the resource must be present on every instance.
    #[serde(default)]
    pub mandatory: bool,
    /// Value type.
    pub resource_type: ResourceType,
}

impl ResourceDefinition {
    /// Create a single-valued, optional resource.
    pub fn new(
        id: ResourceId,
        name: impl Into<String>,
        operations: Operations,
        resource_type: ResourceType,
    ) -> Self {
        Self { id, name: name.into(), operations, multiple: false, mandatory: false, resource_type }
    }

    /// Mark the resource as multi-instance.
    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Mark the resource as mandatory.
    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Whether the resource permits `op`.
    pub fn allows(&self, op: Operations) -> bool {
        self.operations.contains(op)
    }

    /// Whether the resource can be read remotely.
    pub fn is_readable(&self) -> bool {
        self.allows(Operations::READ)
    }

    /// Whether the resource can be written remotely.
    pub fn is_writable(&self) -> bool {
        self.allows(Operations::WRITE)
    }

    /// Whether the resource can be executed remotely.
    pub fn is_executable(&self) -> bool {
        self.allows(Operations::EXECUTE)
    }
}

/// Definition of an object type: its resources in id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DefinitionDocument")]
pub struct ObjectDefinition {
    /// Object type this definition describes.
    pub object_type: ObjectType,
    /// Human-readable name.
    pub name: String,
    /// Whether more than one instance may exist.
    pub multiple_instances: bool,
    /// Whether the object is mandatory on every client.
    pub mandatory: bool,
    resources: Vec<ResourceDefinition>,
}

impl ObjectDefinition {
    /// Create a definition. Resources are kept sorted by id; on duplicate
    /// ids the first definition wins.
    pub fn new(
        object_type: ObjectType,
        name: impl Into<String>,
        multiple_instances: bool,
        mandatory: bool,
        mut resources: Vec<ResourceDefinition>,
    ) -> Self {
        resources.sort_by_key(|r| r.id);
        resources.dedup_by_key(|r| r.id);
        Self { object_type, name: name.into(), multiple_instances, mandatory, resources }
    }

    /// Look up a resource definition by id.
    pub fn resource(&self, id: ResourceId) -> Option<&ResourceDefinition> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// All resources in ascending id order.
    pub fn resources(&self) -> &[ResourceDefinition] {
        &self.resources
    }

    /// Ids of resources that permit `op`, in ascending order.
    pub fn resource_ids_with(&self, op: Operations) -> impl Iterator<Item = ResourceId> + '_ {
        self.resources.iter().filter(move |r| r.allows(op)).map(|r| r.id)
    }
}

/// Deserialized shape of an [`ObjectDefinition`], normalized through
/// [`ObjectDefinition::new`].
#[derive(Deserialize)]
struct DefinitionDocument {
    object_type: ObjectType,
    name: String,
    #[serde(default)]
    multiple_instances: bool,
    #[serde(default)]
    mandatory: bool,
    #[serde(default)]
    resources: Vec<ResourceDefinition>,
}

impl From<DefinitionDocument> for ObjectDefinition {
    fn from(doc: DefinitionDocument) -> Self {
        Self::new(doc.object_type, doc.name, doc.multiple_instances, doc.mandatory, doc.resources)
    }
}
