//! Object registry: the read-only catalog of object definitions.
//!
//! A registry is shared process-wide but passed explicitly to whoever needs
//! it, so tests can supply fixture catalogs. [`OmaRegistry`] carries the core
//! OMA objects 0 through 7. Further objects are described in a JSON
//! document (an array of definitions) and loaded with
//! [`StaticRegistry::from_json`].

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    definition::{ObjectDefinition, Operations as Op, ResourceDefinition, ResourceType as Ty},
    error::RegistryError,
    types::ObjectType,
};

/// Read-only catalog of object definitions.
pub trait Registry: Send + Sync {
    /// Definition for `object_type`, if the catalog knows it.
    fn definition(&self, object_type: ObjectType) -> Option<Arc<ObjectDefinition>>;

    /// Object types every client must enable.
    fn mandatory_types(&self) -> Vec<ObjectType>;
}

/// Registry backed by an in-memory map of definitions.
///
/// Mandatory types are the definitions flagged `mandatory`, in ascending
/// type order.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    definitions: BTreeMap<ObjectType, Arc<ObjectDefinition>>,
}

impl StaticRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a definition.
    pub fn insert(&mut self, definition: ObjectDefinition) {
        self.definitions.insert(definition.object_type, Arc::new(definition));
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, definition: ObjectDefinition) -> Self {
        self.insert(definition);
        self
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the registry has no definitions.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in ascending type order.
    pub fn definitions(&self) -> impl Iterator<Item = &ObjectDefinition> {
        self.definitions.values().map(AsRef::as_ref)
    }

    /// Load a catalog from a JSON array of object definitions.
    ///
    /// Each object type may appear only once.
    pub fn from_json(document: &str) -> Result<Self, RegistryError> {
        let definitions: Vec<ObjectDefinition> = serde_json::from_str(document)?;
        let mut registry = Self::new();
        for definition in definitions {
            if registry.definitions.contains_key(&definition.object_type) {
                return Err(RegistryError::DuplicateObject { object_type: definition.object_type });
            }
            registry.insert(definition);
        }
        Ok(registry)
    }

    /// Export the catalog as a JSON array accepted by [`from_json`](Self::from_json).
    pub fn to_json(&self) -> Result<String, RegistryError> {
        let definitions: Vec<&ObjectDefinition> = self.definitions().collect();
        Ok(serde_json::to_string_pretty(&definitions)?)
    }
}

impl Registry for StaticRegistry {
    fn definition(&self, object_type: ObjectType) -> Option<Arc<ObjectDefinition>> {
        self.definitions.get(&object_type).cloned()
    }

    fn mandatory_types(&self) -> Vec<ObjectType> {
        self.definitions.values().filter(|d| d.mandatory).map(|d| d.object_type).collect()
    }
}

/// Catalog of the core OMA LWM2M objects (Security through Connectivity
/// Statistics). Security, Server and Device are mandatory.
#[derive(Debug, Clone)]
pub struct OmaRegistry {
    inner: StaticRegistry,
}

impl OmaRegistry {
    /// Build the catalog.
    pub fn new() -> Self {
        let inner = StaticRegistry::new()
            .with(security())
            .with(server())
            .with(access_control())
            .with(device())
            .with(connectivity_monitoring())
            .with(firmware_update())
            .with(location())
            .with(connectivity_statistics());
        Self { inner }
    }

    /// Build the catalog plus `extensions`. Core definitions take precedence
    /// over an extension of the same type.
    pub fn with_extensions(extensions: StaticRegistry) -> Self {
        let mut registry = Self::new();
        for (object_type, definition) in extensions.definitions {
            registry.inner.definitions.entry(object_type).or_insert(definition);
        }
        registry
    }

    /// Every definition in the catalog.
    pub fn catalog(&self) -> &StaticRegistry {
        &self.inner
    }
}

impl Default for OmaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry for OmaRegistry {
    fn definition(&self, object_type: ObjectType) -> Option<Arc<ObjectDefinition>> {
        self.inner.definition(object_type)
    }

    fn mandatory_types(&self) -> Vec<ObjectType> {
        self.inner.mandatory_types()
    }
}

fn res(id: u16, name: &str, ops: Op, ty: Ty) -> ResourceDefinition {
    ResourceDefinition::new(id, name, ops, ty)
}

// Security resources are only reachable through bootstrap, so none permit
// remote access.
fn security() -> ObjectDefinition {
    let none = Op::empty();
    ObjectDefinition::new(
        ObjectType::SECURITY,
        "LWM2M Security",
        true,
        true,
        vec![
            res(0, "LWM2M Server URI", none, Ty::String).mandatory(),
            res(1, "Bootstrap Server", none, Ty::Boolean).mandatory(),
            res(2, "Security Mode", none, Ty::Integer).mandatory(),
            res(3, "Public Key or Identity", none, Ty::Opaque).mandatory(),
            res(4, "Server Public Key or Identity", none, Ty::Opaque).mandatory(),
            res(5, "Secret Key", none, Ty::Opaque).mandatory(),
            res(6, "SMS Security Mode", none, Ty::Integer),
            res(7, "SMS Binding Key Parameters", none, Ty::Opaque),
            res(8, "SMS Binding Secret Keys", none, Ty::Opaque),
            res(9, "LWM2M Server SMS Number", none, Ty::Integer),
            res(10, "Short Server ID", none, Ty::Integer),
            res(11, "Client Hold Off Time", none, Ty::Integer),
        ],
    )
}

fn server() -> ObjectDefinition {
    ObjectDefinition::new(
        ObjectType::SERVER,
        "LWM2M Server",
        true,
        true,
        vec![
            res(0, "Short Server ID", Op::READ, Ty::Integer).mandatory(),
            res(1, "Lifetime", Op::READ_WRITE, Ty::Integer).mandatory(),
            res(2, "Default Minimum Period", Op::READ_WRITE, Ty::Integer),
            res(3, "Default Maximum Period", Op::READ_WRITE, Ty::Integer),
            res(4, "Disable", Op::EXECUTE, Ty::None),
            res(5, "Disable Timeout", Op::READ_WRITE, Ty::Integer),
            res(6, "Notification Storing When Disabled or Offline", Op::READ_WRITE, Ty::Boolean)
                .mandatory(),
            res(7, "Binding", Op::READ_WRITE, Ty::String).mandatory(),
            res(8, "Registration Update Trigger", Op::EXECUTE, Ty::None).mandatory(),
        ],
    )
}

fn access_control() -> ObjectDefinition {
    ObjectDefinition::new(
        ObjectType::ACCESS_CONTROL,
        "LWM2M Access Control",
        true,
        false,
        vec![
            res(0, "Object ID", Op::READ, Ty::Integer).mandatory(),
            res(1, "Object Instance ID", Op::READ, Ty::Integer).mandatory(),
            res(2, "ACL", Op::READ_WRITE, Ty::Integer).multiple(),
            res(3, "Access Control Owner", Op::READ_WRITE, Ty::Integer).mandatory(),
        ],
    )
}

fn device() -> ObjectDefinition {
    ObjectDefinition::new(
        ObjectType::DEVICE,
        "Device",
        false,
        true,
        vec![
            res(0, "Manufacturer", Op::READ, Ty::String),
            res(1, "Model Number", Op::READ, Ty::String),
            res(2, "Serial Number", Op::READ, Ty::String),
            res(3, "Firmware Version", Op::READ, Ty::String),
            res(4, "Reboot", Op::EXECUTE, Ty::None).mandatory(),
            res(5, "Factory Reset", Op::EXECUTE, Ty::None),
            res(6, "Available Power Sources", Op::READ, Ty::Integer).multiple(),
            res(7, "Power Source Voltage", Op::READ, Ty::Integer).multiple(),
            res(8, "Power Source Current", Op::READ, Ty::Integer).multiple(),
            res(9, "Battery Level", Op::READ, Ty::Integer),
            res(10, "Memory Free", Op::READ, Ty::Integer),
            res(11, "Error Code", Op::READ, Ty::Integer).multiple().mandatory(),
            res(12, "Reset Error Code", Op::EXECUTE, Ty::None),
            res(13, "Current Time", Op::READ_WRITE, Ty::Time),
            res(14, "UTC Offset", Op::READ_WRITE, Ty::String),
            res(15, "Timezone", Op::READ_WRITE, Ty::String),
            res(16, "Supported Binding and Modes", Op::READ, Ty::String).mandatory(),
        ],
    )
}

fn connectivity_monitoring() -> ObjectDefinition {
    ObjectDefinition::new(
        ObjectType::CONNECTIVITY_MONITORING,
        "Connectivity Monitoring",
        false,
        false,
        vec![
            res(0, "Network Bearer", Op::READ, Ty::Integer).mandatory(),
            res(1, "Available Network Bearer", Op::READ, Ty::Integer).multiple().mandatory(),
            res(2, "Radio Signal Strength", Op::READ, Ty::Integer).mandatory(),
            res(3, "Link Quality", Op::READ, Ty::Integer),
            res(4, "IP Addresses", Op::READ, Ty::String).multiple().mandatory(),
            res(5, "Router IP Addresses", Op::READ, Ty::String).multiple(),
            res(6, "Link Utilization", Op::READ, Ty::Integer),
            res(7, "APN", Op::READ, Ty::String).multiple(),
            res(8, "Cell ID", Op::READ, Ty::Integer),
            res(9, "SMNC", Op::READ, Ty::Integer),
            res(10, "SMCC", Op::READ, Ty::Integer),
        ],
    )
}

fn firmware_update() -> ObjectDefinition {
    ObjectDefinition::new(
        ObjectType::FIRMWARE_UPDATE,
        "Firmware Update",
        false,
        false,
        vec![
            res(0, "Package", Op::WRITE, Ty::Opaque).mandatory(),
            res(1, "Package URI", Op::WRITE, Ty::String).mandatory(),
            res(2, "Update", Op::EXECUTE, Ty::None).mandatory(),
            res(3, "State", Op::READ, Ty::Integer).mandatory(),
            res(4, "Update Supported Objects", Op::READ_WRITE, Ty::Boolean),
            res(5, "Update Result", Op::READ, Ty::Integer).mandatory(),
        ],
    )
}

fn location() -> ObjectDefinition {
    ObjectDefinition::new(
        ObjectType::LOCATION,
        "Location",
        false,
        false,
        vec![
            res(0, "Latitude", Op::READ, Ty::String).mandatory(),
            res(1, "Longitude", Op::READ, Ty::String).mandatory(),
            res(2, "Altitude", Op::READ, Ty::String),
            res(3, "Uncertainty", Op::READ, Ty::String),
            res(4, "Velocity", Op::READ, Ty::Opaque),
            res(5, "Timestamp", Op::READ, Ty::Time).mandatory(),
        ],
    )
}

fn connectivity_statistics() -> ObjectDefinition {
    ObjectDefinition::new(
        ObjectType::CONNECTIVITY_STATISTICS,
        "Connectivity Statistics",
        false,
        false,
        vec![
            res(0, "SMS Tx Counter", Op::READ, Ty::Integer),
            res(1, "SMS Rx Counter", Op::READ, Ty::Integer),
            res(2, "Tx Data", Op::READ, Ty::Integer),
            res(3, "Rx Data", Op::READ, Ty::Integer),
            res(4, "Max Message Size", Op::READ, Ty::Integer),
            res(5, "Average Message Size", Op::READ, Ty::Integer),
            res(6, "StartOrReset", Op::EXECUTE, Ty::None).mandatory(),
        ],
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TEMPERATURE: &str = r#"[
        {
            "object_type": 3303,
            "name": "Temperature",
            "multiple_instances": true,
            "resources": [
                { "id": 5700, "name": "Sensor Value", "operations": "READ",
                  "resource_type": "float", "mandatory": true },
                { "id": 5701, "name": "Sensor Units", "operations": "READ",
                  "resource_type": "string" }
            ]
        }
    ]"#;

    #[test]
    fn oma_mandatory_set() {
        let registry = OmaRegistry::new();
        assert_eq!(
            registry.mandatory_types(),
            vec![ObjectType::SECURITY, ObjectType::SERVER, ObjectType::DEVICE]
        );
    }

    #[test]
    fn oma_catalog_covers_core_objects() {
        let registry = OmaRegistry::new();
        for id in 0..=7 {
            assert!(registry.definition(ObjectType(id)).is_some(), "missing object {id}");
        }
        assert!(registry.definition(ObjectType(8)).is_none());
    }

    #[test]
    fn device_reboot_is_executable_only() {
        let registry = OmaRegistry::new();
        let device = registry.definition(ObjectType::DEVICE);
        let reboot = device.as_deref().and_then(|d| d.resource(4));
        assert!(reboot.is_some_and(|r| r.is_executable() && !r.is_readable()));
    }

    #[test]
    fn security_denies_remote_access() {
        let registry = OmaRegistry::new();
        let security = registry.definition(ObjectType::SECURITY);
        assert!(security.is_some_and(|d| d.resources().iter().all(|r| r.operations.is_empty())));
    }

    #[test]
    fn static_registry_shares_definitions() {
        let registry = StaticRegistry::new().with(ObjectDefinition::new(
            ObjectType(42),
            "Fixture",
            true,
            false,
            vec![],
        ));
        let a = registry.definition(ObjectType(42));
        let b = registry.definition(ObjectType(42));
        assert!(matches!((a, b), (Some(a), Some(b)) if Arc::ptr_eq(&a, &b)));
        assert!(registry.mandatory_types().is_empty());
    }

    #[test]
    fn load_definitions_from_json() {
        let registry = StaticRegistry::from_json(TEMPERATURE).unwrap();

        assert_eq!(registry.len(), 1);
        let temperature = registry.definition(ObjectType(3303)).unwrap();
        assert_eq!(temperature.name, "Temperature");
        assert_eq!(temperature.resource_ids_with(Op::READ).collect::<Vec<_>>(), vec![5700, 5701]);
        assert!(temperature.resource(5700).is_some_and(|r| r.mandatory));
    }

    #[test]
    fn duplicate_object_in_document_is_rejected() {
        let document = r#"[
            { "object_type": 3303, "name": "Temperature" },
            { "object_type": 3303, "name": "Again" }
        ]"#;
        let err = StaticRegistry::from_json(document).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateObject { object_type: ObjectType(3303) }));
        assert_eq!(err.to_string(), "object 3303 defined more than once");
    }

    #[test]
    fn malformed_document_is_rejected() {
        let unknown_type = r#"[{ "object_type": 1, "name": "x",
            "resources": [{ "id": 0, "name": "y", "operations": "READ", "resource_type": "decimal" }] }]"#;
        assert!(matches!(StaticRegistry::from_json(unknown_type), Err(RegistryError::Json(_))));
        assert!(matches!(StaticRegistry::from_json("{}"), Err(RegistryError::Json(_))));
        assert!(matches!(
            StaticRegistry::from_json(r#"[{ "object_type": 70000, "name": "x" }]"#),
            Err(RegistryError::Json(_))
        ));
    }

    #[test]
    fn exported_catalog_loads_back() {
        let oma = OmaRegistry::new();
        let reloaded = StaticRegistry::from_json(&oma.catalog().to_json().unwrap()).unwrap();

        assert!(oma.catalog().definitions().eq(reloaded.definitions()));
        assert_eq!(reloaded.mandatory_types(), oma.mandatory_types());
    }

    #[test]
    fn extensions_never_replace_core_objects() {
        let extensions = StaticRegistry::from_json(TEMPERATURE)
            .unwrap()
            .with(ObjectDefinition::new(ObjectType::DEVICE, "Impostor", true, false, vec![]));
        let registry = OmaRegistry::with_extensions(extensions);

        assert!(registry.definition(ObjectType(3303)).is_some());
        assert_eq!(registry.definition(ObjectType::DEVICE).unwrap().name, "Device");
        assert_eq!(registry.catalog().len(), 9);
    }
}
