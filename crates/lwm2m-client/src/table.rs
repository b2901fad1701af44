//! Table of enabled objects.
//!
//! Maps each enabled [`ObjectType`] to its [`Object`]. Definitions come from
//! the attached [`Registry`]; an object can only be enabled if the registry
//! knows its type, and at most once.
//!
//! The table itself is single-threaded. [`Client`](crate::Client) shares it
//! with the dispatcher behind `Arc<parking_lot::RwLock<_>>`, so requests read
//! it concurrently while configuration calls take the write lock.

use std::{collections::BTreeMap, fmt, sync::Arc};

use lwm2m_proto::{InstanceId, ObjectLink, ObjectType, Registry};
use tracing::debug;

use crate::{enabler::SharedEnabler, error::ClientError, object::Object};

/// Enabled objects keyed by type.
#[derive(Default)]
pub struct ObjectTable {
    registry: Option<Arc<dyn Registry>>,
    objects: BTreeMap<ObjectType, Object>,
}

impl ObjectTable {
    /// Empty table with no registry attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty table using `registry` for definitions.
    pub fn with_registry(registry: Arc<dyn Registry>) -> Self {
        Self { registry: Some(registry), objects: BTreeMap::new() }
    }

    /// Attached registry.
    pub fn registry(&self) -> Option<&Arc<dyn Registry>> {
        self.registry.as_ref()
    }

    /// Replace the registry. Already-enabled objects keep their definitions.
    pub fn set_registry(&mut self, registry: Arc<dyn Registry>) {
        self.registry = Some(registry);
    }

    /// Enable `object_type`, optionally with an enabler.
    ///
    /// An object enabled without an enabler answers every request with
    /// `4.05 Method Not Allowed` until one is set.
    pub fn enable(
        &mut self,
        object_type: ObjectType,
        enabler: Option<SharedEnabler>,
    ) -> Result<(), ClientError> {
        let registry = self.registry.as_ref().ok_or(ClientError::NoRegistry)?;
        if self.objects.contains_key(&object_type) {
            return Err(ClientError::AlreadyEnabled { object_type });
        }
        let definition =
            registry.definition(object_type).ok_or(ClientError::UnknownObject { object_type })?;

        debug!(%object_type, name = %definition.name, "object enabled");
        self.objects.insert(object_type, Object::new(definition, enabler));
        Ok(())
    }

    /// Replace the enabler of an enabled object.
    pub fn set_enabler(
        &mut self,
        object_type: ObjectType,
        enabler: SharedEnabler,
    ) -> Result<(), ClientError> {
        let object =
            self.objects.get_mut(&object_type).ok_or(ClientError::NotEnabled { object_type })?;
        object.set_enabler(enabler);
        Ok(())
    }

    /// Record a provisioned instance of an enabled object.
    ///
    /// Adding an instance that is already present is a no-op.
    pub fn add_instance(
        &mut self,
        object_type: ObjectType,
        instance: InstanceId,
    ) -> Result<(), ClientError> {
        let object =
            self.objects.get_mut(&object_type).ok_or(ClientError::NotEnabled { object_type })?;
        object.add_instance(instance);
        Ok(())
    }

    /// Record several provisioned instances.
    pub fn add_instances(
        &mut self,
        object_type: ObjectType,
        instances: &[InstanceId],
    ) -> Result<(), ClientError> {
        let object =
            self.objects.get_mut(&object_type).ok_or(ClientError::NotEnabled { object_type })?;
        for &instance in instances {
            object.add_instance(instance);
        }
        Ok(())
    }

    /// Forget a provisioned instance. Returns whether it was present.
    pub fn remove_instance(
        &mut self,
        object_type: ObjectType,
        instance: InstanceId,
    ) -> Result<bool, ClientError> {
        let object =
            self.objects.get_mut(&object_type).ok_or(ClientError::NotEnabled { object_type })?;
        Ok(object.remove_instance(instance))
    }

    /// Look up an enabled object.
    pub fn get(&self, object_type: ObjectType) -> Option<&Object> {
        self.objects.get(&object_type)
    }

    /// Whether `object_type` is enabled.
    pub fn contains(&self, object_type: ObjectType) -> bool {
        self.objects.contains_key(&object_type)
    }

    /// Enabled objects in ascending type order.
    pub fn objects(&self) -> impl Iterator<Item = &Object> + '_ {
        self.objects.values()
    }

    /// Number of enabled objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no object is enabled.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Registration links for every enabled object, in type order.
    pub fn links(&self) -> Vec<ObjectLink> {
        self.objects.values().flat_map(Object::links).collect()
    }
}

impl fmt::Debug for ObjectTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectTable")
            .field("has_registry", &self.registry.is_some())
            .field("objects", &self.objects)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use lwm2m_proto::{ObjectPath, OmaRegistry, link_format};
    use proptest::prelude::*;

    use super::*;
    use crate::enabler::{NullEnabler, ObjectEnabler};

    fn table() -> ObjectTable {
        ObjectTable::with_registry(Arc::new(OmaRegistry::new()))
    }

    struct Marker;
    impl ObjectEnabler for Marker {}

    #[test]
    fn enable_requires_registry() {
        let mut t = ObjectTable::new();
        assert!(matches!(t.enable(ObjectType::DEVICE, None), Err(ClientError::NoRegistry)));
        assert!(t.is_empty());
    }

    #[test]
    fn enable_is_unique_per_type() {
        let mut t = table();
        t.enable(ObjectType::DEVICE, None).unwrap();
        let err = t.enable(ObjectType::DEVICE, Some(Arc::new(NullEnabler))).unwrap_err();
        assert!(matches!(err, ClientError::AlreadyEnabled { object_type } if object_type == ObjectType::DEVICE));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn enable_rejects_unknown_types() {
        let mut t = table();
        let err = t.enable(ObjectType(4242), None).unwrap_err();
        assert!(matches!(err, ClientError::UnknownObject { .. }));
        assert!(!t.contains(ObjectType(4242)));
    }

    #[test]
    fn set_enabler_replaces() {
        let mut t = table();
        t.enable(ObjectType::DEVICE, Some(Arc::new(NullEnabler))).unwrap();

        let marker: SharedEnabler = Arc::new(Marker);
        t.set_enabler(ObjectType::DEVICE, Arc::clone(&marker)).unwrap();

        let installed = t.get(ObjectType::DEVICE).unwrap().enabler().unwrap();
        assert!(Arc::ptr_eq(installed, &marker));
    }

    #[test]
    fn operations_on_disabled_objects_fail() {
        let mut t = table();
        assert!(matches!(
            t.set_enabler(ObjectType::DEVICE, Arc::new(NullEnabler)),
            Err(ClientError::NotEnabled { .. })
        ));
        assert!(matches!(t.add_instance(ObjectType::DEVICE, 0), Err(ClientError::NotEnabled { .. })));
        assert!(t.get(ObjectType::DEVICE).is_none());
    }

    #[test]
    fn instances_are_a_set() {
        let mut t = table();
        t.enable(ObjectType::SERVER, None).unwrap();
        t.add_instances(ObjectType::SERVER, &[2, 0, 2]).unwrap();
        t.add_instance(ObjectType::SERVER, 0).unwrap();

        let ids: Vec<_> = t.get(ObjectType::SERVER).unwrap().instances().collect();
        assert_eq!(ids, vec![0, 2]);

        assert!(t.remove_instance(ObjectType::SERVER, 2).unwrap());
        assert!(!t.remove_instance(ObjectType::SERVER, 2).unwrap());
    }

    #[test]
    fn links_follow_type_order() {
        let mut t = table();
        t.enable(ObjectType::DEVICE, None).unwrap();
        t.enable(ObjectType::SECURITY, None).unwrap();
        t.add_instance(ObjectType::DEVICE, 0).unwrap();

        let links = t.links();
        assert_eq!(links[0].path, ObjectPath::object(ObjectType::SECURITY));
        assert_eq!(links[1].path, ObjectPath::instance(ObjectType::DEVICE, 0));

        let rendered = link_format::format(&links);
        assert!(rendered.starts_with("</0>,</3/0>;r=\"0 1 2 3 6 7 8 9 10 11 13 14 15 16\""));
    }

    proptest! {
        #[test]
        fn prop_instances_track_set_model(ops in prop::collection::vec((any::<bool>(), 0u16..8), 0..64)) {
            let mut t = table();
            t.enable(ObjectType::SERVER, None).unwrap();
            let mut model = BTreeSet::new();

            for (add, id) in ops {
                if add {
                    t.add_instance(ObjectType::SERVER, id).unwrap();
                    model.insert(id);
                } else {
                    let removed = t.remove_instance(ObjectType::SERVER, id).unwrap();
                    prop_assert_eq!(removed, model.remove(&id));
                }
            }

            let ids: Vec<_> = t.get(ObjectType::SERVER).unwrap().instances().collect();
            prop_assert_eq!(ids, model.into_iter().collect::<Vec<_>>());
        }
    }
}
