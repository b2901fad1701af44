//! An enabled object type.

use std::{collections::BTreeSet, fmt, sync::Arc};

use lwm2m_proto::{InstanceId, ObjectDefinition, ObjectLink, ObjectPath, ObjectType, Operations};

use crate::enabler::SharedEnabler;

/// Object type enabled on the client.
///
/// Holds the registry definition, the application enabler (if one has been
/// configured yet) and the set of provisioned instance ids.
pub struct Object {
    object_type: ObjectType,
    definition: Arc<ObjectDefinition>,
    enabler: Option<SharedEnabler>,
    instances: BTreeSet<InstanceId>,
}

impl Object {
    /// New object with no instances.
    pub fn new(definition: Arc<ObjectDefinition>, enabler: Option<SharedEnabler>) -> Self {
        Self { object_type: definition.object_type, definition, enabler, instances: BTreeSet::new() }
    }

    /// Object type.
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Registry definition.
    pub fn definition(&self) -> &Arc<ObjectDefinition> {
        &self.definition
    }

    /// Configured enabler, if any.
    pub fn enabler(&self) -> Option<&SharedEnabler> {
        self.enabler.as_ref()
    }

    /// Replace the enabler.
    pub fn set_enabler(&mut self, enabler: SharedEnabler) {
        self.enabler = Some(enabler);
    }

    /// Provisioned instance ids in ascending order.
    pub fn instances(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.instances.iter().copied()
    }

    /// Whether `instance` is provisioned.
    pub fn has_instance(&self, instance: InstanceId) -> bool {
        self.instances.contains(&instance)
    }

    /// Record `instance`. Returns false if it was already present.
    pub fn add_instance(&mut self, instance: InstanceId) -> bool {
        self.instances.insert(instance)
    }

    /// Forget `instance`. Returns false if it was not present.
    pub fn remove_instance(&mut self, instance: InstanceId) -> bool {
        self.instances.remove(&instance)
    }

    /// Registration links for this object.
    ///
    /// One link per instance listing the readable, writable and executable
    /// resources, or a single bare object link when nothing is provisioned.
    pub fn links(&self) -> Vec<ObjectLink> {
        if self.instances.is_empty() {
            return vec![ObjectLink::bare(ObjectPath::object(self.object_type))];
        }

        let readable: Vec<_> = self.definition.resource_ids_with(Operations::READ).collect();
        let writable: Vec<_> = self.definition.resource_ids_with(Operations::WRITE).collect();
        let executable: Vec<_> = self.definition.resource_ids_with(Operations::EXECUTE).collect();

        self.instances
            .iter()
            .map(|&instance| ObjectLink {
                path: ObjectPath::instance(self.object_type, instance),
                readable: readable.clone(),
                writable: writable.clone(),
                executable: executable.clone(),
            })
            .collect()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("object_type", &self.object_type)
            .field("name", &self.definition.name)
            .field("has_enabler", &self.enabler.is_some())
            .field("instances", &self.instances)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lwm2m_proto::{OmaRegistry, Registry};

    use super::*;
    use crate::enabler::NullEnabler;

    fn device() -> Object {
        let definition = OmaRegistry::new().definition(ObjectType::DEVICE).unwrap();
        Object::new(definition, Some(Arc::new(NullEnabler)))
    }

    #[test]
    fn instance_set_has_no_duplicates() {
        let mut object = device();
        assert!(object.add_instance(0));
        assert!(!object.add_instance(0));
        assert!(object.add_instance(2));
        assert_eq!(object.instances().collect::<Vec<_>>(), vec![0, 2]);

        assert!(object.remove_instance(0));
        assert!(!object.remove_instance(0));
        assert!(!object.has_instance(0));
    }

    #[test]
    fn bare_link_without_instances() {
        let object = device();
        assert_eq!(object.links(), vec![ObjectLink::bare(ObjectPath::object(ObjectType::DEVICE))]);
    }

    #[test]
    fn instance_links_list_resource_access() {
        let mut object = device();
        object.add_instance(0);

        let links = object.links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].path, ObjectPath::instance(ObjectType::DEVICE, 0));
        assert!(links[0].executable.contains(&4));
        assert!(links[0].writable.contains(&13));
        assert!(links[0].readable.contains(&0));
        assert!(!links[0].readable.contains(&4));
    }
}
