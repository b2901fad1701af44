//! Identifiers for the `/object/instance/resource` hierarchy.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::PathError;

/// Object instance identifier.
pub type InstanceId = u16;

/// Resource identifier within an object definition.
pub type ResourceId = u16;

/// Managed-object class identifier from the OMA object catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectType(pub u16);

impl ObjectType {
    /// LWM2M Security (0).
    pub const SECURITY: Self = Self(0);
    /// LWM2M Server (1).
    pub const SERVER: Self = Self(1);
    /// Access Control (2).
    pub const ACCESS_CONTROL: Self = Self(2);
    /// Device (3).
    pub const DEVICE: Self = Self(3);
    /// Connectivity Monitoring (4).
    pub const CONNECTIVITY_MONITORING: Self = Self(4);
    /// Firmware Update (5).
    pub const FIRMWARE_UPDATE: Self = Self(5);
    /// Location (6).
    pub const LOCATION: Self = Self(6);
    /// Connectivity Statistics (7).
    pub const CONNECTIVITY_STATISTICS: Self = Self(7);

    /// Numeric identifier.
    pub fn id(self) -> u16 {
        self.0
    }
}

impl From<u16> for ObjectType {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse one path segment as a decimal `u16`.
///
/// Only ASCII digits are accepted; signs and whitespace are rejected.
pub fn parse_segment(segment: &str) -> Option<u16> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Parsed `/object[/instance[/resource]]` path.
///
/// Each segment is a decimal integer. Trailing segments are optional, but a
/// resource cannot be addressed without an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    /// Object type segment.
    pub object: ObjectType,
    /// Instance segment, if present.
    pub instance: Option<InstanceId>,
    /// Resource segment, if present.
    pub resource: Option<ResourceId>,
}

impl ObjectPath {
    /// Path addressing a whole object.
    pub fn object(object: ObjectType) -> Self {
        Self { object, instance: None, resource: None }
    }

    /// Path addressing an object instance.
    pub fn instance(object: ObjectType, instance: InstanceId) -> Self {
        Self { object, instance: Some(instance), resource: None }
    }

    /// Path addressing a single resource.
    pub fn resource(object: ObjectType, instance: InstanceId, resource: ResourceId) -> Self {
        Self { object, instance: Some(instance), resource: Some(resource) }
    }

    /// Parse from already split path segments.
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Result<Self, PathError> {
        let parse = |s: &S| -> Result<u16, PathError> {
            let s = s.as_ref();
            parse_segment(s).ok_or_else(|| PathError::InvalidSegment { segment: s.to_owned() })
        };

        match segments {
            [] => Err(PathError::Empty),
            [o] => Ok(Self::object(ObjectType(parse(o)?))),
            [o, i] => Ok(Self::instance(ObjectType(parse(o)?), parse(i)?)),
            [o, i, r] => Ok(Self::resource(ObjectType(parse(o)?), parse(i)?, parse(r)?)),
            _ => Err(PathError::TooDeep { depth: segments.len() }),
        }
    }
}

impl FromStr for ObjectPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split('/').filter(|seg| !seg.is_empty()).collect();
        Self::from_segments(&segments)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.object)?;
        if let Some(instance) = self.instance {
            write!(f, "/{instance}")?;
        }
        if let Some(resource) = self.resource {
            write!(f, "/{resource}")?;
        }
        Ok(())
    }
}
