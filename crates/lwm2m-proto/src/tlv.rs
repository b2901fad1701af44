//! OMA-TLV value encoding (content format 11542).
//!
//! ## Entry layout
//!
//! ```text
//! type (1) | identifier (1-2) | length (0-3) | value
//!
//! type bits 7-6: identifier kind
//!   00 object instance, 01 resource instance,
//!   10 multiple resource, 11 resource with value
//! type bit 5:    identifier is 16 bits
//! type bits 4-3: length field size (0 = length in bits 2-0)
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    definition::{ResourceDefinition, ResourceType},
    error::TlvError,
    types::ResourceId,
    value::Value,
};

/// Content-Format number for OMA-TLV.
pub const CONTENT_FORMAT_TLV: u16 = 11542;

/// Largest value length representable with a 24-bit length field.
const MAX_VALUE_LEN: usize = 0x00FF_FFFF;

/// Identifier kind of a TLV entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Object instance containing resources.
    ObjectInstance = 0b00,
    /// One instance of a multi-instance resource.
    ResourceInstance = 0b01,
    /// Multi-instance resource containing resource instances.
    MultipleResource = 0b10,
    /// Single-valued resource.
    ResourceWithValue = 0b11,
}

impl EntryKind {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::ObjectInstance,
            0b01 => Self::ResourceInstance,
            0b10 => Self::MultipleResource,
            _ => Self::ResourceWithValue,
        }
    }
}

/// A decoded TLV entry. `value` holds nested entries for container kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvEntry {
    /// Identifier kind.
    pub kind: EntryKind,
    /// Identifier.
    pub id: u16,
    /// Raw value bytes.
    pub value: Bytes,
}

/// Encode a resource value.
///
/// Single-valued resources become one `ResourceWithValue` entry. Multi-valued
/// resources become a `MultipleResource` entry wrapping one
/// `ResourceInstance` per element; a scalar value for a multi-valued
/// resource is treated as instance 0.
pub fn encode(resource_id: ResourceId, multiple: bool, value: &Value) -> Result<Bytes, TlvError> {
    let mut buf = BytesMut::new();
    encode_into(&mut buf, resource_id, multiple, value)?;
    Ok(buf.freeze())
}

/// Encode several resources of one object instance back to back.
pub fn encode_resources<'a, I>(resources: I) -> Result<Bytes, TlvError>
where
    I: IntoIterator<Item = (ResourceId, bool, &'a Value)>,
{
    let mut buf = BytesMut::new();
    for (id, multiple, value) in resources {
        encode_into(&mut buf, id, multiple, value)?;
    }
    Ok(buf.freeze())
}

fn encode_into(
    buf: &mut BytesMut,
    resource_id: ResourceId,
    multiple: bool,
    value: &Value,
) -> Result<(), TlvError> {
    match (multiple, value) {
        (true, Value::Multiple(items)) => {
            let mut inner = BytesMut::new();
            for (instance, item) in items {
                write_entry(&mut inner, EntryKind::ResourceInstance, *instance, &scalar_bytes(item)?)?;
            }
            write_entry(buf, EntryKind::MultipleResource, resource_id, &inner)
        },
        (true, scalar) => {
            let mut inner = BytesMut::new();
            write_entry(&mut inner, EntryKind::ResourceInstance, 0, &scalar_bytes(scalar)?)?;
            write_entry(buf, EntryKind::MultipleResource, resource_id, &inner)
        },
        (false, scalar) => {
            write_entry(buf, EntryKind::ResourceWithValue, resource_id, &scalar_bytes(scalar)?)
        },
    }
}

fn write_entry(buf: &mut BytesMut, kind: EntryKind, id: u16, value: &[u8]) -> Result<(), TlvError> {
    let len = value.len();
    if len > MAX_VALUE_LEN {
        return Err(TlvError::TooLarge { len });
    }

    let mut type_byte = (kind as u8) << 6;
    if id > 0xFF {
        type_byte |= 0b0010_0000;
    }

    let len_bytes = (len as u32).to_be_bytes();
    let length_field: &[u8] = match len {
        0..=7 => {
            type_byte |= len as u8;
            &[]
        },
        8..=0xFF => {
            type_byte |= 0b01 << 3;
            &len_bytes[3..]
        },
        0x100..=0xFFFF => {
            type_byte |= 0b10 << 3;
            &len_bytes[2..]
        },
        _ => {
            type_byte |= 0b11 << 3;
            &len_bytes[1..]
        },
    };

    buf.put_u8(type_byte);
    if id > 0xFF {
        buf.put_u16(id);
    } else {
        buf.put_u8(id as u8);
    }
    buf.put_slice(length_field);
    buf.put_slice(value);
    Ok(())
}

fn scalar_bytes(value: &Value) -> Result<Bytes, TlvError> {
    Ok(match value {
        Value::Empty => Bytes::new(),
        Value::String(s) => Bytes::copy_from_slice(s.as_bytes()),
        Value::Integer(v) | Value::Time(v) => integer_bytes(*v),
        Value::Float(v) => {
            #[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
            let narrow = f64::from(*v as f32) == *v;
            if narrow {
                Bytes::copy_from_slice(&(*v as f32).to_be_bytes())
            } else {
                Bytes::copy_from_slice(&v.to_be_bytes())
            }
        },
        Value::Boolean(b) => Bytes::copy_from_slice(&[u8::from(*b)]),
        Value::Opaque(b) => b.clone(),
        Value::Multiple(items) => {
            return Err(TlvError::InvalidValue { type_name: "multiple", len: items.len() });
        },
    })
}

/// Shortest big-endian two's complement form: 1, 2, 4 or 8 bytes.
fn integer_bytes(v: i64) -> Bytes {
    if let Ok(b) = i8::try_from(v) {
        Bytes::copy_from_slice(&b.to_be_bytes())
    } else if let Ok(s) = i16::try_from(v) {
        Bytes::copy_from_slice(&s.to_be_bytes())
    } else if let Ok(w) = i32::try_from(v) {
        Bytes::copy_from_slice(&w.to_be_bytes())
    } else {
        Bytes::copy_from_slice(&v.to_be_bytes())
    }
}

/// Split a payload into its top-level entries.
pub fn decode_entries(data: &[u8]) -> Result<Vec<TlvEntry>, TlvError> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let type_byte = data[pos];
        pos += 1;

        let kind = EntryKind::from_bits(type_byte >> 6);
        let id_len = if type_byte & 0b0010_0000 == 0 { 1 } else { 2 };
        let id_bytes = take(data, pos, id_len)?;
        let id = id_bytes.iter().fold(0u16, |acc, b| (acc << 8) | u16::from(*b));
        pos += id_len;

        let length_size = usize::from((type_byte >> 3) & 0b11);
        let len = if length_size == 0 {
            usize::from(type_byte & 0b111)
        } else {
            let len_bytes = take(data, pos, length_size)?;
            pos += length_size;
            len_bytes.iter().fold(0usize, |acc, b| (acc << 8) | usize::from(*b))
        };

        let value = take(data, pos, len)?;
        pos += len;

        entries.push(TlvEntry { kind, id, value: Bytes::copy_from_slice(value) });
    }

    Ok(entries)
}

fn take(data: &[u8], pos: usize, len: usize) -> Result<&[u8], TlvError> {
    let available = data.len().saturating_sub(pos);
    data.get(pos..pos + len).ok_or(TlvError::Truncated { needed: len, available })
}

/// Decode the value of the resource described by `definition`.
///
/// The payload must contain exactly the entry for that resource.
pub fn decode(data: &[u8], definition: &ResourceDefinition) -> Result<Value, TlvError> {
    let entries = decode_entries(data)?;
    let entry = match entries.as_slice() {
        [entry] => entry,
        [] => return Err(TlvError::Truncated { needed: 2, available: data.len() }),
        [_, rest @ ..] => return Err(TlvError::TrailingEntries { count: rest.len() }),
    };

    if entry.id != definition.id {
        return Err(TlvError::ResourceMismatch { expected: definition.id, actual: entry.id });
    }

    match (definition.multiple, entry.kind) {
        (false, EntryKind::ResourceWithValue) => {
            decode_scalar(definition.resource_type, &entry.value)
        },
        (true, EntryKind::MultipleResource) => {
            let mut items = Vec::new();
            for inner in decode_entries(&entry.value)? {
                if inner.kind != EntryKind::ResourceInstance {
                    return Err(TlvError::UnexpectedKind {
                        kind: inner.kind as u8,
                        resource_id: definition.id,
                    });
                }
                items.push((inner.id, decode_scalar(definition.resource_type, &inner.value)?));
            }
            Ok(Value::Multiple(items))
        },
        (_, kind) => Err(TlvError::UnexpectedKind { kind: kind as u8, resource_id: definition.id }),
    }
}

/// Decode a scalar value of the given type.
pub fn decode_scalar(resource_type: ResourceType, bytes: &[u8]) -> Result<Value, TlvError> {
    let invalid = || TlvError::InvalidValue { type_name: resource_type.name(), len: bytes.len() };

    match resource_type {
        ResourceType::String => {
            String::from_utf8(bytes.to_vec()).map(Value::String).map_err(|_| invalid())
        },
        ResourceType::Integer => decode_integer(bytes).map(Value::Integer).ok_or_else(invalid),
        ResourceType::Time => decode_integer(bytes).map(Value::Time).ok_or_else(invalid),
        ResourceType::Float => match bytes.len() {
            4 => {
                let raw: [u8; 4] = bytes.try_into().map_err(|_| invalid())?;
                Ok(Value::Float(f64::from(f32::from_be_bytes(raw))))
            },
            8 => {
                let raw: [u8; 8] = bytes.try_into().map_err(|_| invalid())?;
                Ok(Value::Float(f64::from_be_bytes(raw)))
            },
            _ => Err(invalid()),
        },
        ResourceType::Boolean => match bytes {
            [0] => Ok(Value::Boolean(false)),
            [1] => Ok(Value::Boolean(true)),
            _ => Err(invalid()),
        },
        ResourceType::Opaque => Ok(Value::Opaque(Bytes::copy_from_slice(bytes))),
        ResourceType::None => Ok(Value::Empty),
    }
}

fn decode_integer(bytes: &[u8]) -> Option<i64> {
    match bytes.len() {
        1 => Some(i64::from(i8::from_be_bytes(bytes.try_into().ok()?))),
        2 => Some(i64::from(i16::from_be_bytes(bytes.try_into().ok()?))),
        4 => Some(i64::from(i32::from_be_bytes(bytes.try_into().ok()?))),
        8 => Some(i64::from_be_bytes(bytes.try_into().ok()?)),
        _ => None,
    }
}
