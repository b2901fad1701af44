//! CoRE link-format registration payload.
//!
//! Each enabled object contributes either a bare `</obj>` link (no instances
//! provisioned) or one `</obj/inst>` link per instance. Instance links carry
//! the readable, writable and executable resource ids as space-separated
//! `r`, `w` and `e` attributes:
//!
//! ```text
//! </1/0>;r="0 1 2 3 5 6 7";w="1 2 3 5 6 7";e="4 8",</3/0>;r="0 1";e="4"
//! ```

use std::fmt::Write as _;

use crate::{
    error::LinkFormatError,
    types::{ObjectPath, ResourceId, parse_segment},
};

/// One link in a registration payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLink {
    /// Object or object-instance path.
    pub path: ObjectPath,
    /// Readable resource ids.
    pub readable: Vec<ResourceId>,
    /// Writable resource ids.
    pub writable: Vec<ResourceId>,
    /// Executable resource ids.
    pub executable: Vec<ResourceId>,
}

impl ObjectLink {
    /// Link with no resource attributes.
    pub fn bare(path: ObjectPath) -> Self {
        Self { path, readable: Vec::new(), writable: Vec::new(), executable: Vec::new() }
    }
}

/// Render links as a comma-separated link-format document.
pub fn format(links: &[ObjectLink]) -> String {
    let mut out = String::new();
    for (i, link) in links.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "<{}>", link.path);
        push_attribute(&mut out, "r", &link.readable);
        push_attribute(&mut out, "w", &link.writable);
        push_attribute(&mut out, "e", &link.executable);
    }
    out
}

fn push_attribute(out: &mut String, name: &str, ids: &[ResourceId]) {
    if ids.is_empty() {
        return;
    }
    let joined = ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
    let _ = write!(out, ";{name}=\"{joined}\"");
}

/// Parse a link-format document produced by [`format`].
///
/// Unknown attributes are ignored.
pub fn parse(text: &str) -> Result<Vec<ObjectLink>, LinkFormatError> {
    let mut links = Vec::new();

    for raw in text.split(',').map(str::trim).filter(|l| !l.is_empty()) {
        let mut parts = raw.split(';');
        let target = parts.next().unwrap_or_default();
        let path = target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .ok_or_else(|| LinkFormatError::MalformedLink { link: raw.to_owned() })?
            .parse::<ObjectPath>()?;

        let mut link = ObjectLink::bare(path);
        for attribute in parts {
            let Some((name, value)) = attribute.split_once('=') else {
                continue;
            };
            let slot = match name {
                "r" => &mut link.readable,
                "w" => &mut link.writable,
                "e" => &mut link.executable,
                _ => continue,
            };
            *slot = parse_resource_list(name, value)?;
        }
        links.push(link);
    }

    Ok(links)
}

fn parse_resource_list(name: &str, value: &str) -> Result<Vec<ResourceId>, LinkFormatError> {
    let invalid = || LinkFormatError::InvalidResourceList { attribute: name.to_owned() };
    value
        .trim_matches('"')
        .split_whitespace()
        .map(|id| parse_segment(id).ok_or_else(invalid))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ObjectType;

    fn sample() -> Vec<ObjectLink> {
        vec![
            ObjectLink {
                path: ObjectPath::instance(ObjectType::SERVER, 0),
                readable: vec![0, 1],
                writable: vec![1],
                executable: vec![4, 8],
            },
            ObjectLink::bare(ObjectPath::object(ObjectType::DEVICE)),
        ]
    }

    #[test]
    fn format_snapshot() {
        insta::assert_snapshot!(format(&sample()), @r#"</1/0>;r="0 1";w="1";e="4 8",</3>"#);
    }

    #[test]
    fn parse_reads_attributes() {
        let links = parse(r#"</1/0>;r="0 1";w="1";e="4 8", </3>;ct=11542"#).unwrap();
        assert_eq!(links, sample());
    }

    #[test]
    fn parse_rejects_unbracketed_target() {
        assert!(matches!(parse("/3/0"), Err(LinkFormatError::MalformedLink { .. })));
    }

    #[test]
    fn parse_rejects_bad_resource_list() {
        let err = parse(r#"</3/0>;r="0 x""#).unwrap_err();
        assert_eq!(err, LinkFormatError::InvalidResourceList { attribute: "r".to_owned() });
    }

    #[test]
    fn empty_document() {
        assert_eq!(format(&[]), "");
        assert!(parse("").unwrap().is_empty());
    }
}
