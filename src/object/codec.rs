//! Canonical loose object encoding: `"<kind> <size>\0<content>"`

use gix_object::Kind;

use super::hash::{digest, ObjectId};
use crate::error::{Error, Result};

/// Represents a Git object with its content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitObject {
    pub id: ObjectId,
    pub kind: Kind,
    pub data: Vec<u8>,
}

pub fn kind_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Commit => "commit",
        Kind::Tree => "tree",
        Kind::Blob => "blob",
        Kind::Tag => "tag",
    }
}

pub fn kind_from_name(name: &[u8]) -> Option<Kind> {
    match name {
        b"commit" => Some(Kind::Commit),
        b"tree" => Some(Kind::Tree),
        b"blob" => Some(Kind::Blob),
        b"tag" => Some(Kind::Tag),
        _ => None,
    }
}

/// `"<kind> <size>"` followed by a single NUL; content follows directly.
pub fn encode_header(kind: Kind, size: usize) -> Vec<u8> {
    format!("{} {}\0", kind_name(kind), size).into_bytes()
}

impl GitObject {
    /// Create a GitObject from raw object data (without header)
    pub fn from_raw(kind: Kind, data: Vec<u8>) -> Self {
        let mut loose = encode_header(kind, data.len());
        loose.extend_from_slice(&data);
        let id = digest(&loose);
        Self { id, kind, data }
    }

    /// Parse the loose format (with header: "type size\0data")
    pub fn from_loose_format(content: &[u8]) -> Result<Self> {
        let null_pos = content
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::MalformedObject("no NUL after object header".to_string()))?;
        let header = &content[..null_pos];

        let space_pos = header.iter().position(|&b| b == b' ').ok_or_else(|| {
            Error::MalformedObject(format!(
                "object header has no size: {:?}",
                String::from_utf8_lossy(header)
            ))
        })?;

        let kind = kind_from_name(&header[..space_pos]).ok_or_else(|| {
            Error::MalformedObject(format!(
                "unknown object type: {:?}",
                String::from_utf8_lossy(&header[..space_pos])
            ))
        })?;

        let size: usize = std::str::from_utf8(&header[space_pos + 1..])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                Error::MalformedObject(format!(
                    "invalid object size: {:?}",
                    String::from_utf8_lossy(&header[space_pos + 1..])
                ))
            })?;

        let data = &content[null_pos + 1..];
        if data.len() != size {
            return Err(Error::MalformedObject(format!(
                "header declares {} bytes but {} follow",
                size,
                data.len()
            )));
        }

        Ok(Self {
            id: digest(content),
            kind,
            data: data.to_vec(),
        })
    }

    /// Serialize to loose object format (with header)
    pub fn to_loose_format(&self) -> Vec<u8> {
        let mut result = encode_header(self.kind, self.data.len());
        result.extend_from_slice(&self.data);
        result
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}
