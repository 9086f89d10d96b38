use std::borrow::Cow;

use gix_object::Kind;

use super::codec::GitObject;
use super::hash::{hex_to_raw, is_valid_object_id, raw_to_hex, ObjectId, RAW_HASH_LEN};
use crate::error::{Error, Result};

pub const MODE_TREE: &str = "40000";
pub const MODE_FILE: &str = "100644";
pub const MODE_EXECUTABLE: &str = "100755";
pub const MODE_SYMLINK: &str = "120000";
pub const MODE_GITLINK: &str = "160000";

/// One `(mode, name, id)` row of a tree object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Textual octal mode without leading zeros, e.g. `100644` or `40000`
    pub mode: String,
    /// Single path segment, raw bytes as git stores them
    pub name: Vec<u8>,
    pub id: ObjectId,
}

impl TreeEntry {
    pub fn new(mode: impl Into<String>, name: impl Into<Vec<u8>>, id: impl Into<String>) -> Result<Self> {
        let entry = Self {
            mode: mode.into(),
            name: name.into(),
            id: id.into(),
        };
        if entry.mode.is_empty() || !entry.mode.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            return Err(Error::MalformedObject(format!("invalid tree entry mode: {:?}", entry.mode)));
        }
        if entry.name.is_empty() || entry.name.contains(&b'/') || entry.name.contains(&0) {
            return Err(Error::MalformedObject(format!(
                "invalid tree entry name: {:?}",
                entry.display_name()
            )));
        }
        if !is_valid_object_id(&entry.id) {
            return Err(Error::MalformedObject(format!("invalid tree entry id: {:?}", entry.id)));
        }
        Ok(entry)
    }

    pub fn is_tree(&self) -> bool {
        self.mode == MODE_TREE
    }

    /// Name for messages and listings; invalid UTF-8 is replaced
    pub fn display_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Kind of the object this entry points at
    pub fn kind(&self) -> Kind {
        match self.mode.as_str() {
            MODE_TREE => Kind::Tree,
            MODE_GITLINK => Kind::Commit,
            _ => Kind::Blob,
        }
    }
}

/// A tree's entries, kept in byte-wise ascending name order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree from entries in any order. Duplicate names are rejected.
    pub fn new(mut entries: Vec<TreeEntry>) -> Result<Self> {
        // Plain byte order; no trailing-slash adjustment for subtrees
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].name == pair[1].name) {
            return Err(Error::MalformedObject(format!(
                "duplicate tree entry name: {:?}",
                pair[0].display_name()
            )));
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Serialize as `mode SP name NUL raw-id` rows
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        for entry in &self.entries {
            content.extend_from_slice(entry.mode.as_bytes());
            content.push(b' ');
            content.extend_from_slice(&entry.name);
            content.push(0);
            content.extend_from_slice(&hex_to_raw(&entry.id)?);
        }
        Ok(content)
    }

    /// Parse tree content. Entry order is kept exactly as stored.
    pub fn decode(content: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < content.len() {
            let space = content[pos..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| Error::TruncatedTree(format!("unterminated mode at byte {}", pos)))?;
            let mode = &content[pos..pos + space];
            pos += space + 1;

            let nul = content[pos..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::TruncatedTree(format!("unterminated name at byte {}", pos)))?;
            let name = &content[pos..pos + nul];
            pos += nul + 1;

            if content.len() - pos < RAW_HASH_LEN {
                return Err(Error::TruncatedTree(format!(
                    "entry {:?} has {} of {} hash bytes",
                    String::from_utf8_lossy(name),
                    content.len() - pos,
                    RAW_HASH_LEN
                )));
            }
            let id = raw_to_hex(&content[pos..pos + RAW_HASH_LEN]);
            pos += RAW_HASH_LEN;

            let mode = std::str::from_utf8(mode)
                .map_err(|_| Error::MalformedObject("tree entry mode is not ASCII".to_string()))?;
            entries.push(TreeEntry::new(mode, name, id)?);
        }

        Ok(Self { entries })
    }

    pub fn to_object(&self) -> Result<GitObject> {
        Ok(GitObject::from_raw(Kind::Tree, self.encode()?))
    }
}
