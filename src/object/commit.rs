use gix_object::Kind;

use super::codec::GitObject;
use super::hash::{is_valid_object_id, ObjectId};
use crate::error::{Error, Result};

/// Identity line used for author and committer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch, UTC
    pub timestamp: i64,
    /// Offset as written by git, e.g. `+0000` or `-0700`
    pub tz_offset: String,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>, timestamp: i64, tz_offset: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timestamp,
            tz_offset: tz_offset.into(),
        }
    }

    /// Signature stamped with the current time
    pub fn now(name: impl Into<String>, email: impl Into<String>, tz_offset: impl Into<String>) -> Self {
        Self::new(name, email, chrono::Utc::now().timestamp(), tz_offset)
    }

    fn encode(&self) -> String {
        format!("{} <{}> {} {}", self.name, self.email, self.timestamp, self.tz_offset)
    }

    fn parse(value: &str) -> Result<Self> {
        let malformed = || Error::MalformedObject(format!("invalid signature: {:?}", value));

        let (ident, when) = value.rsplit_once('>').ok_or_else(malformed)?;
        let (name, email) = ident.split_once('<').ok_or_else(malformed)?;
        let mut when = when.split_whitespace();
        let timestamp = when
            .next()
            .and_then(|ts| ts.parse().ok())
            .ok_or_else(malformed)?;
        let tz_offset = when.next().unwrap_or("+0000");

        Ok(Self::new(name.trim_end(), email, timestamp, tz_offset))
    }
}

/// A commit with at most one parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: ObjectId,
    pub parent: Option<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = format!("tree {}\n", self.tree);
        if let Some(parent) = &self.parent {
            body.push_str(&format!("parent {}\n", parent));
        }
        body.push_str(&format!("author {}\n", self.author.encode()));
        body.push_str(&format!("committer {}\n", self.committer.encode()));
        body.push('\n');
        body.push_str(&self.message);
        body.push('\n');
        body.into_bytes()
    }

    pub fn to_object(&self) -> GitObject {
        GitObject::from_raw(Kind::Commit, self.encode())
    }

    /// Parse commit content.
    ///
    /// Headers other than tree/parent/author/committer (gpgsig, encoding,
    /// mergetag) are skipped along with their continuation lines. Only the
    /// first parent of a merge commit is kept. Identities and the message
    /// are not required to be UTF-8; invalid sequences are replaced.
    pub fn parse(content: &[u8]) -> Result<Self> {
        let (headers, message) = match content.windows(2).position(|pair| pair == b"\n\n") {
            Some(split) => (&content[..split], &content[split + 2..]),
            None => (content, &[][..]),
        };

        let mut tree = None;
        let mut parent = None;
        let mut author = None;
        let mut committer = None;

        for line in headers.split(|&b| b == b'\n') {
            if line.starts_with(b" ") {
                continue;
            }
            let (key, value) = match line.iter().position(|&b| b == b' ') {
                Some(space) => (&line[..space], &line[space + 1..]),
                None => (line, &[][..]),
            };
            match key {
                b"tree" => tree = Some(header_id(value)?),
                b"parent" if parent.is_none() => parent = Some(header_id(value)?),
                b"parent" => tracing::debug!("ignoring additional parent {}", String::from_utf8_lossy(value)),
                b"author" => author = Some(Signature::parse(&String::from_utf8_lossy(value))?),
                b"committer" => committer = Some(Signature::parse(&String::from_utf8_lossy(value))?),
                _ => {}
            }
        }

        let tree = tree.ok_or_else(|| Error::MalformedObject("commit has no tree header".to_string()))?;
        let author = author.ok_or_else(|| Error::MalformedObject("commit has no author".to_string()))?;
        let committer = committer.unwrap_or_else(|| author.clone());
        let message = message.strip_suffix(b"\n").unwrap_or(message);

        Ok(Self {
            tree,
            parent,
            author,
            committer,
            message: String::from_utf8_lossy(message).into_owned(),
        })
    }
}

/// A `tree` or `parent` header value, which must be a hex object id
fn header_id(value: &[u8]) -> Result<ObjectId> {
    std::str::from_utf8(value)
        .ok()
        .filter(|id| is_valid_object_id(id))
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| {
            Error::MalformedObject(format!(
                "invalid commit header id: {:?}",
                String::from_utf8_lossy(value)
            ))
        })
}
