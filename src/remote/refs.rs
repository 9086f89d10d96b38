use super::pktline::{self, Packet};
use crate::error::{Error, Result};
use crate::object::{is_valid_object_id, ObjectId};

const PREFERRED_BRANCH: &str = "refs/heads/master";
const HEAD: &str = "HEAD";

/// One `<id> <name>` line of a ref advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedRef {
    pub id: ObjectId,
    pub name: String,
    /// Capabilities are only sent after the first ref
    pub capabilities: Vec<String>,
}

fn parse_ref_line(line: &[u8]) -> Option<AdvertisedRef> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let (reference, capabilities) = match line.iter().position(|&b| b == 0) {
        Some(nul) => (&line[..nul], &line[nul + 1..]),
        None => (line, &[][..]),
    };
    let reference = std::str::from_utf8(reference).ok()?;
    let (id, name) = reference.split_once([' ', '\t'])?;
    if !is_valid_object_id(id) {
        return None;
    }
    Some(AdvertisedRef {
        id: id.to_ascii_lowercase(),
        name: name.trim().to_string(),
        capabilities: String::from_utf8_lossy(capabilities)
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    })
}

/// Parse the body of `info/refs?service=git-upload-pack`.
///
/// Falls back to plain newline-separated lines when the body is not
/// pkt-line framed (as served by dumb HTTP servers).
pub fn parse_advertisement(body: &[u8]) -> Result<Vec<AdvertisedRef>> {
    let refs = match pktline::parse(body) {
        Ok((packets, _)) => packets
            .into_iter()
            .filter_map(|packet| match packet {
                Packet::Data(data) if !data.starts_with(b"# service=") => parse_ref_line(data),
                _ => None,
            })
            .collect(),
        Err(e) => {
            tracing::debug!("ref advertisement is not pkt-line framed ({}), reading plain lines", e);
            body.split(|&b| b == b'\n').filter_map(parse_ref_line).collect()
        }
    };
    Ok(refs)
}

/// The commit the remote's `master` branch points at, or failing that, `HEAD`.
pub fn extract_head_commit_hash(body: &[u8]) -> Result<ObjectId> {
    let refs = parse_advertisement(body)?;
    if let Some(first) = refs.first() {
        tracing::debug!("remote capabilities: {}", first.capabilities.join(" "));
    }
    for advertised in &refs {
        tracing::debug!("remote advertises {} {}", advertised.id, advertised.name);
    }

    refs.iter()
        .find(|r| r.name == PREFERRED_BRANCH)
        .or_else(|| refs.iter().find(|r| r.name == HEAD))
        .map(|r| r.id.clone())
        .ok_or_else(|| {
            Error::RefNotFound(format!(
                "neither {} nor {} in {} advertised refs",
                PREFERRED_BRANCH,
                HEAD,
                refs.len()
            ))
        })
}
