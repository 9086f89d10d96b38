use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// Git SHA-1 object identifier (40 lowercase hex characters)
pub type ObjectId = String;

/// Length of a binary SHA-1 digest
pub const RAW_HASH_LEN: usize = 20;

const HEX_HASH_LEN: usize = RAW_HASH_LEN * 2;

/// SHA-1 of `bytes` rendered as lowercase hex.
///
/// Object ids are always computed over the full loose encoding
/// (header included), never over the content alone.
pub fn digest(bytes: &[u8]) -> ObjectId {
    hex::encode(Sha1::digest(bytes))
}

pub fn is_valid_object_id(id: &str) -> bool {
    id.len() == HEX_HASH_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Convert a 40 character hex id to its 20 raw bytes
pub fn hex_to_raw(id: &str) -> Result<[u8; RAW_HASH_LEN]> {
    if !is_valid_object_id(id) {
        return Err(Error::MalformedObject(format!("invalid object id: {:?}", id)));
    }
    let mut raw = [0u8; RAW_HASH_LEN];
    hex::decode_to_slice(id, &mut raw)
        .map_err(|e| Error::MalformedObject(format!("invalid object id {:?}: {}", id, e)))?;
    Ok(raw)
}

pub fn raw_to_hex(raw: &[u8]) -> ObjectId {
    hex::encode(raw)
}
