//! Synthetic pack streams for tests

use std::io::Write;

use flate2::{write::ZlibEncoder, Compression};
use gix_object::Kind;

use super::entry::{EntryHeader, PackObjectType};
use crate::object::{digest, hex_to_raw};

pub(crate) struct PackBuilder {
    body: Vec<u8>,
    count: u32,
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Inverse of `parse_ofs_distance`
fn encode_ofs_distance(mut value: u64) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value != 0 {
        value -= 1;
        bytes.push(0x80 | (value & 0x7f) as u8);
        value >>= 7;
    }
    bytes.reverse();
    bytes
}

fn size_varint(mut value: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            bytes.push(byte);
            return bytes;
        }
        bytes.push(byte | 0x80);
    }
}

/// Delta that keeps the first `keep` bytes of `base` and appends `insert`
pub(crate) fn delta_copy_insert(base: &[u8], keep: u8, insert: &[u8]) -> Vec<u8> {
    let mut delta = size_varint(base.len());
    delta.extend(size_varint(keep as usize + insert.len()));
    delta.extend([0x90, keep]);
    delta.push(insert.len() as u8);
    delta.extend_from_slice(insert);
    delta
}

impl PackBuilder {
    pub(crate) fn new() -> Self {
        Self {
            body: Vec::new(),
            count: 0,
        }
    }

    fn next_offset(&self) -> usize {
        12 + self.body.len()
    }

    fn push_entry(&mut self, object_type: PackObjectType, size: usize, extra: &[u8], payload: &[u8]) -> usize {
        let offset = self.next_offset();
        self.body.extend(EntryHeader::encode(object_type, size));
        self.body.extend_from_slice(extra);
        self.body.extend(zlib(payload));
        self.count += 1;
        offset
    }

    /// Add an undeltified object, returning its pack offset
    pub(crate) fn add(&mut self, kind: Kind, data: &[u8]) -> usize {
        self.push_entry(PackObjectType::Base(kind), data.len(), &[], data)
    }

    pub(crate) fn add_with_declared_size(&mut self, kind: Kind, data: &[u8], declared: usize) -> usize {
        self.push_entry(PackObjectType::Base(kind), declared, &[], data)
    }

    pub(crate) fn add_ofs_delta(&mut self, base_offset: usize, delta: &[u8]) -> usize {
        let distance = (self.next_offset() - base_offset) as u64;
        self.push_entry(PackObjectType::OfsDelta, delta.len(), &encode_ofs_distance(distance), delta)
    }

    pub(crate) fn add_ref_delta(&mut self, base_id: &str, delta: &[u8]) -> usize {
        let raw = hex_to_raw(base_id).unwrap();
        self.push_entry(PackObjectType::RefDelta, delta.len(), &raw, delta)
    }

    pub(crate) fn build_without_trailer(&self) -> Vec<u8> {
        let mut pack = b"PACK".to_vec();
        pack.extend(2u32.to_be_bytes());
        pack.extend(self.count.to_be_bytes());
        pack.extend_from_slice(&self.body);
        pack
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut pack = self.build_without_trailer();
        let trailer = hex_to_raw(&digest(&pack)).unwrap();
        pack.extend(trailer);
        pack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ofs_distance_encoding() {
        assert_eq!(encode_ofs_distance(5), vec![0x05]);
        assert_eq!(encode_ofs_distance(256), vec![0x81, 0x00]);
        let (value, used) = crate::pack::entry::parse_ofs_distance(&encode_ofs_distance(1_000_000)).unwrap();
        assert_eq!((value, used), (1_000_000, 3));
    }
}
