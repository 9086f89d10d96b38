use gix_object::Kind;

use crate::error::{Error, Result};

const CONTINUE_FLAG: u8 = 0x80;
const TYPE_MASK: u8 = 0x70;
const TYPE_SHIFT: u8 = 4;
/// Size bits carried by the first header byte
const FIRST_SIZE_MASK: u8 = 0x0f;
const FIRST_SIZE_BITS: u32 = 4;
const VARINT_BITS: u32 = 7;

/// Object type code stored in bits 4-6 of an entry's first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackObjectType {
    /// Undeltified object carrying its full content
    Base(Kind),
    /// Delta against an earlier entry, addressed by pack offset
    OfsDelta,
    /// Delta against an object addressed by id
    RefDelta,
}

impl PackObjectType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Base(Kind::Commit)),
            2 => Some(Self::Base(Kind::Tree)),
            3 => Some(Self::Base(Kind::Blob)),
            4 => Some(Self::Base(Kind::Tag)),
            6 => Some(Self::OfsDelta),
            7 => Some(Self::RefDelta),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn code(self) -> u8 {
        match self {
            Self::Base(Kind::Commit) => 1,
            Self::Base(Kind::Tree) => 2,
            Self::Base(Kind::Blob) => 3,
            Self::Base(Kind::Tag) => 4,
            Self::OfsDelta => 6,
            Self::RefDelta => 7,
        }
    }
}

/// Decoded `(type, size)` header of one pack entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub object_type: PackObjectType,
    /// Inflated size of the payload (for deltas, of the delta itself)
    pub size: usize,
    /// Bytes the header occupied on the wire
    pub header_len: usize,
}

impl EntryHeader {
    /// Decode the header at the start of `input`.
    ///
    /// The first byte holds the type in bits 4-6 and size bits 0-3; each
    /// following byte adds 7 more size bits while the top bit is set.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let first = *input
            .first()
            .ok_or_else(|| Error::TruncatedPack("missing entry header".to_string()))?;
        let code = (first & TYPE_MASK) >> TYPE_SHIFT;
        let object_type = PackObjectType::from_code(code).ok_or_else(|| {
            Error::CorruptObject(format!("unknown pack object type {}", code))
        })?;

        let mut size = (first & FIRST_SIZE_MASK) as u64;
        let mut shift = FIRST_SIZE_BITS;
        let mut pos = 1;
        let mut byte = first;
        while byte & CONTINUE_FLAG != 0 {
            byte = *input
                .get(pos)
                .ok_or_else(|| Error::TruncatedPack("entry size runs past end of pack".to_string()))?;
            if shift > 57 {
                return Err(Error::CorruptObject("entry size does not fit in 64 bits".to_string()));
            }
            size |= ((byte & !CONTINUE_FLAG) as u64) << shift;
            shift += VARINT_BITS;
            pos += 1;
        }

        let size = usize::try_from(size)
            .map_err(|_| Error::CorruptObject(format!("entry size {} too large", size)))?;
        Ok(Self {
            object_type,
            size,
            header_len: pos,
        })
    }

    /// Encode a header; the inverse of [`EntryHeader::parse`]
    #[cfg(test)]
    pub fn encode(object_type: PackObjectType, size: usize) -> Vec<u8> {
        let mut size = size as u64;
        let mut first = (object_type.code() << TYPE_SHIFT) | (size as u8 & FIRST_SIZE_MASK);
        size >>= FIRST_SIZE_BITS;
        let mut out = Vec::new();
        if size != 0 {
            first |= CONTINUE_FLAG;
        }
        out.push(first);
        while size != 0 {
            let mut byte = (size as u8) & !CONTINUE_FLAG;
            size >>= VARINT_BITS;
            if size != 0 {
                byte |= CONTINUE_FLAG;
            }
            out.push(byte);
        }
        out
    }
}

/// Decode the negative base offset that follows an offset-delta header.
///
/// Bytes are most significant first, and every continuation adds one
/// before shifting so that each length has a distinct range.
/// Returns `(distance, bytes consumed)`.
pub fn parse_ofs_distance(input: &[u8]) -> Result<(u64, usize)> {
    let mut pos = 0;
    let mut value: u64 = 0;
    loop {
        let byte = *input
            .get(pos)
            .ok_or_else(|| Error::TruncatedPack("delta base offset runs past end of pack".to_string()))?;
        pos += 1;
        value = (value << VARINT_BITS) | (byte & !CONTINUE_FLAG) as u64;
        if byte & CONTINUE_FLAG == 0 {
            return Ok((value, pos));
        }
        if pos >= 9 {
            return Err(Error::CorruptObject("delta base offset too large".to_string()));
        }
        value += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_byte_header() {
        // blob (3), size 6
        let header = EntryHeader::parse(&[0x36, 0xff]).unwrap();
        assert_eq!(header.object_type, PackObjectType::Base(Kind::Blob));
        assert_eq!(header.size, 6);
        assert_eq!(header.header_len, 1);
    }

    #[test]
    fn test_multi_byte_header() {
        // commit, size 0b1_0010110_1010 = 0x96a: low nibble 0xa, then 0x16, then 0x01
        let header = EntryHeader::parse(&[0x9a, 0x96, 0x01]).unwrap();
        assert_eq!(header.object_type, PackObjectType::Base(Kind::Commit));
        assert_eq!(header.size, 0xa | (0x16 << 4) | (0x01 << 11));
        assert_eq!(header.header_len, 3);
    }

    #[test]
    fn test_encode_matches_parse() {
        for size in [0usize, 15, 16, 127, 128, 2_047, 2_048, 1 << 20, 123_456_789] {
            let bytes = EntryHeader::encode(PackObjectType::Base(Kind::Tree), size);
            let header = EntryHeader::parse(&bytes).unwrap();
            assert_eq!(header.size, size);
            assert_eq!(header.object_type, PackObjectType::Base(Kind::Tree));
            assert_eq!(header.header_len, bytes.len());
        }
    }

    #[test]
    fn test_truncated_and_unknown_headers() {
        assert!(matches!(EntryHeader::parse(&[]), Err(Error::TruncatedPack(_))));
        assert!(matches!(EntryHeader::parse(&[0xb5]), Err(Error::TruncatedPack(_))));
        // type 5 is reserved
        assert!(matches!(EntryHeader::parse(&[0x50]), Err(Error::CorruptObject(_))));
    }

    #[test]
    fn test_ofs_distance() {
        assert_eq!(parse_ofs_distance(&[0x05]).unwrap(), (5, 1));
        // [0x80 | 1, 0x00] = ((1 + 1) << 7) | 0
        assert_eq!(parse_ofs_distance(&[0x81, 0x00]).unwrap(), (256, 2));
        assert!(matches!(parse_ofs_distance(&[0x81]), Err(Error::TruncatedPack(_))));
    }
}
