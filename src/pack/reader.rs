use std::{collections::HashMap, fmt};

use flate2::{Decompress, FlushDecompress, Status};
use indicatif::{ProgressBar, ProgressStyle};

use super::delta::apply_delta;
use super::entry::{parse_ofs_distance, EntryHeader, PackObjectType};
use crate::error::{Error, Result};
use crate::object::{digest, raw_to_hex, GitObject, Kind, ObjectId, RAW_HASH_LEN};
use crate::storage::ObjectStore;

const PACK_SIGNATURE: &[u8; 4] = b"PACK";
const PACK_HEADER_LEN: usize = 12;
const MAX_PREALLOC: usize = 1 << 24;
const INFLATE_CHUNK: usize = 32 * 1024;
/// Packs with more objects than this get a progress bar
const PROGRESS_THRESHOLD: u32 = 100;

/// What a call to [`PackReader::unpack`] stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackSummary {
    /// Informational; versions 2 and 3 share the entry format
    pub version: u32,
    pub object_count: u32,
    /// Ids and kinds in the order they were stored
    pub objects: Vec<(ObjectId, Kind)>,
}

#[derive(Debug, Clone)]
enum DeltaBase {
    Offset(usize),
    Id(ObjectId),
}

impl fmt::Display for DeltaBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaBase::Offset(offset) => write!(f, "entry at pack offset {}", offset),
            DeltaBase::Id(id) => write!(f, "{}", id),
        }
    }
}

/// A delta whose base had not been stored yet when it was read
struct PendingDelta {
    offset: usize,
    base: DeltaBase,
    delta: Vec<u8>,
}

#[derive(Default)]
struct UnpackState {
    by_offset: HashMap<usize, ObjectId>,
    objects: Vec<(ObjectId, Kind)>,
    pending: Vec<PendingDelta>,
}

/// Find the start of the pack inside an upload-pack response
/// (after the `NAK` line and any other pkt-line preamble).
pub fn locate_pack(response: &[u8]) -> Result<&[u8]> {
    response
        .windows(PACK_SIGNATURE.len())
        .position(|window| window == PACK_SIGNATURE)
        .map(|start| &response[start..])
        .ok_or(Error::InvalidPackSignature)
}

/// Decodes pack streams into loose objects
pub struct PackReader<'a, S> {
    store: &'a S,
}

impl<'a, S: ObjectStore> PackReader<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Unpack a raw upload-pack response, skipping everything before `PACK`
    pub fn unpack_response(&self, response: &[u8]) -> Result<UnpackSummary> {
        self.unpack(locate_pack(response)?)
    }

    /// Unpack a buffer that starts with the pack signature.
    ///
    /// The whole pack is aborted on the first bad entry: once one entry
    /// is misread the cursor can no longer find the ones after it.
    pub fn unpack(&self, pack: &[u8]) -> Result<UnpackSummary> {
        if pack.len() < PACK_SIGNATURE.len() || &pack[..PACK_SIGNATURE.len()] != PACK_SIGNATURE {
            return Err(Error::InvalidPackSignature);
        }
        if pack.len() < PACK_HEADER_LEN {
            return Err(Error::TruncatedPack(format!(
                "{} byte pack is shorter than its header",
                pack.len()
            )));
        }
        let version = read_u32(&pack[4..8]);
        let object_count = read_u32(&pack[8..12]);
        if version != 2 && version != 3 {
            tracing::warn!("unexpected pack version {}, decoding as version 2", version);
        }
        tracing::info!("unpacking {} objects (pack version {})", object_count, version);

        let progress = progress_bar(object_count);
        let mut state = UnpackState::default();
        let mut pos = PACK_HEADER_LEN;

        for index in 0..object_count {
            let offset = pos;
            let header = EntryHeader::parse(&pack[pos..]).map_err(|e| at_entry(e, index, offset))?;
            pos += header.header_len;

            let base = match header.object_type {
                PackObjectType::Base(_) => None,
                PackObjectType::OfsDelta => {
                    let (distance, used) =
                        parse_ofs_distance(&pack[pos..]).map_err(|e| at_entry(e, index, offset))?;
                    pos += used;
                    let base_offset = usize::try_from(distance)
                        .ok()
                        .and_then(|distance| offset.checked_sub(distance))
                        .filter(|&base| base >= PACK_HEADER_LEN)
                        .ok_or_else(|| {
                            Error::CorruptObject(format!(
                                "entry {} at offset {}: delta base is {} bytes before the pack",
                                index, offset, distance
                            ))
                        })?;
                    Some(DeltaBase::Offset(base_offset))
                }
                PackObjectType::RefDelta => {
                    let raw = pack.get(pos..pos + RAW_HASH_LEN).ok_or_else(|| {
                        Error::TruncatedPack(format!("entry {} at offset {}: missing base id", index, offset))
                    })?;
                    pos += RAW_HASH_LEN;
                    Some(DeltaBase::Id(raw_to_hex(raw)))
                }
            };

            let (payload, consumed) =
                inflate_entry(&pack[pos..], header.size).map_err(|e| at_entry(e, index, offset))?;
            pos += consumed;

            match (header.object_type, base) {
                (PackObjectType::Base(kind), _) => {
                    self.record(&mut state, offset, kind, payload)?;
                }
                (_, Some(base)) => match self.resolve_base(&state, &base)? {
                    Some(base_object) => {
                        let data = apply_delta(&base_object.data, &payload)?;
                        self.record(&mut state, offset, base_object.kind, data)?;
                    }
                    None => {
                        tracing::debug!("deferring delta at offset {} until {} is available", offset, base);
                        state.pending.push(PendingDelta {
                            offset,
                            base,
                            delta: payload,
                        });
                    }
                },
                (_, None) => {
                    return Err(Error::CorruptObject(format!(
                        "entry {} at offset {}: delta without a base",
                        index, offset
                    )))
                }
            }

            if let Some(bar) = &progress {
                bar.inc(1);
            }
        }

        self.resolve_pending(&mut state)?;
        verify_trailer(pack, pos, object_count)?;

        if let Some(bar) = &progress {
            bar.finish_and_clear();
        }
        tracing::info!("stored {} objects", state.objects.len());

        Ok(UnpackSummary {
            version,
            object_count,
            objects: state.objects,
        })
    }

    fn record(&self, state: &mut UnpackState, offset: usize, kind: Kind, data: Vec<u8>) -> Result<()> {
        let id = self.store.put_object(&GitObject::from_raw(kind, data))?;
        tracing::debug!("offset {}: {} {}", offset, crate::object::kind_name(kind), id);
        state.by_offset.insert(offset, id.clone());
        state.objects.push((id, kind));
        Ok(())
    }

    fn resolve_base(&self, state: &UnpackState, base: &DeltaBase) -> Result<Option<GitObject>> {
        let id = match base {
            DeltaBase::Offset(offset) => match state.by_offset.get(offset) {
                Some(id) => id,
                None => return Ok(None),
            },
            DeltaBase::Id(id) => {
                if !self.store.contains(id)? {
                    return Ok(None);
                }
                id
            }
        };
        self.store.get(id).map(Some)
    }

    /// Retry deferred deltas until every one is resolved or no progress is made
    fn resolve_pending(&self, state: &mut UnpackState) -> Result<()> {
        while !state.pending.is_empty() {
            let waiting = std::mem::take(&mut state.pending);
            let before = waiting.len();

            for pending in waiting {
                match self.resolve_base(state, &pending.base)? {
                    Some(base_object) => {
                        let data = apply_delta(&base_object.data, &pending.delta)?;
                        self.record(state, pending.offset, base_object.kind, data)?;
                    }
                    None => state.pending.push(pending),
                }
            }

            if state.pending.len() == before {
                let missing = &state.pending[0];
                return Err(Error::DeltaBaseNotFound(format!(
                    "{} (delta at offset {})",
                    missing.base, missing.offset
                )));
            }
        }
        Ok(())
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn at_entry(error: Error, index: u32, offset: usize) -> Error {
    match error {
        Error::TruncatedPack(msg) => Error::TruncatedPack(format!("entry {} at offset {}: {}", index, offset, msg)),
        Error::CorruptObject(msg) => Error::CorruptObject(format!("entry {} at offset {}: {}", index, offset, msg)),
        other => other,
    }
}

fn progress_bar(object_count: u32) -> Option<ProgressBar> {
    if object_count <= PROGRESS_THRESHOLD {
        return None;
    }
    let bar = ProgressBar::new(object_count as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {msg} [{bar:40.cyan/blue}] {pos}/{len} objects ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    bar.set_message("Unpacking");
    Some(bar)
}

/// Inflate one zlib stream that should produce exactly `size` bytes.
///
/// Returns the inflated bytes and how many compressed bytes the stream
/// occupied, which is where the next entry starts.
fn inflate_entry(input: &[u8], size: usize) -> Result<(Vec<u8>, usize)> {
    let mut inflater = Decompress::new(true);
    let mut output = Vec::with_capacity(size.min(MAX_PREALLOC) + 1);

    loop {
        let consumed = inflater.total_in() as usize;
        let produced = output.len();
        if output.len() == output.capacity() {
            output.reserve(INFLATE_CHUNK);
        }

        let status = inflater
            .decompress_vec(&input[consumed..], &mut output, FlushDecompress::None)
            .map_err(|e| Error::CorruptObject(format!("failed to inflate: {}", e)))?;

        if output.len() > size {
            return Err(Error::CorruptObject(format!(
                "inflates past its declared size of {} bytes",
                size
            )));
        }
        if matches!(status, Status::StreamEnd) {
            break;
        }
        if inflater.total_in() as usize == consumed && output.len() == produced {
            if consumed >= input.len() {
                return Err(Error::TruncatedPack("zlib stream runs past end of pack".to_string()));
            }
            return Err(Error::CorruptObject("zlib stream stopped making progress".to_string()));
        }
    }

    if output.len() != size {
        return Err(Error::CorruptObject(format!(
            "inflated to {} bytes, header says {}",
            output.len(),
            size
        )));
    }
    Ok((output, inflater.total_in() as usize))
}

/// Check what follows the last declared entry.
///
/// Nothing at all means a pack without a trailer. Otherwise the next 20
/// bytes must be the SHA-1 of everything before them. Leftover bytes that
/// are not a valid trailer mean the header under-counts its entries.
fn verify_trailer(pack: &[u8], end: usize, object_count: u32) -> Result<()> {
    let rest = &pack[end..];
    if rest.is_empty() {
        tracing::debug!("pack has no checksum trailer");
        return Ok(());
    }
    let undercounted = || {
        Error::CorruptObject(format!(
            "{} bytes follow the {} entries the header declares",
            rest.len(),
            object_count
        ))
    };
    if rest.len() < RAW_HASH_LEN {
        return Err(undercounted());
    }

    let expected = raw_to_hex(&rest[..RAW_HASH_LEN]);
    let actual = digest(&pack[..end]);
    if expected != actual {
        if rest.len() > RAW_HASH_LEN {
            return Err(undercounted());
        }
        return Err(Error::PackChecksumMismatch { expected, actual });
    }
    if rest.len() > RAW_HASH_LEN {
        tracing::debug!("ignoring {} bytes after pack trailer", rest.len() - RAW_HASH_LEN);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::builder::{delta_copy_insert, PackBuilder};
    use crate::storage::LooseObjectStore;
    use tempfile::TempDir;

    fn store() -> (TempDir, LooseObjectStore) {
        let temp = TempDir::new().unwrap();
        let store = LooseObjectStore::new(temp.path());
        (temp, store)
    }

    #[test]
    fn test_two_blobs_in_order() {
        let (_temp, store) = store();
        let mut builder = PackBuilder::new();
        builder.add(Kind::Blob, b"first blob\n");
        builder.add(Kind::Blob, b"second blob\0with nul\n");

        let summary = PackReader::new(&store).unpack(&builder.build()).unwrap();
        assert_eq!(summary.version, 2);
        assert_eq!(summary.object_count, 2);
        assert_eq!(
            summary.objects,
            vec![
                ("7a55745ae1be366d02d9cfb5c052ed602930353b".to_string(), Kind::Blob),
                ("9eef41278e167780f9736c5babe0c68ca9361bd6".to_string(), Kind::Blob),
            ]
        );
        assert_eq!(store.get(&summary.objects[0].0).unwrap().data, b"first blob\n");
        assert_eq!(store.get(&summary.objects[1].0).unwrap().data, b"second blob\0with nul\n");
    }

    #[test]
    fn test_response_preamble_is_skipped() {
        let (_temp, store) = store();
        let mut builder = PackBuilder::new();
        builder.add(Kind::Blob, b"hello\n");
        let mut response = b"0008NAK\n".to_vec();
        response.extend_from_slice(&builder.build());

        let summary = PackReader::new(&store).unpack_response(&response).unwrap();
        assert_eq!(summary.objects[0].0, "ce013625030ba8dba906f756967f9e9ca394464a");
    }

    #[test]
    fn test_large_entry_uses_multi_byte_size() {
        let (_temp, store) = store();
        let content: Vec<u8> = (0..100_000u32).flat_map(|i| i.to_le_bytes()).collect();
        let mut builder = PackBuilder::new();
        builder.add(Kind::Blob, &content);
        builder.add(Kind::Blob, b"after");

        let summary = PackReader::new(&store).unpack(&builder.build()).unwrap();
        assert_eq!(store.get(&summary.objects[0].0).unwrap().data, content);
        assert_eq!(store.get(&summary.objects[1].0).unwrap().data, b"after");
    }

    #[test]
    fn test_invalid_signature() {
        let (_temp, store) = store();
        let reader = PackReader::new(&store);
        assert!(matches!(reader.unpack(b"KCAP\0\0\0\x02\0\0\0\0"), Err(Error::InvalidPackSignature)));
        assert!(matches!(reader.unpack_response(b"0008NAK\n"), Err(Error::InvalidPackSignature)));
    }

    #[test]
    fn test_count_larger_than_entries() {
        let (_temp, store) = store();
        let mut builder = PackBuilder::new();
        builder.add(Kind::Blob, b"only one");
        let mut pack = builder.build_without_trailer();
        pack[11] = 2;

        let result = PackReader::new(&store).unpack(&pack);
        assert!(matches!(result, Err(Error::TruncatedPack(_))));
    }

    #[test]
    fn test_count_smaller_than_entries() {
        let (_temp, store) = store();
        let mut builder = PackBuilder::new();
        builder.add(Kind::Blob, b"first");
        builder.add(Kind::Blob, b"second");

        let mut bare = builder.build_without_trailer();
        bare[11] = 1;
        let result = PackReader::new(&store).unpack(&bare);
        assert!(matches!(result, Err(Error::CorruptObject(_))));

        // With a trailer the leftover entry sits where the checksum should be
        let mut with_trailer = builder.build();
        with_trailer[11] = 1;
        let result = PackReader::new(&store).unpack(&with_trailer);
        assert!(matches!(result, Err(Error::CorruptObject(_))));
    }

    #[test]
    fn test_bytes_after_trailer_ignored() {
        let (_temp, store) = store();
        let mut builder = PackBuilder::new();
        builder.add(Kind::Blob, b"hello\n");
        let mut pack = builder.build();
        pack.extend_from_slice(b"0000");

        let summary = PackReader::new(&store).unpack(&pack).unwrap();
        assert_eq!(summary.objects.len(), 1);
    }

    #[test]
    fn test_truncated_stream() {
        let (_temp, store) = store();
        let mut builder = PackBuilder::new();
        builder.add(Kind::Blob, &b"some content that compresses".repeat(20));
        let pack = builder.build_without_trailer();

        let result = PackReader::new(&store).unpack(&pack[..pack.len() - 6]);
        assert!(matches!(result, Err(Error::TruncatedPack(_))));
    }

    #[test]
    fn test_declared_size_mismatch() {
        let (_temp, store) = store();
        let mut builder = PackBuilder::new();
        builder.add_with_declared_size(Kind::Blob, b"12345", 4);

        let result = PackReader::new(&store).unpack(&builder.build());
        assert!(matches!(result, Err(Error::CorruptObject(_))));
    }

    #[test]
    fn test_checksum_mismatch() {
        let (_temp, store) = store();
        let mut builder = PackBuilder::new();
        builder.add(Kind::Blob, b"hello\n");
        let mut pack = builder.build();
        let last = pack.len() - 1;
        pack[last] ^= 0xff;

        let result = PackReader::new(&store).unpack(&pack);
        assert!(matches!(result, Err(Error::PackChecksumMismatch { .. })));
    }

    #[test]
    fn test_ofs_delta_resolved() {
        let (_temp, store) = store();
        let base = b"hello world\n";
        let mut builder = PackBuilder::new();
        let base_offset = builder.add(Kind::Blob, base);
        builder.add_ofs_delta(base_offset, &delta_copy_insert(base, 6, b"rust\n"));

        let summary = PackReader::new(&store).unpack(&builder.build()).unwrap();
        assert_eq!(summary.objects.len(), 2);
        let (id, kind) = &summary.objects[1];
        assert_eq!(*kind, Kind::Blob);
        assert_eq!(store.get(id).unwrap().data, b"hello rust\n");
    }

    #[test]
    fn test_ref_delta_before_its_base() {
        let (_temp, store) = store();
        let base = b"hello world\n";
        let base_id = GitObject::from_raw(Kind::Blob, base.to_vec()).id;
        let mut builder = PackBuilder::new();
        builder.add_ref_delta(&base_id, &delta_copy_insert(base, 6, b"there\n"));
        builder.add(Kind::Blob, base);

        let summary = PackReader::new(&store).unpack(&builder.build()).unwrap();
        assert_eq!(summary.objects.len(), 2);
        assert_eq!(summary.objects[0].0, base_id);
        assert_eq!(store.get(&summary.objects[1].0).unwrap().data, b"hello there\n");
    }

    #[test]
    fn test_ref_delta_against_stored_object() {
        let (_temp, store) = store();
        let base_id = store.put(Kind::Blob, b"hello world\n").unwrap();
        let mut builder = PackBuilder::new();
        builder.add_ref_delta(&base_id, &delta_copy_insert(b"hello world\n", 5, b"!\n"));

        let summary = PackReader::new(&store).unpack(&builder.build()).unwrap();
        assert_eq!(store.get(&summary.objects[0].0).unwrap().data, b"hello!\n");
    }

    #[test]
    fn test_missing_delta_base() {
        let (_temp, store) = store();
        let mut builder = PackBuilder::new();
        builder.add_ref_delta(
            "0123456789abcdef0123456789abcdef01234567",
            &delta_copy_insert(b"abc", 1, b"z"),
        );

        let result = PackReader::new(&store).unpack(&builder.build());
        assert!(matches!(result, Err(Error::DeltaBaseNotFound(_))));
    }
}
