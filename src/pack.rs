//! Git pack stream ingestion
//!
//! A pack is a 12 byte header (`PACK`, version, object count) followed by
//! one record per object: a variable-length `(type, size)` header and a
//! zlib stream. Delta records are resolved against their base and every
//! object is written to the object store in loose form.

mod delta;
mod entry;
mod reader;

#[cfg(test)]
pub(crate) mod builder;

pub use reader::PackReader;
