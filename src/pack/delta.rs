//! Git delta format: two size varints followed by copy/insert instructions

use crate::error::{Error, Result};

const COPY_INSTRUCTION_FLAG: u8 = 0x80;
const COPY_OFFSET_BYTES: u8 = 4;
const COPY_SIZE_BYTES: u8 = 3;
/// A copy with an encoded size of 0 copies this many bytes
const COPY_ZERO_SIZE: usize = 0x10000;
/// Cap on trusting a header-declared size for allocation
const MAX_PREALLOC: usize = 1 << 24;

struct DeltaCursor<'a> {
    delta: &'a [u8],
    pos: usize,
}

impl<'a> DeltaCursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.delta.len()
    }

    fn byte(&mut self) -> Result<u8> {
        let byte = *self
            .delta
            .get(self.pos)
            .ok_or_else(|| Error::InvalidDelta("instruction runs past end of delta".to_string()))?;
        self.pos += 1;
        Ok(byte)
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self
            .delta
            .get(self.pos..self.pos + len)
            .ok_or_else(|| Error::InvalidDelta("insert runs past end of delta".to_string()))?;
        self.pos += len;
        Ok(bytes)
    }

    /// Little-endian base-128 size, as in the delta header
    fn size(&mut self) -> Result<usize> {
        let mut value = 0usize;
        let mut shift = 0;
        loop {
            let byte = self.byte()?;
            if shift >= usize::BITS {
                return Err(Error::InvalidDelta("size varint too long".to_string()));
            }
            value |= ((byte & 0x7f) as usize) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Read the bytes of an integer whose presence is flagged in `present`
    fn partial_int(&mut self, bytes: u8, present: &mut u8) -> Result<usize> {
        let mut value = 0;
        for byte_index in 0..bytes {
            if *present & 1 != 0 {
                value |= (self.byte()? as usize) << (byte_index * 8);
            }
            *present >>= 1;
        }
        Ok(value)
    }
}

/// Rebuild an object from its base and an inflated delta
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let mut cursor = DeltaCursor { delta, pos: 0 };

    let base_size = cursor.size()?;
    if base_size != base.len() {
        return Err(Error::InvalidDelta(format!(
            "delta expects a {} byte base, got {}",
            base_size,
            base.len()
        )));
    }
    let result_size = cursor.size()?;
    let mut result = Vec::with_capacity(result_size.min(MAX_PREALLOC));

    while !cursor.at_end() {
        let instruction = cursor.byte()?;
        if instruction & COPY_INSTRUCTION_FLAG != 0 {
            let mut present = instruction;
            let offset = cursor.partial_int(COPY_OFFSET_BYTES, &mut present)?;
            let mut size = cursor.partial_int(COPY_SIZE_BYTES, &mut present)?;
            if size == 0 {
                size = COPY_ZERO_SIZE;
            }
            let end = offset
                .checked_add(size)
                .ok_or_else(|| Error::InvalidDelta("copy range overflows".to_string()))?;
            let chunk = base.get(offset..end).ok_or_else(|| {
                Error::InvalidDelta(format!(
                    "copy {}..{} is outside the {} byte base",
                    offset,
                    end,
                    base.len()
                ))
            })?;
            result.extend_from_slice(chunk);
        } else if instruction == 0 {
            return Err(Error::InvalidDelta("reserved instruction 0".to_string()));
        } else {
            result.extend_from_slice(cursor.bytes(instruction as usize)?);
        }
    }

    if result.len() != result_size {
        return Err(Error::InvalidDelta(format!(
            "delta produced {} bytes, header says {}",
            result.len(),
            result_size
        )));
    }
    Ok(result)
}
