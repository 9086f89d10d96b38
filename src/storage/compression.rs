use std::io::{self, Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};

/// Byte-level compression applied to whole loose objects (header included)
pub trait Compressor {
    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// Inflate a complete stream; the output size is not known up front.
    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>>;
}

/// zlib-wrapped deflate, the format git uses for loose objects
#[derive(Debug, Clone, Copy)]
pub struct ZlibCompressor {
    level: Compression,
}

impl ZlibCompressor {
    pub fn new(level: Compression) -> Self {
        Self { level }
    }
}

impl Default for ZlibCompressor {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}

impl Compressor for ZlibCompressor {
    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut content = Vec::new();
        decoder.read_to_end(&mut content)?;
        Ok(content)
    }
}
