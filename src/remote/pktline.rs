//! pkt-line framing: 4 hex digits of total length (prefix included), then data

use crate::error::{Error, Result};

pub const FLUSH: &[u8] = b"0000";
const LEN_PREFIX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    Data(&'a [u8]),
    /// `0000`
    Flush,
    /// `0001` and `0002`, used by protocol v2
    Delimiter,
}

pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut line = format!("{:04x}", payload.len() + LEN_PREFIX).into_bytes();
    line.extend_from_slice(payload);
    line
}

/// Split a buffer into packets.
///
/// Parsing stops at the first `PACK` signature, since pack data is not
/// pkt-line framed. Returns the packets and the offset where parsing stopped.
pub fn parse(buffer: &[u8]) -> Result<(Vec<Packet<'_>>, usize)> {
    let mut packets = Vec::new();
    let mut pos = 0;

    while pos < buffer.len() {
        let rest = &buffer[pos..];
        if rest.starts_with(b"PACK") {
            break;
        }
        let prefix = rest
            .get(..LEN_PREFIX)
            .ok_or_else(|| Error::Network(format!("truncated pkt-line at byte {}", pos)))?;
        let len = std::str::from_utf8(prefix)
            .ok()
            .and_then(|hex| usize::from_str_radix(hex, 16).ok())
            .ok_or_else(|| {
                Error::Network(format!(
                    "invalid pkt-line length {:?} at byte {}",
                    String::from_utf8_lossy(prefix),
                    pos
                ))
            })?;

        match len {
            0 => packets.push(Packet::Flush),
            1 | 2 => packets.push(Packet::Delimiter),
            3 => {
                return Err(Error::Network(format!("invalid pkt-line length 3 at byte {}", pos)));
            }
            _ => {
                let data = rest
                    .get(LEN_PREFIX..len)
                    .ok_or_else(|| Error::Network(format!("truncated pkt-line at byte {}", pos)))?;
                packets.push(Packet::Data(data));
                pos += len;
                continue;
            }
        }
        pos += LEN_PREFIX;
    }

    Ok((packets, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_want_line() {
        let want = format!("want {}\n", "ce013625030ba8dba906f756967f9e9ca394464a");
        let line = encode(want.as_bytes());
        assert_eq!(&line[..4], b"0032");
        assert_eq!(line.len(), 0x32);
        assert_eq!(encode(b"done\n"), b"0009done\n");
    }

    #[test]
    fn test_parse_packets() {
        let buffer = b"001e# service=git-upload-pack\n0000000ahello\n0001";
        let (packets, end) = parse(buffer).unwrap();
        assert_eq!(
            packets,
            vec![
                Packet::Data(b"# service=git-upload-pack\n"),
                Packet::Flush,
                Packet::Data(b"hello\n"),
                Packet::Delimiter,
            ]
        );
        assert_eq!(end, buffer.len());
    }

    #[test]
    fn test_parse_stops_at_pack() {
        let buffer = b"0008NAK\nPACK\0\0\0\x02";
        let (packets, end) = parse(buffer).unwrap();
        assert_eq!(packets, vec![Packet::Data(b"NAK\n")]);
        assert_eq!(&buffer[end..end + 4], b"PACK");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse(b"zzzzhello"), Err(Error::Network(_))));
        assert!(matches!(parse(b"00ffshort"), Err(Error::Network(_))));
        assert!(matches!(parse(b"00"), Err(Error::Network(_))));
    }
}
