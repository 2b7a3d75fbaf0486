//! MX1 serial framing
//!
//! A frame on the wire is `SOH, escape(payload || crc8(payload)), EOT`.
//! Every payload byte equal to one of the three sentinels is sent as `DLE`
//! followed by the byte XOR `0x20`.

mod deframer;

pub use deframer::{DeframerStats, Mx1Deframer};

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::{Error, Result};
use crate::util::crc8;

/// Start of frame
pub const SOH: u8 = 0x01;
/// Escape prefix
pub const DLE: u8 = 0x10;
/// End of frame
pub const EOT: u8 = 0x17;
/// Bit flipped on escaped bytes
pub const ESCAPE_XOR: u8 = 0x20;

/// MX1 link parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mx1Config {
    /// Seed of the frame checksum
    pub checksum_seed: u8,
    /// Largest unescaped frame (payload + checksum) the deframer accepts
    pub max_frame_len: usize,
}

impl Default for Mx1Config {
    fn default() -> Self {
        Self {
            checksum_seed: 0xFF,
            max_frame_len: 512,
        }
    }
}

/// Whether `byte` has framing meaning and must be escaped.
#[must_use]
pub const fn is_sentinel(byte: u8) -> bool {
    matches!(byte, SOH | DLE | EOT)
}

/// Exact size of the escaped encoding of `raw`.
#[must_use]
pub fn escaped_size(raw: &[u8]) -> usize {
    raw.len() + raw.iter().filter(|&&b| is_sentinel(b)).count()
}

/// Escape `raw` into `out`, returning the escaped size.
///
/// With `out` set to `None` only the size is computed.
pub fn escape<B: BufMut + ?Sized>(raw: &[u8], out: Option<&mut B>) -> Result<usize> {
    let size = escaped_size(raw);
    let Some(out) = out else {
        return Ok(size);
    };

    if out.remaining_mut() < size {
        return Err(Error::BufferTooSmall {
            needed: size,
            got: out.remaining_mut(),
        });
    }

    put_escaped(raw, out);
    Ok(size)
}

/// Escape into a new vector.
#[must_use]
pub fn escape_to_vec(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(escaped_size(raw));
    put_escaped(raw, &mut out);
    out
}

/// Caller guarantees `out` has room for `escaped_size(raw)` bytes.
fn put_escaped<B: BufMut + ?Sized>(raw: &[u8], out: &mut B) {
    for &byte in raw {
        if is_sentinel(byte) {
            out.put_u8(DLE);
            out.put_u8(byte ^ ESCAPE_XOR);
        } else {
            out.put_u8(byte);
        }
    }
}

/// Reverse [`escape`], returning the number of bytes written.
///
/// A trailing `DLE` with nothing after it is [`Error::TruncatedEscape`].
pub fn unescape<B: BufMut + ?Sized>(escaped: &[u8], out: &mut B) -> Result<usize> {
    let mut written = 0;
    let mut bytes = escaped.iter();
    while let Some(&byte) = bytes.next() {
        let value = if byte == DLE {
            bytes.next().ok_or(Error::TruncatedEscape)? ^ ESCAPE_XOR
        } else {
            byte
        };
        if !out.has_remaining_mut() {
            return Err(Error::BufferTooSmall {
                needed: written + 1,
                got: written,
            });
        }
        out.put_u8(value);
        written += 1;
    }
    Ok(written)
}

/// Wire size of the frame carrying `payload`.
#[must_use]
pub fn framed_len(payload: &[u8], seed: u8) -> usize {
    let crc = crc8(seed, payload);
    2 + escaped_size(payload) + escaped_size(&[crc])
}

/// Write the complete frame for `payload` into `out`.
pub fn encode_frame<B: BufMut + ?Sized>(payload: &[u8], seed: u8, out: &mut B) -> Result<usize> {
    let crc = crc8(seed, payload);
    let total = 2 + escaped_size(payload) + escaped_size(&[crc]);
    if out.remaining_mut() < total {
        return Err(Error::BufferTooSmall {
            needed: total,
            got: out.remaining_mut(),
        });
    }

    out.put_u8(SOH);
    escape(payload, Some(&mut *out))?;
    escape(&[crc], Some(&mut *out))?;
    out.put_u8(EOT);
    Ok(total)
}

/// Decode one complete frame, `SOH` and `EOT` included, into its payload.
///
/// A raw `SOH` or `EOT` between the delimiters is
/// [`Error::UnexpectedSentinel`]; the streaming deframer never accepts such
/// a frame either.
pub fn decode_frame(frame: &[u8], seed: u8) -> Result<Bytes> {
    let inner = match frame {
        [SOH, inner @ .., EOT] => inner,
        _ => {
            return Err(Error::TruncatedFrame {
                needed: 2,
                got: frame.len(),
            });
        }
    };
    if let Some(position) = inner.iter().position(|&b| b == SOH || b == EOT) {
        return Err(Error::UnexpectedSentinel {
            byte: inner[position],
            offset: position + 1,
        });
    }

    let mut unescaped = BytesMut::with_capacity(inner.len());
    unescape(inner, &mut unescaped)?;
    verify_checksum(unescaped, seed)
}

/// Split the trailing checksum off an unescaped frame and check it.
pub(crate) fn verify_checksum(mut unescaped: BytesMut, seed: u8) -> Result<Bytes> {
    let Some(&found) = unescaped.last() else {
        return Err(Error::TruncatedFrame { needed: 1, got: 0 });
    };
    unescaped.truncate(unescaped.len() - 1);

    let expected = crc8(seed, &unescaped);
    if expected != found {
        return Err(Error::ChecksumMismatch { expected, found });
    }
    Ok(unescaped.freeze())
}
