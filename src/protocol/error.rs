//! Protocol error types

use thiserror::Error;

use super::{CommandGroup, CommandMode};

/// Errors raised by the identifier codec, the marshallers and the MX1 framer.
///
/// All of these describe malformed wire data or short buffers. Callers on
/// the transport side drop the offending frame and continue.
#[derive(Error, Debug)]
pub enum Error {
    /// CAN identifier whose upper bits match no group/mode combination
    #[error("unknown CAN identifier encoding: {can_id:#010x}")]
    UnknownEncoding {
        /// Raw identifier
        can_id: u32,
    },

    /// Command does not fit the 6-bit command field
    #[error("command {command:#04x} out of range (max 0x3f)")]
    CommandOutOfRange {
        /// Offending command
        command: u8,
    },

    /// Payload too short for the requested adapter
    #[error("malformed payload for {capability}: need {needed} bytes, got {got}")]
    MalformedPayload {
        /// Adapter type name
        capability: &'static str,
        /// Minimum payload length
        needed: usize,
        /// Actual payload length
        got: usize,
    },

    /// Destination buffer cannot hold the encoded bytes
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Needed size
        needed: usize,
        /// Available size
        got: usize,
    },

    /// Source bytes end before the declared frame length
    #[error("truncated frame: need {needed} bytes, got {got}")]
    TruncatedFrame {
        /// Needed size
        needed: usize,
        /// Available size
        got: usize,
    },

    /// Payload exceeds what the frame can carry
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size
        size: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Escape prefix with no byte following it
    #[error("dangling escape byte at end of frame")]
    TruncatedEscape,

    /// Unescaped `SOH` or `EOT` inside an MX1 frame body
    #[error("unexpected sentinel {byte:#04x} at offset {offset}")]
    UnexpectedSentinel {
        /// Sentinel found
        byte: u8,
        /// Offset within the frame
        offset: usize,
    },

    /// MX1 frame checksum mismatch
    #[error("checksum mismatch: expected {expected:#04x}, got {found:#04x}")]
    ChecksumMismatch {
        /// Checksum computed over the payload
        expected: u8,
        /// Checksum carried by the frame
        found: u8,
    },

    /// MX1 frame grew past the configured limit
    #[error("frame exceeds {max} bytes")]
    FrameTooLarge {
        /// Configured maximum
        max: usize,
    },

    /// Two factories claim the same (group, command, mode) triple
    #[error("factory conflict on {group}/{command:#04x}/{mode}")]
    ConflictingFactory {
        /// Command group
        group: CommandGroup,
        /// Command
        command: u8,
        /// Command mode
        mode: CommandMode,
    },

    /// Input is not a sequence of hex pairs
    #[error("invalid hex input: {input:?}")]
    InvalidHex {
        /// Offending input
        input: String,
    },

    /// IO error from the byte channel
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
