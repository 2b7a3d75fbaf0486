//! Streaming MX1 deframer
//!
//! Accepts arbitrarily chunked serial input. Bytes outside a frame are
//! ignored; any error drops the frame and waits for the next `SOH`.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use super::{DLE, EOT, ESCAPE_XOR, Mx1Config, SOH, verify_checksum};
use crate::protocol::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InFrame,
    InEscape,
}

/// Counters describing what the deframer saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeframerStats {
    /// Frames delivered
    pub frames: u64,
    /// Frames dropped on checksum mismatch
    pub checksum_failures: u64,
    /// Frames dropped on a dangling escape
    pub escape_failures: u64,
    /// Frames dropped for exceeding `max_frame_len`
    pub oversize: u64,
    /// Frames with no checksum byte
    pub truncated: u64,
    /// Incomplete frames abandoned because a new `SOH` arrived
    pub aborted: u64,
}

/// Incremental MX1 frame decoder.
#[derive(Debug)]
pub struct Mx1Deframer {
    config: Mx1Config,
    state: State,
    buffer: BytesMut,
    stats: DeframerStats,
}

impl Default for Mx1Deframer {
    fn default() -> Self {
        Self::new(Mx1Config::default())
    }
}

impl Mx1Deframer {
    /// Create a deframer.
    #[must_use]
    pub fn new(config: Mx1Config) -> Self {
        Self {
            config,
            state: State::Idle,
            buffer: BytesMut::with_capacity(config.max_frame_len),
            stats: DeframerStats::default(),
        }
    }

    /// Feed bytes, calling `sink` once per completed or dropped frame.
    ///
    /// Dropped frames are reported as `Err`; the deframer has already
    /// resynchronised when `sink` sees them.
    pub fn feed(&mut self, data: &[u8], mut sink: impl FnMut(Result<Bytes>)) {
        for &byte in data {
            if let Some(outcome) = self.push(byte) {
                sink(outcome);
            }
        }
    }

    /// Feed bytes, calling `on_frame` for valid frames only.
    pub fn feed_frames(&mut self, data: &[u8], mut on_frame: impl FnMut(Bytes)) {
        self.feed(data, |outcome| {
            if let Ok(frame) = outcome {
                on_frame(frame);
            }
        });
    }

    /// Process one byte.
    pub fn push(&mut self, byte: u8) -> Option<Result<Bytes>> {
        match self.state {
            State::Idle => {
                if byte == SOH {
                    self.start();
                } else {
                    trace!(byte, "ignoring byte outside frame");
                }
                None
            }
            State::InFrame => match byte {
                SOH => {
                    self.restart();
                    None
                }
                EOT => Some(self.finish()),
                DLE => {
                    self.state = State::InEscape;
                    None
                }
                _ => self.accumulate(byte),
            },
            State::InEscape => match byte {
                SOH => {
                    self.restart();
                    None
                }
                EOT => {
                    self.stats.escape_failures += 1;
                    Some(self.fail(Error::TruncatedEscape))
                }
                _ => {
                    self.state = State::InFrame;
                    self.accumulate(byte ^ ESCAPE_XOR)
                }
            },
        }
    }

    /// Drop any partial frame and return to idle.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = State::Idle;
    }

    /// Whether a frame is being accumulated.
    #[must_use]
    pub fn in_frame(&self) -> bool {
        self.state != State::Idle
    }

    /// Counters since creation.
    #[must_use]
    pub fn stats(&self) -> DeframerStats {
        self.stats
    }

    fn start(&mut self) {
        self.buffer.clear();
        self.state = State::InFrame;
    }

    fn restart(&mut self) {
        debug!(
            discarded = self.buffer.len(),
            "SOH inside frame, restarting"
        );
        self.stats.aborted += 1;
        self.start();
    }

    fn accumulate(&mut self, byte: u8) -> Option<Result<Bytes>> {
        if self.buffer.len() >= self.config.max_frame_len {
            self.stats.oversize += 1;
            return Some(self.fail(Error::FrameTooLarge {
                max: self.config.max_frame_len,
            }));
        }
        self.buffer.put_u8(byte);
        None
    }

    fn finish(&mut self) -> Result<Bytes> {
        let frame = self.buffer.split();
        self.state = State::Idle;
        match verify_checksum(frame, self.config.checksum_seed) {
            Ok(payload) => {
                self.stats.frames += 1;
                trace!(len = payload.len(), "frame complete");
                Ok(payload)
            }
            Err(err) => {
                match err {
                    Error::ChecksumMismatch { .. } => self.stats.checksum_failures += 1,
                    _ => self.stats.truncated += 1,
                }
                debug!(error = %err, "dropping frame");
                Err(err)
            }
        }
    }

    fn fail(&mut self, err: Error) -> Result<Bytes> {
        debug!(error = %err, "dropping frame, waiting for SOH");
        self.reset();
        Err(err)
    }
}
