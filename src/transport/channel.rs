//! Outbound byte channel the links write to.
//!
//! Opening ports and sockets is the caller's business; a link only needs
//! something that accepts one encoded frame at a time.

use std::io;
use std::net::UdpSocket;
use std::sync::{Arc, Mutex, PoisonError};

/// Sink for encoded frames.
pub trait ByteChannel: Send + Sync {
    /// Send one encoded frame.
    fn send(&self, bytes: &[u8]) -> io::Result<()>;
}

impl<T: ByteChannel + ?Sized> ByteChannel for Arc<T> {
    fn send(&self, bytes: &[u8]) -> io::Result<()> {
        (**self).send(bytes)
    }
}

/// A connected UDP socket sends each frame as one datagram.
impl ByteChannel for UdpSocket {
    fn send(&self, bytes: &[u8]) -> io::Result<()> {
        let sent = UdpSocket::send(self, bytes)?;
        if sent != bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram: {sent} of {} bytes", bytes.len()),
            ));
        }
        Ok(())
    }
}

/// In-memory channel keeping every frame sent through it.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MemoryChannel {
    /// Create an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the frames sent so far.
    #[must_use]
    pub fn take(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of frames sent and not yet taken.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is waiting to be taken.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteChannel for MemoryChannel {
    fn send(&self, bytes: &[u8]) -> io::Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bytes.to_vec());
        Ok(())
    }
}
