//! Links tying the codecs to a byte channel, the buffer pool and listeners.

use std::sync::{Arc, Mutex, PoisonError};

#[cfg(feature = "debug-tools")]
use std::path::PathBuf;

use tracing::{debug, instrument, trace};

#[cfg(feature = "debug-tools")]
use super::debug::{Direction, FrameRecorder};
use super::buffer::{BufferPool, PoolConfig};
use super::channel::ByteChannel;
use super::events::{EventBus, LinkEvent, LinkState};
use crate::protocol::{Packet, Result, SpecialisationRegistry, marshal, unmarshal_all};
use crate::serial::{DeframerStats, Mx1Config, Mx1Deframer, encode_frame};

/// Link configuration options.
#[derive(Debug, Clone, Default)]
pub struct LinkConfig {
    /// Send buffer pool sizing.
    pub pool: PoolConfig,
    /// MX1 framing parameters (ignored by [`ZcanLink`]).
    pub mx1: Mx1Config,
    /// Optional capture file for every frame sent and received (debug builds only).
    #[cfg(feature = "debug-tools")]
    pub capture_path: Option<PathBuf>,
}

#[cfg(feature = "debug-tools")]
fn open_recorder(config: &LinkConfig) -> Result<Option<FrameRecorder>> {
    match &config.capture_path {
        Some(path) => Ok(Some(FrameRecorder::create(path)?)),
        None => Ok(None),
    }
}

#[cfg(feature = "debug-tools")]
fn record(recorder: Option<&FrameRecorder>, direction: Direction, frame: &[u8]) {
    if let Some(recorder) = recorder {
        if let Err(err) = recorder.record(direction, frame) {
            debug!(error = ?err, "failed to record frame");
        }
    }
}

/// ZCAN-over-UDP link.
#[derive(Debug)]
pub struct ZcanLink<C> {
    channel: C,
    pool: BufferPool,
    registry: Arc<SpecialisationRegistry>,
    events: EventBus<LinkEvent>,
    #[cfg(feature = "debug-tools")]
    recorder: Option<FrameRecorder>,
}

impl<C: ByteChannel> ZcanLink<C> {
    /// Create a link resolving adapters against the shared registry.
    pub fn new(channel: C, config: &LinkConfig) -> Result<Self> {
        Self::with_registry(channel, config, SpecialisationRegistry::shared())
    }

    /// Create a link with an explicit adapter registry.
    pub fn with_registry(
        channel: C,
        config: &LinkConfig,
        registry: Arc<SpecialisationRegistry>,
    ) -> Result<Self> {
        Ok(Self {
            channel,
            pool: BufferPool::with_config(config.pool),
            registry,
            events: EventBus::new(),
            #[cfg(feature = "debug-tools")]
            recorder: open_recorder(config)?,
        })
    }

    /// Listeners for decoded packets and link notifications.
    #[must_use]
    pub fn events(&self) -> &EventBus<LinkEvent> {
        &self.events
    }

    /// Buffer pool backing [`send`](Self::send).
    #[must_use]
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Marshal and send one packet, returning the bytes written.
    #[instrument(level = "trace", skip(self, packet), fields(packet = %packet))]
    pub fn send(&self, packet: &Packet) -> Result<usize> {
        let mut buffer = self.pool.acquire();
        let written = marshal(packet, buffer.as_mut_slice())?;
        buffer.set_len(written);
        self.channel.send(buffer.as_slice())?;
        #[cfg(feature = "debug-tools")]
        record(self.recorder.as_ref(), Direction::Outbound, buffer.as_slice());
        Ok(written)
    }

    /// Decode an inbound datagram and publish its packets.
    ///
    /// Returns the number of packets published. A malformed tail is
    /// reported as [`LinkEvent::Dropped`] and the rest of the datagram is
    /// discarded.
    pub fn receive(&self, datagram: &[u8]) -> usize {
        #[cfg(feature = "debug-tools")]
        record(self.recorder.as_ref(), Direction::Inbound, datagram);

        let mut published = 0;
        for result in unmarshal_all(&self.registry, datagram) {
            match result {
                Ok(packet) => {
                    trace!(%packet, "received");
                    self.events.publish(&LinkEvent::Packet(packet));
                    published += 1;
                }
                Err(err) => {
                    debug!(error = %err, "dropping malformed datagram tail");
                    self.events.publish(&LinkEvent::Dropped(Arc::new(err)));
                }
            }
        }
        published
    }

    /// Publish a link state change.
    pub fn set_state(&self, state: LinkState) {
        debug!(?state, "zcan link state");
        self.events.publish(&LinkEvent::State(state));
    }
}

/// MX1 serial link.
#[derive(Debug)]
pub struct Mx1Link<C> {
    channel: C,
    pool: BufferPool,
    config: Mx1Config,
    deframer: Mutex<Mx1Deframer>,
    events: EventBus<LinkEvent>,
    #[cfg(feature = "debug-tools")]
    recorder: Option<FrameRecorder>,
}

impl<C: ByteChannel> Mx1Link<C> {
    /// Create a link.
    pub fn new(channel: C, config: &LinkConfig) -> Result<Self> {
        Ok(Self {
            channel,
            pool: BufferPool::with_config(config.pool),
            config: config.mx1,
            deframer: Mutex::new(Mx1Deframer::new(config.mx1)),
            events: EventBus::new(),
            #[cfg(feature = "debug-tools")]
            recorder: open_recorder(config)?,
        })
    }

    /// Listeners for verified frames and link notifications.
    #[must_use]
    pub fn events(&self) -> &EventBus<LinkEvent> {
        &self.events
    }

    /// Frame and send one payload, returning the bytes written.
    #[instrument(level = "trace", skip(self, payload), fields(len = payload.len()))]
    pub fn send(&self, payload: &[u8]) -> Result<usize> {
        let mut buffer = self.pool.acquire();
        let written = {
            let mut out: &mut [u8] = buffer.as_mut_slice();
            encode_frame(payload, self.config.checksum_seed, &mut out)?
        };
        buffer.set_len(written);
        self.channel.send(buffer.as_slice())?;
        #[cfg(feature = "debug-tools")]
        record(self.recorder.as_ref(), Direction::Outbound, buffer.as_slice());
        Ok(written)
    }

    /// Feed a chunk of serial input and publish the frames it completes.
    ///
    /// Returns the number of frames published.
    pub fn receive(&self, chunk: &[u8]) -> usize {
        #[cfg(feature = "debug-tools")]
        record(self.recorder.as_ref(), Direction::Inbound, chunk);

        let mut outcomes = Vec::new();
        self.deframer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .feed(chunk, |outcome| outcomes.push(outcome));

        let mut published = 0;
        for outcome in outcomes {
            match outcome {
                Ok(frame) => {
                    self.events.publish(&LinkEvent::Frame(frame));
                    published += 1;
                }
                Err(err) => self.events.publish(&LinkEvent::Dropped(Arc::new(err))),
            }
        }
        published
    }

    /// Deframer counters.
    #[must_use]
    pub fn stats(&self) -> DeframerStats {
        self.deframer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
    }

    /// Publish a link state change; going down discards any partial frame.
    pub fn set_state(&self, state: LinkState) {
        debug!(?state, "mx1 link state");
        if state == LinkState::Disconnected {
            self.deframer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .reset();
        }
        self.events.publish(&LinkEvent::State(state));
    }
}
