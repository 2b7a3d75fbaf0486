//! Immutable ZCAN packet with lazily resolved adapters

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use bytes::Bytes;

use super::can_id::{CanId, CanIdFields};
use super::specialisation::{Specialisation, SpecialisationRegistry};
use super::{CommandGroup, CommandMode, Error, Result};
use crate::util::to_hex;

type AdapterSlot = Arc<OnceLock<Option<Arc<dyn Any + Send + Sync>>>>;

/// ZCAN packet
///
/// Cloning is cheap and shares the adapter cache. Equality compares the
/// routing fields and the payload only.
#[derive(Clone)]
pub struct Packet {
    inner: Arc<PacketInner>,
}

struct PacketInner {
    group: u8,
    command: u8,
    mode: CommandMode,
    sender: u16,
    payload: Bytes,
    registry: Arc<SpecialisationRegistry>,
    adapters: Mutex<HashMap<TypeId, AdapterSlot>>,
}

impl Packet {
    /// Create a packet resolving adapters against the shared default registry.
    pub fn new(
        group: u8,
        mode: CommandMode,
        command: u8,
        sender: u16,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::with_registry(
            SpecialisationRegistry::shared(),
            group,
            mode,
            command,
            sender,
            payload,
        )
    }

    /// Create a packet resolving adapters against `registry`.
    pub fn with_registry(
        registry: Arc<SpecialisationRegistry>,
        group: u8,
        mode: CommandMode,
        command: u8,
        sender: u16,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            inner: Arc::new(PacketInner {
                group,
                command,
                mode,
                sender,
                payload: payload.into(),
                registry,
                adapters: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create a packet from decoded identifier fields.
    pub fn from_fields(fields: CanIdFields, payload: impl Into<Bytes>) -> Self {
        Self::new(
            fields.group.as_u8(),
            fields.mode,
            fields.command,
            fields.sender,
            payload,
        )
    }

    /// Create a packet from a raw CAN identifier and its data bytes.
    pub fn from_can_id(id: CanId, payload: impl Into<Bytes>) -> Result<Self> {
        Ok(Self::from_fields(id.decode()?, payload))
    }

    /// Canonical CAN identifier of this packet.
    ///
    /// Fails with [`Error::UnknownEncoding`] for groups this crate does not
    /// know and [`Error::CommandOutOfRange`] for commands wider than 6 bits.
    pub fn can_id(&self) -> Result<CanId> {
        let Some(group) = self.command_group() else {
            return Err(Error::UnknownEncoding {
                can_id: (u32::from(self.inner.group) << 24) | u32::from(self.inner.sender),
            });
        };
        CanId::encode(group, self.inner.mode, self.inner.command, self.inner.sender)
    }

    /// Raw command group magic
    #[must_use]
    pub fn group_magic(&self) -> u8 {
        self.inner.group
    }

    /// Command group, `None` for groups this crate does not know
    #[must_use]
    pub fn command_group(&self) -> Option<CommandGroup> {
        CommandGroup::from_u8(self.inner.group)
    }

    /// Command magic
    #[must_use]
    pub fn command(&self) -> u8 {
        self.inner.command
    }

    /// Command mode
    #[must_use]
    pub fn command_mode(&self) -> CommandMode {
        self.inner.mode
    }

    /// Sender network identifier
    #[must_use]
    pub fn sender(&self) -> u16 {
        self.inner.sender
    }

    /// Declared payload length
    #[must_use]
    pub fn dlc(&self) -> usize {
        self.inner.payload.len()
    }

    /// Read-only view of the payload, positioned at 0.
    ///
    /// Fields are little-endian; read them through [`bytes::Buf`].
    #[must_use]
    pub fn data(&self) -> Bytes {
        self.inner.payload.clone()
    }

    /// Borrow the payload bytes
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.inner.payload
    }

    /// Registry used for adapter resolution
    #[must_use]
    pub fn registry(&self) -> &Arc<SpecialisationRegistry> {
        &self.inner.registry
    }

    /// Non-owning reference for adapters.
    #[must_use]
    pub fn downgrade(&self) -> PacketRef {
        PacketRef(Arc::downgrade(&self.inner))
    }

    /// Whether both handles refer to the same packet instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Resolve the adapter of capability `T`.
    ///
    /// The first call constructs the adapter through the registry, later
    /// calls return the same instance. Construction runs exactly once per
    /// capability even when called concurrently. Returns `None` when no
    /// factory accepts this packet or the payload is malformed.
    #[must_use]
    pub fn adapter<T: Specialisation>(&self) -> Option<Arc<T>> {
        let slot = {
            let mut adapters = self
                .inner
                .adapters
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(adapters.entry(TypeId::of::<T>()).or_default())
        };

        let resolved = slot.get_or_init(|| self.inner.registry.resolve(TypeId::of::<T>(), self));
        resolved
            .as_ref()
            .and_then(|adapter| Arc::clone(adapter).downcast::<T>().ok())
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.inner.group == other.inner.group
            && self.inner.command == other.inner.command
            && self.inner.mode == other.inner.mode
            && self.inner.sender == other.inner.sender
            && self.inner.payload == other.inner.payload
    }
}

impl Eq for Packet {}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("group", &format_args!("{:#04x}", self.inner.group))
            .field("command", &format_args!("{:#04x}", self.inner.command))
            .field("mode", &self.inner.mode)
            .field("sender", &format_args!("{:#06x}", self.inner.sender))
            .field("payload", &to_hex(&self.inner.payload))
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command_group() {
            Some(group) => write!(f, "{group}")?,
            None => write!(f, "{:#04x}", self.inner.group)?,
        }
        write!(
            f,
            "/{:#04x}/{} from {:#06x} [{}]",
            self.inner.command,
            self.inner.mode,
            self.inner.sender,
            to_hex(&self.inner.payload)
        )
    }
}

/// Weak back-reference from an adapter to its packet.
#[derive(Clone, Default)]
pub struct PacketRef(Weak<PacketInner>);

impl PacketRef {
    /// Upgrade to the packet while it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Packet> {
        self.0.upgrade().map(|inner| Packet { inner })
    }

    /// Whether this reference points at `packet`.
    #[must_use]
    pub fn refers_to(&self, packet: &Packet) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&packet.inner))
    }
}

impl fmt::Debug for PacketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PacketRef(..)")
    }
}
