//! Adapter factories and the registry packets resolve them from
//!
//! A factory pairs a validity predicate over `(group, command, mode)` with a
//! constructor for one capability type. Validity never looks at payload
//! bytes; only the constructor may reject a malformed payload.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{trace, warn};

use super::adapters;
use super::{CommandGroup, CommandMode, Error, Packet, Result};

/// Typed read-only view over a packet payload.
///
/// `from_packet` must not resolve an adapter of its own type on the same
/// packet.
pub trait Specialisation: Any + Send + Sync + Sized {
    /// Build the view, failing with [`Error::MalformedPayload`] on short payloads.
    fn from_packet(packet: &Packet) -> Result<Self>;
}

/// Rule that constructs one capability for the triples it accepts.
pub trait SpecialisationFactory: Send + Sync {
    /// Capability produced by [`create`](Self::create).
    fn capability(&self) -> TypeId;

    /// Human readable capability name for logs.
    fn capability_name(&self) -> &'static str;

    /// Whether this factory applies to the routing triple.
    fn is_valid(&self, group: CommandGroup, command: u8, mode: CommandMode) -> bool;

    /// Construct the adapter.
    fn create(&self, packet: &Packet) -> Result<Arc<dyn Any + Send + Sync>>;
}

/// Factory built from a predicate and [`Specialisation::from_packet`].
pub struct Factory<T> {
    predicate: fn(CommandGroup, u8, CommandMode) -> bool,
    _capability: PhantomData<fn() -> T>,
}

impl<T: Specialisation> Factory<T> {
    /// Create a factory accepting the triples matched by `predicate`.
    #[must_use]
    pub const fn new(predicate: fn(CommandGroup, u8, CommandMode) -> bool) -> Self {
        Self {
            predicate,
            _capability: PhantomData,
        }
    }
}

impl<T: Specialisation> SpecialisationFactory for Factory<T> {
    fn capability(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn capability_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn is_valid(&self, group: CommandGroup, command: u8, mode: CommandMode) -> bool {
        (self.predicate)(group, command, mode)
    }

    fn create(&self, packet: &Packet) -> Result<Arc<dyn Any + Send + Sync>> {
        let adapter: Arc<dyn Any + Send + Sync> = Arc::new(T::from_packet(packet)?);
        Ok(adapter)
    }
}

impl<T> fmt::Debug for Factory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("capability", &type_name::<T>())
            .finish()
    }
}

/// Ordered set of factories; the first valid one for a capability wins.
#[derive(Default)]
pub struct SpecialisationRegistry {
    factories: RwLock<Vec<Arc<dyn SpecialisationFactory>>>,
}

impl SpecialisationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in adapters.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        adapters::register_builtins(&registry);
        registry
    }

    /// Process-wide registry used by [`Packet::new`].
    #[must_use]
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<SpecialisationRegistry>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::with_builtins())))
    }

    /// Add a factory.
    ///
    /// Fails with [`Error::ConflictingFactory`] when any triple it accepts
    /// is already claimed by a registered factory. Every `u8` command is
    /// checked since packets may carry commands wider than the 6-bit field.
    pub fn register(&self, factory: impl SpecialisationFactory + 'static) -> Result<()> {
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        for group in CommandGroup::ALL {
            for cmd in 0..=u8::MAX {
                for mode in CommandMode::ALL {
                    if factory.is_valid(group, cmd, mode)
                        && factories.iter().any(|f| f.is_valid(group, cmd, mode))
                    {
                        return Err(Error::ConflictingFactory {
                            group,
                            command: cmd,
                            mode,
                        });
                    }
                }
            }
        }

        trace!(capability = factory.capability_name(), "registered factory");
        factories.push(Arc::new(factory));
        Ok(())
    }

    /// Number of registered factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no factory is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Construct the adapter of `capability` for `packet`, if any factory applies.
    ///
    /// Construction failures are logged and yield `None`.
    pub fn resolve(
        &self,
        capability: TypeId,
        packet: &Packet,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        let group = packet.command_group()?;
        let factory = {
            let factories = self
                .factories
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            factories
                .iter()
                .find(|f| {
                    f.capability() == capability
                        && f.is_valid(group, packet.command(), packet.command_mode())
                })
                .cloned()?
        };

        match factory.create(packet) {
            Ok(adapter) => Some(adapter),
            Err(err) => {
                warn!(
                    capability = factory.capability_name(),
                    %packet,
                    error = %err,
                    "adapter construction failed"
                );
                None
            }
        }
    }
}

impl fmt::Debug for SpecialisationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factories = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_list()
            .entries(factories.iter().map(|f| f.capability_name()))
            .finish()
    }
}
