//! Transport glue: buffer pool, byte channels, listeners and links

mod buffer;
mod channel;
#[cfg(feature = "debug-tools")]
mod debug;
mod events;
mod link;

pub use buffer::{BufferItem, BufferPool, PoolConfig};
pub use channel::{ByteChannel, MemoryChannel};
#[cfg(feature = "debug-tools")]
pub use debug::{Direction, FrameRecorder};
pub use events::{EventBus, LinkEvent, LinkState, SubscriptionId};
pub use link::{LinkConfig, Mx1Link, ZcanLink};
