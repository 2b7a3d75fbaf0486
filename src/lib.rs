//! Binary protocol engine for ZIMO digital command stations
//!
//! Two transports share this core:
//!
//! - **ZCAN over UDP**: packets addressed by a 32-bit CAN identifier and
//!   marshalled behind an 8-byte little-endian header.
//! - **MX1 serial**: byte-stuffed frames delimited by `SOH`/`EOT` and
//!   protected by a CRC-8.
//!
//! # Quick Start
//!
//! ```rust
//! use zimo_wire::{PacketBuilder, marshal_to_vec, unmarshal};
//!
//! let login = PacketBuilder::new(0xCAFE).login();
//! let bytes = marshal_to_vec(&login)?;
//! assert_eq!(bytes.len(), 8);
//!
//! let decoded = unmarshal(&bytes)?;
//! assert_eq!(decoded, login);
//! # Ok::<(), zimo_wire::Error>(())
//! ```
//!
//! Replies are read through typed adapters resolved on demand:
//!
//! ```rust
//! use zimo_wire::protocol::{CommandGroup, CommandMode, Packet, PowerStateReport, command};
//!
//! let event = Packet::new(
//!     CommandGroup::System.as_u8(),
//!     CommandMode::Event,
//!     command::system::POWER_MODE,
//!     0xCAFE,
//!     vec![0xFE, 0xCA, 0x01, 0x01],
//! );
//! let report = event.adapter::<PowerStateReport>().expect("power report");
//! assert_eq!(report.master(), 0xCAFE);
//! ```
//!
//! # Features
//!
//! - `serde`: `Serialize`/`Deserialize` for the protocol enums and flag sets
//! - `debug-tools`: capture every frame a link sends or receives to a file

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod protocol;
pub mod serial;
pub mod transport;
pub mod util;

pub use protocol::{
    CanId, CommandGroup, CommandMode, Error, HEADER_SIZE, MAX_DLC, Packet, PacketBuilder, Result,
    marshal, marshal_to_vec, unmarshal,
};
pub use serial::{Mx1Config, Mx1Deframer};
pub use transport::{BufferPool, LinkConfig, Mx1Link, ZcanLink};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default UDP port of the command station
pub const DEFAULT_PORT: u16 = 14520;
