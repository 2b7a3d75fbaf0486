//! ZCAN protocol core
//!
//! Identifier codec, packet model, adapter resolution, the packet builder
//! and the UDP wire marshaller.

mod adapters;
mod builder;
mod can_id;
mod codec;
mod error;
mod packet;
mod specialisation;
mod types;

pub use adapters::{
    CvValueReport, DataGroupCountReply, DataItemReply, LocoFunctionReport, LocoSpeedReport,
    LoginReply, ModuleInfoReport, PowerStateReport,
};
pub use builder::PacketBuilder;
pub use can_id::{CanId, CanIdFields};
pub use codec::{Frames, marshal, marshal_to_vec, marshalled_len, unmarshal, unmarshal_all, unmarshal_in};
pub use error::{Error, Result};
pub use packet::{Packet, PacketRef};
pub use specialisation::{Factory, Specialisation, SpecialisationFactory, SpecialisationRegistry};
pub use types::{
    CommandGroup, CommandMode, DataGroup, LocoFlags, PacketFlags, PowerOutputs, PowerState,
    command,
};

/// UDP frame header size in bytes
pub const HEADER_SIZE: usize = 8;

/// Maximum CAN payload length (DLC)
pub const MAX_DLC: usize = 8;

/// Largest marshalled frame of a CAN-sized packet
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_DLC;
