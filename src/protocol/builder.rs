//! Semantic packet construction
//!
//! Every semantic operation is a pure function of its arguments. Payload
//! fields are little-endian, in argument order, without padding.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use super::command::{accessory, config, data, info, network, system, vehicle};
use super::specialisation::SpecialisationRegistry;
use super::{
    CommandGroup, CommandMode, DataGroup, Error, LocoFlags, MAX_DLC, Packet, PowerOutputs,
    PowerState, Result, command,
};

/// Builds packets originating from one sender NID.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    sender: u16,
    registry: Arc<SpecialisationRegistry>,
    group: u8,
    command: u8,
    mode: CommandMode,
    data: Bytes,
}

impl PacketBuilder {
    /// Create a builder for packets sent by `sender`.
    #[must_use]
    pub fn new(sender: u16) -> Self {
        Self::with_registry(sender, SpecialisationRegistry::shared())
    }

    /// Create a builder whose packets resolve adapters against `registry`.
    #[must_use]
    pub fn with_registry(sender: u16, registry: Arc<SpecialisationRegistry>) -> Self {
        Self {
            sender,
            registry,
            group: CommandGroup::System.as_u8(),
            command: 0,
            mode: CommandMode::Request,
            data: Bytes::new(),
        }
    }

    /// Sender NID stamped on every packet
    #[must_use]
    pub fn sender(&self) -> u16 {
        self.sender
    }

    fn packet(
        &self,
        group: CommandGroup,
        command: u8,
        mode: CommandMode,
        payload: BytesMut,
    ) -> Packet {
        debug_assert!(payload.len() <= MAX_DLC);
        Packet::with_registry(
            Arc::clone(&self.registry),
            group.as_u8(),
            mode,
            command,
            self.sender,
            payload.freeze(),
        )
    }

    /// Open a session.
    #[must_use]
    pub fn login(&self) -> Packet {
        self.packet(
            CommandGroup::Network,
            network::LOGIN,
            CommandMode::Request,
            BytesMut::new(),
        )
    }

    /// Close the session with `master`.
    #[must_use]
    pub fn logout(&self, master: u16) -> Packet {
        let mut payload = BytesMut::with_capacity(2);
        payload.put_u16_le(master);
        self.packet(
            CommandGroup::Network,
            network::LOGOUT,
            CommandMode::Command,
            payload,
        )
    }

    /// Switch the power state of `outputs` on `master`.
    #[must_use]
    pub fn power_mode(&self, master: u16, outputs: PowerOutputs, state: PowerState) -> Packet {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u16_le(master);
        payload.put_u8(outputs.bits());
        payload.put_u8(state.as_u8());
        self.packet(
            CommandGroup::System,
            system::POWER_MODE,
            CommandMode::Command,
            payload,
        )
    }

    /// Query the power state of `outputs` on `master`.
    #[must_use]
    pub fn power_mode_query(&self, master: u16, outputs: PowerOutputs) -> Packet {
        let mut payload = BytesMut::with_capacity(3);
        payload.put_u16_le(master);
        payload.put_u8(outputs.bits());
        self.packet(
            CommandGroup::System,
            system::POWER_MODE,
            CommandMode::Request,
            payload,
        )
    }

    /// Query the full state of a loco.
    #[must_use]
    pub fn loco_state(&self, nid: u16) -> Packet {
        let mut payload = BytesMut::with_capacity(2);
        payload.put_u16_le(nid);
        self.packet(
            CommandGroup::Vehicle,
            vehicle::LOCO_STATE,
            CommandMode::Request,
            payload,
        )
    }

    /// Set the decoder mode of a loco.
    #[must_use]
    pub fn loco_mode(&self, nid: u16, mode: u8) -> Packet {
        let mut payload = BytesMut::with_capacity(3);
        payload.put_u16_le(nid);
        payload.put_u8(mode);
        self.packet(
            CommandGroup::Vehicle,
            vehicle::LOCO_MODE,
            CommandMode::Command,
            payload,
        )
    }

    /// Set speed and direction of a loco.
    #[must_use]
    pub fn loco_speed(&self, nid: u16, speed: u16, flags: LocoFlags) -> Packet {
        let mut payload = BytesMut::with_capacity(5);
        payload.put_u16_le(nid);
        payload.put_u16_le(speed);
        payload.put_u8(flags.as_u8());
        self.packet(
            CommandGroup::Vehicle,
            vehicle::LOCO_SPEED,
            CommandMode::Command,
            payload,
        )
    }

    /// Switch a loco function.
    #[must_use]
    pub fn loco_function(&self, nid: u16, function: u16, on: bool) -> Packet {
        let mut payload = BytesMut::with_capacity(5);
        payload.put_u16_le(nid);
        payload.put_u16_le(function);
        payload.put_u8(u8::from(on));
        self.packet(
            CommandGroup::Vehicle,
            vehicle::LOCO_FUNCTION,
            CommandMode::Command,
            payload,
        )
    }

    /// Mark a loco active so the station reports its state changes.
    #[must_use]
    pub fn loco_active(&self, nid: u16) -> Packet {
        let mut payload = BytesMut::with_capacity(2);
        payload.put_u16_le(nid);
        self.packet(
            CommandGroup::Vehicle,
            vehicle::LOCO_ACTIVE,
            CommandMode::Request,
            payload,
        )
    }

    /// Read a configuration variable.
    #[must_use]
    pub fn cv_read(&self, nid: u16, cv: u16) -> Packet {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u16_le(nid);
        payload.put_u16_le(cv);
        self.packet(
            CommandGroup::Config,
            config::CV_READ,
            CommandMode::Command,
            payload,
        )
    }

    /// Write a configuration variable.
    #[must_use]
    pub fn cv_write(&self, nid: u16, cv: u16, value: u16) -> Packet {
        let mut payload = BytesMut::with_capacity(6);
        payload.put_u16_le(nid);
        payload.put_u16_le(cv);
        payload.put_u16_le(value);
        self.packet(
            CommandGroup::Config,
            config::CV_WRITE,
            CommandMode::Command,
            payload,
        )
    }

    /// Ask `master` how many objects `group` holds.
    #[must_use]
    pub fn data_group_count(&self, master: u16, group: DataGroup) -> Packet {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u16_le(master);
        payload.put_u16_le(group.as_u16());
        self.packet(
            CommandGroup::Data,
            data::GROUP_COUNT,
            CommandMode::Request,
            payload,
        )
    }

    /// Ask `master` for the object at `index` of `group`.
    #[must_use]
    pub fn data_item_by_index(&self, master: u16, group: DataGroup, index: u16) -> Packet {
        let mut payload = BytesMut::with_capacity(6);
        payload.put_u16_le(master);
        payload.put_u16_le(group.as_u16());
        payload.put_u16_le(index);
        self.packet(
            CommandGroup::Data,
            data::ITEM_BY_INDEX,
            CommandMode::Request,
            payload,
        )
    }

    /// Ask `master` for the object with `nid`.
    #[must_use]
    pub fn data_item_by_nid(&self, master: u16, nid: u16) -> Packet {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u16_le(master);
        payload.put_u16_le(nid);
        self.packet(
            CommandGroup::Data,
            data::ITEM_BY_NID,
            CommandMode::Request,
            payload,
        )
    }

    /// Configure an accessory output port.
    #[must_use]
    pub fn output_config(&self, nid: u16, port: u8, config: u8) -> Packet {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u16_le(nid);
        payload.put_u8(port);
        payload.put_u8(config);
        self.packet(
            CommandGroup::Accessory,
            accessory::OUTPUT_CONFIG,
            CommandMode::Command,
            payload,
        )
    }

    /// Query a module descriptor.
    #[must_use]
    pub fn module_info(&self, nid: u16, info_type: u16) -> Packet {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u16_le(nid);
        payload.put_u16_le(info_type);
        self.packet(
            CommandGroup::Info,
            info::MODULE_INFO,
            CommandMode::Request,
            payload,
        )
    }

    /// Set the group for [`build`](Self::build).
    #[must_use]
    pub fn command_group(mut self, group: CommandGroup) -> Self {
        self.group = group.as_u8();
        self
    }

    /// Set the command for [`build`](Self::build).
    #[must_use]
    pub fn command(mut self, command: u8) -> Self {
        self.command = command;
        self
    }

    /// Set the mode for [`build`](Self::build).
    #[must_use]
    pub fn command_mode(mut self, mode: CommandMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the payload for [`build`](Self::build).
    #[must_use]
    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    /// Build a packet from the generic fields.
    pub fn build(&self) -> Result<Packet> {
        if self.command > command::MAX {
            return Err(Error::CommandOutOfRange {
                command: self.command,
            });
        }
        if self.data.len() > MAX_DLC {
            return Err(Error::PayloadTooLarge {
                size: self.data.len(),
                max: MAX_DLC,
            });
        }

        Ok(Packet::with_registry(
            Arc::clone(&self.registry),
            self.group,
            self.mode,
            self.command,
            self.sender,
            self.data.clone(),
        ))
    }
}
