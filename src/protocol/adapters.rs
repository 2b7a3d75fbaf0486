//! Built-in adapters over reply and event packets

use bytes::{Buf, Bytes};
use tracing::warn;

use super::command::{config, data, info, network, system, vehicle};
use super::specialisation::{Factory, Specialisation, SpecialisationRegistry};
use super::{
    CommandGroup, CommandMode, DataGroup, Error, LocoFlags, Packet, PacketRef, PowerOutputs,
    PowerState, Result,
};

/// Payload cursor checked against the capability's minimum length.
fn payload_at_least(packet: &Packet, capability: &'static str, needed: usize) -> Result<Bytes> {
    let data = packet.data();
    if data.remaining() < needed {
        return Err(Error::MalformedPayload {
            capability,
            needed,
            got: data.remaining(),
        });
    }
    Ok(data)
}

const fn is_reply(mode: CommandMode) -> bool {
    matches!(mode, CommandMode::Event | CommandMode::Ack)
}

/// Command station answer to a login.
#[derive(Debug)]
pub struct LoginReply {
    origin: PacketRef,
    master: u16,
}

impl LoginReply {
    /// NID of the station that accepted the session
    #[must_use]
    pub fn master(&self) -> u16 {
        self.master
    }

    /// Packet this view was built from
    #[must_use]
    pub fn packet(&self) -> Option<Packet> {
        self.origin.upgrade()
    }
}

impl Specialisation for LoginReply {
    fn from_packet(packet: &Packet) -> Result<Self> {
        let mut data = payload_at_least(packet, "LoginReply", 2)?;
        Ok(Self {
            origin: packet.downgrade(),
            master: data.get_u16_le(),
        })
    }
}

/// Track power state report.
#[derive(Debug)]
pub struct PowerStateReport {
    origin: PacketRef,
    master: u16,
    outputs: PowerOutputs,
    state: u8,
}

impl PowerStateReport {
    /// Reporting station
    #[must_use]
    pub fn master(&self) -> u16 {
        self.master
    }

    /// Outputs the state applies to
    #[must_use]
    pub fn outputs(&self) -> PowerOutputs {
        self.outputs
    }

    /// Reported state, `None` for codes this crate does not know
    #[must_use]
    pub fn state(&self) -> Option<PowerState> {
        PowerState::from_u8(self.state)
    }

    /// Packet this view was built from
    #[must_use]
    pub fn packet(&self) -> Option<Packet> {
        self.origin.upgrade()
    }
}

impl Specialisation for PowerStateReport {
    fn from_packet(packet: &Packet) -> Result<Self> {
        let mut data = payload_at_least(packet, "PowerStateReport", 4)?;
        Ok(Self {
            origin: packet.downgrade(),
            master: data.get_u16_le(),
            outputs: PowerOutputs::from_bits(data.get_u8()),
            state: data.get_u8(),
        })
    }
}

/// Speed and direction of a loco.
#[derive(Debug)]
pub struct LocoSpeedReport {
    origin: PacketRef,
    nid: u16,
    speed: u16,
    flags: u8,
}

impl LocoSpeedReport {
    /// Loco NID
    #[must_use]
    pub fn nid(&self) -> u16 {
        self.nid
    }

    /// Speed step
    #[must_use]
    pub fn speed(&self) -> u16 {
        self.speed
    }

    /// Direction and state flags; bits this crate does not define are dropped
    #[must_use]
    pub fn flags(&self) -> LocoFlags {
        LocoFlags::from_u8(self.flags & LocoFlags::VALID_MASK).unwrap_or_default()
    }

    /// Packet this view was built from
    #[must_use]
    pub fn packet(&self) -> Option<Packet> {
        self.origin.upgrade()
    }
}

impl Specialisation for LocoSpeedReport {
    fn from_packet(packet: &Packet) -> Result<Self> {
        let mut data = payload_at_least(packet, "LocoSpeedReport", 5)?;
        Ok(Self {
            origin: packet.downgrade(),
            nid: data.get_u16_le(),
            speed: data.get_u16_le(),
            flags: data.get_u8(),
        })
    }
}

/// Function state of a loco.
#[derive(Debug)]
pub struct LocoFunctionReport {
    origin: PacketRef,
    nid: u16,
    function: u16,
    on: bool,
}

impl LocoFunctionReport {
    /// Loco NID
    #[must_use]
    pub fn nid(&self) -> u16 {
        self.nid
    }

    /// Function number
    #[must_use]
    pub fn function(&self) -> u16 {
        self.function
    }

    /// Whether the function is switched on
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Packet this view was built from
    #[must_use]
    pub fn packet(&self) -> Option<Packet> {
        self.origin.upgrade()
    }
}

impl Specialisation for LocoFunctionReport {
    fn from_packet(packet: &Packet) -> Result<Self> {
        let mut data = payload_at_least(packet, "LocoFunctionReport", 5)?;
        Ok(Self {
            origin: packet.downgrade(),
            nid: data.get_u16_le(),
            function: data.get_u16_le(),
            on: data.get_u8() != 0,
        })
    }
}

/// Result of a CV read.
#[derive(Debug)]
pub struct CvValueReport {
    origin: PacketRef,
    nid: u16,
    cv: u16,
    value: u16,
}

impl CvValueReport {
    /// Decoder NID
    #[must_use]
    pub fn nid(&self) -> u16 {
        self.nid
    }

    /// CV number
    #[must_use]
    pub fn cv(&self) -> u16 {
        self.cv
    }

    /// CV value
    #[must_use]
    pub fn value(&self) -> u16 {
        self.value
    }

    /// Packet this view was built from
    #[must_use]
    pub fn packet(&self) -> Option<Packet> {
        self.origin.upgrade()
    }
}

impl Specialisation for CvValueReport {
    fn from_packet(packet: &Packet) -> Result<Self> {
        let mut data = payload_at_least(packet, "CvValueReport", 6)?;
        Ok(Self {
            origin: packet.downgrade(),
            nid: data.get_u16_le(),
            cv: data.get_u16_le(),
            value: data.get_u16_le(),
        })
    }
}

/// Number of objects in a data group.
#[derive(Debug)]
pub struct DataGroupCountReply {
    origin: PacketRef,
    master: u16,
    group: u16,
    count: u16,
}

impl DataGroupCountReply {
    /// Answering station
    #[must_use]
    pub fn master(&self) -> u16 {
        self.master
    }

    /// Queried data group
    #[must_use]
    pub fn group(&self) -> Option<DataGroup> {
        DataGroup::from_u16(self.group)
    }

    /// Object count
    #[must_use]
    pub fn count(&self) -> u16 {
        self.count
    }

    /// Packet this view was built from
    #[must_use]
    pub fn packet(&self) -> Option<Packet> {
        self.origin.upgrade()
    }
}

impl Specialisation for DataGroupCountReply {
    fn from_packet(packet: &Packet) -> Result<Self> {
        let mut data = payload_at_least(packet, "DataGroupCountReply", 6)?;
        Ok(Self {
            origin: packet.downgrade(),
            master: data.get_u16_le(),
            group: data.get_u16_le(),
            count: data.get_u16_le(),
        })
    }
}

/// Object found at a data group index.
#[derive(Debug)]
pub struct DataItemReply {
    origin: PacketRef,
    master: u16,
    group: u16,
    index: u16,
    nid: u16,
}

impl DataItemReply {
    /// Answering station
    #[must_use]
    pub fn master(&self) -> u16 {
        self.master
    }

    /// Queried data group
    #[must_use]
    pub fn group(&self) -> Option<DataGroup> {
        DataGroup::from_u16(self.group)
    }

    /// List index
    #[must_use]
    pub fn index(&self) -> u16 {
        self.index
    }

    /// NID of the object at `index`
    #[must_use]
    pub fn nid(&self) -> u16 {
        self.nid
    }

    /// Packet this view was built from
    #[must_use]
    pub fn packet(&self) -> Option<Packet> {
        self.origin.upgrade()
    }
}

impl Specialisation for DataItemReply {
    fn from_packet(packet: &Packet) -> Result<Self> {
        let mut data = payload_at_least(packet, "DataItemReply", 8)?;
        Ok(Self {
            origin: packet.downgrade(),
            master: data.get_u16_le(),
            group: data.get_u16_le(),
            index: data.get_u16_le(),
            nid: data.get_u16_le(),
        })
    }
}

/// Module descriptor value.
#[derive(Debug)]
pub struct ModuleInfoReport {
    origin: PacketRef,
    nid: u16,
    info_type: u16,
    value: u32,
}

impl ModuleInfoReport {
    /// Module NID
    #[must_use]
    pub fn nid(&self) -> u16 {
        self.nid
    }

    /// Descriptor type
    #[must_use]
    pub fn info_type(&self) -> u16 {
        self.info_type
    }

    /// Descriptor value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Packet this view was built from
    #[must_use]
    pub fn packet(&self) -> Option<Packet> {
        self.origin.upgrade()
    }
}

impl Specialisation for ModuleInfoReport {
    fn from_packet(packet: &Packet) -> Result<Self> {
        let mut data = payload_at_least(packet, "ModuleInfoReport", 8)?;
        Ok(Self {
            origin: packet.downgrade(),
            nid: data.get_u16_le(),
            info_type: data.get_u16_le(),
            value: data.get_u32_le(),
        })
    }
}

/// Register every built-in adapter.
pub(crate) fn register_builtins(registry: &SpecialisationRegistry) {
    let results = [
        registry.register(Factory::<LoginReply>::new(|g, c, m| {
            g == CommandGroup::Network && c == network::LOGIN && m == CommandMode::Ack
        })),
        registry.register(Factory::<PowerStateReport>::new(|g, c, m| {
            g == CommandGroup::System && c == system::POWER_MODE && is_reply(m)
        })),
        registry.register(Factory::<LocoSpeedReport>::new(|g, c, m| {
            g == CommandGroup::Vehicle && c == vehicle::LOCO_SPEED && is_reply(m)
        })),
        registry.register(Factory::<LocoFunctionReport>::new(|g, c, m| {
            g == CommandGroup::Vehicle && c == vehicle::LOCO_FUNCTION && is_reply(m)
        })),
        registry.register(Factory::<CvValueReport>::new(|g, c, m| {
            g == CommandGroup::Config && c == config::CV_READ && is_reply(m)
        })),
        registry.register(Factory::<DataGroupCountReply>::new(|g, c, m| {
            g == CommandGroup::Data && c == data::GROUP_COUNT && m == CommandMode::Ack
        })),
        registry.register(Factory::<DataItemReply>::new(|g, c, m| {
            g == CommandGroup::Data && c == data::ITEM_BY_INDEX && m == CommandMode::Ack
        })),
        registry.register(Factory::<ModuleInfoReport>::new(|g, c, m| {
            g == CommandGroup::Info && c == info::MODULE_INFO && m == CommandMode::Ack
        })),
    ];

    for err in results.into_iter().filter_map(Result::err) {
        warn!(error = %err, "built-in adapter not registered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(group: CommandGroup, command: u8, mode: CommandMode, payload: &[u8]) -> Packet {
        Packet::new(group.as_u8(), mode, command, 0xC0DE, payload.to_vec())
    }

    #[test]
    fn test_power_state_report() {
        let packet = reply(
            CommandGroup::System,
            system::POWER_MODE,
            CommandMode::Event,
            &[0xFE, 0xCA, PowerOutputs::TRACK_1, PowerState::On.as_u8()],
        );
        let report = packet.adapter::<PowerStateReport>().unwrap();
        assert_eq!(report.master(), 0xCAFE);
        assert!(report.outputs().contains(PowerOutputs::TRACK_1));
        assert_eq!(report.state(), Some(PowerState::On));
        assert!(report.packet().unwrap().ptr_eq(&packet));
    }

    #[test]
    fn test_power_command_has_no_report() {
        let packet = reply(
            CommandGroup::System,
            system::POWER_MODE,
            CommandMode::Command,
            &[0xFE, 0xCA, 0x01, 0x01],
        );
        assert!(packet.adapter::<PowerStateReport>().is_none());
    }

    #[test]
    fn test_short_payload_yields_none() {
        let packet = reply(
            CommandGroup::Vehicle,
            vehicle::LOCO_SPEED,
            CommandMode::Ack,
            &[0x03, 0x00, 0x10],
        );
        assert!(packet.adapter::<LocoSpeedReport>().is_none());
    }

    #[test]
    fn test_loco_speed_report() {
        let packet = reply(
            CommandGroup::Vehicle,
            vehicle::LOCO_SPEED,
            CommandMode::Ack,
            &[0x03, 0x00, 0x7F, 0x00, LocoFlags::FORWARD | 0x80],
        );
        let report = packet.adapter::<LocoSpeedReport>().unwrap();
        assert_eq!(report.nid(), 3);
        assert_eq!(report.speed(), 127);
        assert!(report.flags().is_forward());
    }

    #[test]
    fn test_cv_and_function_reports() {
        let cv = reply(
            CommandGroup::Config,
            config::CV_READ,
            CommandMode::Ack,
            &[0x03, 0x00, 0x1D, 0x00, 0x06, 0x00],
        );
        let cv = cv.adapter::<CvValueReport>().unwrap();
        assert_eq!((cv.nid(), cv.cv(), cv.value()), (3, 29, 6));

        let function = reply(
            CommandGroup::Vehicle,
            vehicle::LOCO_FUNCTION,
            CommandMode::Event,
            &[0x03, 0x00, 0x05, 0x00, 0x01],
        );
        let function = function.adapter::<LocoFunctionReport>().unwrap();
        assert_eq!(function.function(), 5);
        assert!(function.is_on());
    }

    #[test]
    fn test_data_replies() {
        let count = reply(
            CommandGroup::Data,
            data::GROUP_COUNT,
            CommandMode::Ack,
            &[0xFE, 0xCA, 0x00, 0x2F, 0x0C, 0x00],
        );
        let count = count.adapter::<DataGroupCountReply>().unwrap();
        assert_eq!(count.group(), Some(DataGroup::Vehicles));
        assert_eq!(count.count(), 12);

        let item = reply(
            CommandGroup::Data,
            data::ITEM_BY_INDEX,
            CommandMode::Ack,
            &[0xFE, 0xCA, 0x00, 0x2F, 0x02, 0x00, 0x34, 0x12],
        );
        let item = item.adapter::<DataItemReply>().unwrap();
        assert_eq!((item.index(), item.nid()), (2, 0x1234));
    }

    #[test]
    fn test_login_and_module_info() {
        let login = reply(
            CommandGroup::Network,
            network::LOGIN,
            CommandMode::Ack,
            &[0xFE, 0xCA],
        );
        assert_eq!(login.adapter::<LoginReply>().unwrap().master(), 0xCAFE);

        let info = reply(
            CommandGroup::Info,
            info::MODULE_INFO,
            CommandMode::Ack,
            &[0x01, 0x00, 0x02, 0x00, 0x78, 0x56, 0x34, 0x12],
        );
        let info = info.adapter::<ModuleInfoReport>().unwrap();
        assert_eq!(info.value(), 0x1234_5678);
    }

    #[test]
    fn test_wrong_capability_yields_none() {
        let login = reply(
            CommandGroup::Network,
            network::LOGIN,
            CommandMode::Ack,
            &[0xFE, 0xCA],
        );
        assert!(login.adapter::<PowerStateReport>().is_none());
    }
}
