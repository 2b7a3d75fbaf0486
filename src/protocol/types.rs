//! Command groups, modes, command magics and flag sets

use std::fmt;

/// ZCAN command groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CommandGroup {
    /// Track power and system control
    System = 0x00,
    /// Accessory decoders and outputs
    Accessory = 0x01,
    /// Locomotive control
    Vehicle = 0x02,
    /// Module information
    Info = 0x04,
    /// Object database queries
    Data = 0x07,
    /// Decoder configuration (CVs)
    Config = 0x08,
    /// Network session handling
    Network = 0x0A,
}

impl CommandGroup {
    /// Every defined group, in magic order.
    pub const ALL: [Self; 7] = [
        Self::System,
        Self::Accessory,
        Self::Vehicle,
        Self::Info,
        Self::Data,
        Self::Config,
        Self::Network,
    ];

    /// Convert from magic
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::System),
            0x01 => Some(Self::Accessory),
            0x02 => Some(Self::Vehicle),
            0x04 => Some(Self::Info),
            0x07 => Some(Self::Data),
            0x08 => Some(Self::Config),
            0x0A => Some(Self::Network),
            _ => None,
        }
    }

    /// Convert to magic
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::System => "System",
            Self::Accessory => "Accessory",
            Self::Vehicle => "Vehicle",
            Self::Info => "Info",
            Self::Data => "Data",
            Self::Config => "Config",
            Self::Network => "Network",
        };
        write!(f, "{name}")
    }
}

/// ZCAN command modes (2-bit field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CommandMode {
    /// Query, the addressee answers with `Ack`
    Request = 0,
    /// Instruction to change state
    Command = 1,
    /// Unsolicited state report
    Event = 2,
    /// Answer to a request or command
    Ack = 3,
}

impl CommandMode {
    /// Every mode, in magic order.
    pub const ALL: [Self; 4] = [Self::Request, Self::Command, Self::Event, Self::Ack];

    /// Convert from the low two bits of `value`. Total over all inputs.
    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::Request,
            1 => Self::Command,
            2 => Self::Event,
            _ => Self::Ack,
        }
    }

    /// Convert to magic
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for CommandMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Request => "Request",
            Self::Command => "Command",
            Self::Event => "Event",
            Self::Ack => "Ack",
        };
        write!(f, "{name}")
    }
}

/// Command magics, grouped by the command group they belong to.
pub mod command {
    /// Largest command value the 6-bit field can carry
    pub const MAX: u8 = 0x3F;

    /// `CommandGroup::System`
    pub mod system {
        /// Track power outputs
        pub const POWER_MODE: u8 = 0x00;
    }

    /// `CommandGroup::Accessory`
    pub mod accessory {
        /// Output port configuration
        pub const OUTPUT_CONFIG: u8 = 0x05;
    }

    /// `CommandGroup::Vehicle`
    pub mod vehicle {
        /// Full state query
        pub const LOCO_STATE: u8 = 0x00;
        /// Decoder protocol / speed step mode
        pub const LOCO_MODE: u8 = 0x01;
        /// Speed and direction
        pub const LOCO_SPEED: u8 = 0x02;
        /// Function on/off
        pub const LOCO_FUNCTION: u8 = 0x04;
        /// Mark loco as active on the bus
        pub const LOCO_ACTIVE: u8 = 0x10;
    }

    /// `CommandGroup::Info`
    pub mod info {
        /// Module descriptor query
        pub const MODULE_INFO: u8 = 0x08;
    }

    /// `CommandGroup::Data`
    pub mod data {
        /// Number of objects in a data group
        pub const GROUP_COUNT: u8 = 0x00;
        /// Object lookup by list index
        pub const ITEM_BY_INDEX: u8 = 0x01;
        /// Object lookup by NID
        pub const ITEM_BY_NID: u8 = 0x02;
    }

    /// `CommandGroup::Config`
    pub mod config {
        /// Read a configuration variable
        pub const CV_READ: u8 = 0x08;
        /// Write a configuration variable
        pub const CV_WRITE: u8 = 0x09;
    }

    /// `CommandGroup::Network`
    pub mod network {
        /// Open a session with the command station
        pub const LOGIN: u8 = 0x06;
        /// Close a session
        pub const LOGOUT: u8 = 0x07;
    }
}

/// Object database groups addressed by `Data` queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum DataGroup {
    /// Known locomotives
    Vehicles = 0x2F00,
    /// Accessory decoders
    Accessories = 0x5F00,
    /// Bus modules
    Modules = 0xC000,
}

impl DataGroup {
    /// Convert from magic
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x2F00 => Some(Self::Vehicles),
            0x5F00 => Some(Self::Accessories),
            0xC000 => Some(Self::Modules),
            _ => None,
        }
    }

    /// Convert to magic
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Track power state carried by `System/PowerMode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PowerState {
    /// Outputs switched off
    Off = 0x00,
    /// Outputs switched on
    On = 0x01,
    /// Emergency stop, power on but all locos halted
    EmergencyStop = 0x02,
    /// Output shut down by overcurrent protection
    Overload = 0x03,
}

impl PowerState {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Off),
            0x01 => Some(Self::On),
            0x02 => Some(Self::EmergencyStop),
            0x03 => Some(Self::Overload),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Set of power outputs addressed by a power command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerOutputs(u8);

impl PowerOutputs {
    /// Main track output 1
    pub const TRACK_1: u8 = 1 << 0;
    /// Main track output 2
    pub const TRACK_2: u8 = 1 << 1;
    /// Programming track
    pub const PROGRAMMING: u8 = 1 << 2;
    /// Booster bus
    pub const BOOSTER: u8 = 1 << 3;
    /// Every defined output
    pub const ALL: u8 = Self::TRACK_1 | Self::TRACK_2 | Self::PROGRAMMING | Self::BOOSTER;

    /// Create from byte, keeping unknown bits
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Convert to byte
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Set an output
    #[must_use]
    pub const fn with(mut self, output: u8) -> Self {
        self.0 |= output;
        self
    }

    /// Check if an output is included
    #[must_use]
    pub const fn contains(self, output: u8) -> bool {
        (self.0 & output) != 0
    }
}

/// Direction and state flags of a speed command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocoFlags(u8);

impl LocoFlags {
    /// Valid flag bits mask
    pub const VALID_MASK: u8 =
        Self::FORWARD | Self::EMERGENCY_STOP | Self::SHUNTING | Self::MANUAL;
    /// Driving direction forward (cleared = reverse)
    pub const FORWARD: u8 = 1 << 0;
    /// Decoder emergency stop
    pub const EMERGENCY_STOP: u8 = 1 << 1;
    /// Shunting (half speed) mode
    pub const SHUNTING: u8 = 1 << 2;
    /// Loco taken over by a hand controller
    pub const MANUAL: u8 = 1 << 3;

    /// Create empty flags
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Create from byte
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        if value & !Self::VALID_MASK == 0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Set a flag
    #[must_use]
    pub const fn with(mut self, flag: u8) -> Self {
        debug_assert!(flag & !Self::VALID_MASK == 0, "invalid flag bit");
        self.0 |= flag;
        self
    }

    /// Check if flag is set
    #[must_use]
    pub const fn has(self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    /// Check if driving forward
    #[must_use]
    pub const fn is_forward(self) -> bool {
        self.has(Self::FORWARD)
    }

    /// Check if emergency stopped
    #[must_use]
    pub const fn is_emergency_stop(self) -> bool {
        self.has(Self::EMERGENCY_STOP)
    }
}

impl fmt::Display for LocoFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        parts.push(if self.is_forward() { "FORWARD" } else { "REVERSE" });
        if self.is_emergency_stop() {
            parts.push("EMERGENCY_STOP");
        }
        if self.has(Self::SHUNTING) {
            parts.push("SHUNTING");
        }
        if self.has(Self::MANUAL) {
            parts.push("MANUAL");
        }
        write!(f, "{}", parts.join(" | "))
    }
}

/// Header flags of an MX1 message
///
/// Carried in the flag byte that follows the sequence number of every MX1
/// payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PacketFlags(u8);

impl PacketFlags {
    /// Valid flag bits mask
    pub const VALID_MASK: u8 = Self::SECONDARY | Self::REPLY | Self::ACK | Self::LONG;
    /// Addressed to the secondary (booster side) station
    pub const SECONDARY: u8 = 1 << 4;
    /// Answer to an earlier request
    pub const REPLY: u8 = 1 << 5;
    /// Acknowledgement of a command
    pub const ACK: u8 = 1 << 6;
    /// Long message format with a 16-bit length
    pub const LONG: u8 = 1 << 7;

    /// Create empty flags
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Create from byte, `None` if an undefined bit is set
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        if value & !Self::VALID_MASK == 0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Set a flag
    #[must_use]
    pub const fn with(mut self, flag: u8) -> Self {
        debug_assert!(flag & !Self::VALID_MASK == 0, "invalid flag bit");
        self.0 |= flag;
        self
    }

    /// Check if flag is set
    #[must_use]
    pub const fn has(self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    /// Check if this is a reply or acknowledgement
    #[must_use]
    pub const fn is_answer(self) -> bool {
        self.has(Self::REPLY | Self::ACK)
    }
}

impl fmt::Display for PacketFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.has(Self::SECONDARY) {
            parts.push("SECONDARY");
        }
        if self.has(Self::REPLY) {
            parts.push("REPLY");
        }
        if self.has(Self::ACK) {
            parts.push("ACK");
        }
        if self.has(Self::LONG) {
            parts.push("LONG");
        }
        if parts.is_empty() {
            return f.write_str("NONE");
        }
        write!(f, "{}", parts.join(" | "))
    }
}
