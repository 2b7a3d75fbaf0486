//! ZCAN 32-bit identifier codec
//!
//! # Layout
//!
//! ```text
//!  31    28 27    24 23          18 17 16 15                            0
//! +--------+--------+--------------+-----+-------------------------------+
//! |  0000  | group  |   command    |mode |          sender NID           |
//! +--------+--------+--------------+-----+-------------------------------+
//! ```

use std::fmt;

use super::{CommandGroup, CommandMode, Error, Result, command};

const NID_MASK: u32 = 0x0000_FFFF;
const MODE_SHIFT: u32 = 16;
const COMMAND_SHIFT: u32 = 18;
const GROUP_SHIFT: u32 = 24;
const RESERVED_MASK: u32 = 0xF000_0000;

/// Decoded routing fields of a CAN identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanIdFields {
    /// Command group
    pub group: CommandGroup,
    /// Command mode
    pub mode: CommandMode,
    /// 6-bit command
    pub command: u8,
    /// Sender network identifier
    pub sender: u16,
}

/// Canonical identifier of a ZCAN frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanId(u32);

impl CanId {
    /// Pack routing fields into an identifier.
    pub fn encode(
        group: CommandGroup,
        mode: CommandMode,
        command: u8,
        sender: u16,
    ) -> Result<Self> {
        if command > command::MAX {
            return Err(Error::CommandOutOfRange { command });
        }

        Ok(Self(
            (u32::from(group.as_u8()) << GROUP_SHIFT)
                | (u32::from(command) << COMMAND_SHIFT)
                | (u32::from(mode.as_u8()) << MODE_SHIFT)
                | u32::from(sender),
        ))
    }

    /// Pack a [`CanIdFields`] value.
    pub fn from_fields(fields: CanIdFields) -> Result<Self> {
        Self::encode(fields.group, fields.mode, fields.command, fields.sender)
    }

    /// Validate a raw identifier.
    pub fn from_raw(raw: u32) -> Result<Self> {
        let id = Self(raw);
        id.decode()?;
        Ok(id)
    }

    /// Unpack the routing fields.
    pub fn decode(self) -> Result<CanIdFields> {
        let raw = self.0;
        if raw & RESERVED_MASK != 0 {
            return Err(Error::UnknownEncoding { can_id: raw });
        }

        let group_magic = ((raw >> GROUP_SHIFT) & 0x0F) as u8;
        let group =
            CommandGroup::from_u8(group_magic).ok_or(Error::UnknownEncoding { can_id: raw })?;

        Ok(CanIdFields {
            group,
            mode: CommandMode::from_bits((raw >> MODE_SHIFT) as u8),
            command: ((raw >> COMMAND_SHIFT) as u8) & command::MAX,
            sender: (raw & NID_MASK) as u16,
        })
    }

    /// Raw 32-bit value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<CanId> for u32 {
    fn from(id: CanId) -> Self {
        id.0
    }
}

impl TryFrom<u32> for CanId {
    type Error = Error;

    fn try_from(raw: u32) -> Result<Self> {
        Self::from_raw(raw)
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::command::{network, vehicle};

    #[test]
    fn test_encode_known_vectors() {
        let id = CanId::encode(CommandGroup::Network, CommandMode::Request, network::LOGIN, 0xCAFE)
            .unwrap();
        assert_eq!(id.as_u32(), 0x0A18_CAFE);

        let id = CanId::encode(
            CommandGroup::Vehicle,
            CommandMode::Ack,
            vehicle::LOCO_SPEED,
            0x0001,
        )
        .unwrap();
        assert_eq!(id.as_u32(), 0x020B_0001);
    }

    #[test]
    fn test_decode_known_vector() {
        let fields = CanId::from_raw(0x0A1C_BABE).unwrap().decode().unwrap();
        assert_eq!(fields.group, CommandGroup::Network);
        assert_eq!(fields.command, network::LOGOUT);
        assert_eq!(fields.mode, CommandMode::Request);
        assert_eq!(fields.sender, 0xBABE);
    }

    #[test]
    fn test_decode_rejects_reserved_bits() {
        let result = CanId(0x1000_0000).decode();
        assert!(matches!(result, Err(Error::UnknownEncoding { can_id: 0x1000_0000 })));
    }

    #[test]
    fn test_decode_rejects_undefined_group() {
        let result = CanId::from_raw(0x0300_0000);
        assert!(matches!(result, Err(Error::UnknownEncoding { .. })));
    }

    #[test]
    fn test_encode_rejects_wide_command() {
        let result = CanId::encode(CommandGroup::System, CommandMode::Command, 0x40, 0);
        assert!(matches!(result, Err(Error::CommandOutOfRange { command: 0x40 })));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn group_strategy() -> impl Strategy<Value = CommandGroup> {
            proptest::sample::select(CommandGroup::ALL.to_vec())
        }

        fn mode_strategy() -> impl Strategy<Value = CommandMode> {
            proptest::sample::select(CommandMode::ALL.to_vec())
        }

        proptest! {
            /// Property: decode inverts encode over the whole valid domain
            #[test]
            fn prop_roundtrip(
                group in group_strategy(),
                mode in mode_strategy(),
                cmd in 0u8..=command::MAX,
                sender in any::<u16>(),
            ) {
                let id = CanId::encode(group, mode, cmd, sender).unwrap();
                let fields = id.decode().unwrap();
                prop_assert_eq!(fields, CanIdFields { group, mode, command: cmd, sender });
            }

            /// Property: every accepted raw value re-encodes to itself
            #[test]
            fn prop_accepted_raw_reencodes(raw in any::<u32>()) {
                if let Ok(fields) = CanId(raw).decode() {
                    prop_assert_eq!(CanId::from_fields(fields).unwrap().as_u32(), raw);
                }
            }
        }
    }
}
