//! ZCAN-over-UDP frame marshalling
//!
//! # Format
//!
//! ```text
//! offset 0..1  payload length (u16 LE, bytes after the header)
//! offset 2..3  reserved, written as 0
//! offset 4     command group magic
//! offset 5     command << 2 | mode
//! offset 6..7  sender NID (u16 LE)
//! offset 8..   payload
//! ```
//!
//! Unknown groups and commands decode to ordinary packets; whether they
//! mean anything is decided at adapter resolution.

use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use super::specialisation::SpecialisationRegistry;
use super::{CommandMode, Error, HEADER_SIZE, Packet, Result, command};
use crate::util::{high_byte, low_byte, u16_from_le};

/// Bytes `packet` occupies on the wire.
#[must_use]
pub fn marshalled_len(packet: &Packet) -> usize {
    HEADER_SIZE + packet.dlc()
}

/// Write `packet` into `out`, returning the number of bytes written.
pub fn marshal(packet: &Packet, out: &mut [u8]) -> Result<usize> {
    let total = marshalled_len(packet);
    if out.len() < total {
        return Err(Error::BufferTooSmall {
            needed: total,
            got: out.len(),
        });
    }
    if packet.command() > command::MAX {
        return Err(Error::CommandOutOfRange {
            command: packet.command(),
        });
    }
    let payload_len = u16::try_from(packet.dlc()).map_err(|_| Error::PayloadTooLarge {
        size: packet.dlc(),
        max: usize::from(u16::MAX),
    })?;

    out[0] = low_byte(payload_len);
    out[1] = high_byte(payload_len);
    out[2..4].fill(0);
    out[4] = packet.group_magic();
    out[5] = (packet.command() << 2) | packet.command_mode().as_u8();
    out[6] = low_byte(packet.sender());
    out[7] = high_byte(packet.sender());
    out[HEADER_SIZE..total].copy_from_slice(packet.payload());

    trace!(%packet, len = total, "marshalled");
    Ok(total)
}

/// Marshal into a freshly allocated vector.
pub fn marshal_to_vec(packet: &Packet) -> Result<Vec<u8>> {
    let mut out = vec![0u8; marshalled_len(packet)];
    marshal(packet, &mut out)?;
    Ok(out)
}

/// Decode one frame from the start of `src`, resolving adapters against the
/// shared registry.
pub fn unmarshal(src: &[u8]) -> Result<Packet> {
    unmarshal_in(&SpecialisationRegistry::shared(), src)
}

/// Decode one frame from the start of `src` with an explicit registry.
pub fn unmarshal_in(registry: &Arc<SpecialisationRegistry>, src: &[u8]) -> Result<Packet> {
    unmarshal_frame(registry, src).map(|(packet, _)| packet)
}

fn unmarshal_frame(registry: &Arc<SpecialisationRegistry>, src: &[u8]) -> Result<(Packet, usize)> {
    if src.len() < HEADER_SIZE {
        return Err(Error::TruncatedFrame {
            needed: HEADER_SIZE,
            got: src.len(),
        });
    }

    let payload_len = usize::from(u16_from_le(src[0], src[1]));
    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Err(Error::TruncatedFrame {
            needed: total,
            got: src.len(),
        });
    }

    let reserved = u16_from_le(src[2], src[3]);
    if reserved != 0 {
        trace!(reserved, "reserved header field not zero");
    }

    let packet = Packet::with_registry(
        Arc::clone(registry),
        src[4],
        CommandMode::from_bits(src[5]),
        src[5] >> 2,
        u16_from_le(src[6], src[7]),
        Bytes::copy_from_slice(&src[HEADER_SIZE..total]),
    );
    trace!(%packet, "unmarshalled");
    Ok((packet, total))
}

/// Iterate the frames packed back to back in one datagram.
///
/// Iteration stops after the first error.
#[must_use]
pub fn unmarshal_all<'a>(registry: &Arc<SpecialisationRegistry>, datagram: &'a [u8]) -> Frames<'a> {
    Frames {
        registry: Arc::clone(registry),
        rest: datagram,
        failed: false,
    }
}

/// Iterator returned by [`unmarshal_all`].
#[derive(Debug)]
pub struct Frames<'a> {
    registry: Arc<SpecialisationRegistry>,
    rest: &'a [u8],
    failed: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }
        match unmarshal_frame(&self.registry, self.rest) {
            Ok((packet, used)) => {
                self.rest = &self.rest[used..];
                Some(Ok(packet))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::command::network;
    use crate::protocol::{CommandGroup, DataGroup, LocoFlags, PacketBuilder};

    #[test]
    fn test_login_frame() {
        let packet = PacketBuilder::new(0xCAFE).login();
        let bytes = marshal_to_vec(&packet).unwrap();
        assert_eq!(
            bytes,
            vec![0x00, 0x00, 0x00, 0x00, 0x0A, network::LOGIN << 2, 0xFE, 0xCA]
        );
    }

    #[test]
    fn test_logout_frame() {
        let packet = PacketBuilder::new(0xBABE).logout(0xCAFE);
        let bytes = marshal_to_vec(&packet).unwrap();
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[0..2], &[0x02, 0x00]);
        assert_eq!(&bytes[6..8], &[0xBE, 0xBA]);
        assert_eq!(&bytes[8..10], &[0xFE, 0xCA]);
    }

    #[test]
    fn test_marshal_buffer_too_small() {
        let packet = PacketBuilder::new(0xBABE).logout(0xCAFE);
        let mut out = [0u8; 9];
        let result = marshal(&packet, &mut out);
        assert!(matches!(result, Err(Error::BufferTooSmall { needed: 10, got: 9 })));
    }

    #[test]
    fn test_marshal_into_larger_buffer() {
        let packet = PacketBuilder::new(1).loco_state(3);
        let mut out = [0xAAu8; 32];
        let written = marshal(&packet, &mut out).unwrap();
        assert_eq!(written, 10);
        assert_eq!(out[10], 0xAA);
    }

    #[test]
    fn test_unmarshal_truncated() {
        let result = unmarshal(&[0x00, 0x00, 0x00]);
        assert!(matches!(result, Err(Error::TruncatedFrame { needed: 8, got: 3 })));

        let packet = PacketBuilder::new(1).data_group_count(2, DataGroup::Modules);
        let bytes = marshal_to_vec(&packet).unwrap();
        let result = unmarshal(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(Error::TruncatedFrame { needed: 12, got: 11 })));
    }

    #[test]
    fn test_unknown_group_passes_through() {
        let bytes = [0x01, 0x00, 0x00, 0x00, 0x0E, 0xFF, 0x34, 0x12, 0x99];
        let packet = unmarshal(&bytes).unwrap();
        assert_eq!(packet.command_group(), None);
        assert_eq!(packet.command(), 0x3F);
        assert_eq!(packet.command_mode(), CommandMode::Ack);
        assert_eq!(packet.payload(), &[0x99]);
    }

    #[test]
    fn test_unmarshal_all_batched_datagram() {
        let builder = PacketBuilder::new(7);
        let first = builder.login();
        let second = builder.loco_speed(3, 10, LocoFlags::new());
        let mut datagram = marshal_to_vec(&first).unwrap();
        datagram.extend(marshal_to_vec(&second).unwrap());

        let registry = SpecialisationRegistry::shared();
        let packets: Vec<Packet> = unmarshal_all(&registry, &datagram)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(packets, vec![first, second]);
    }

    #[test]
    fn test_unmarshal_all_stops_on_error() {
        let mut datagram = marshal_to_vec(&PacketBuilder::new(7).login()).unwrap();
        datagram.extend_from_slice(&[0x05, 0x00]);

        let registry = SpecialisationRegistry::shared();
        let results: Vec<_> = unmarshal_all(&registry, &datagram).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::TruncatedFrame { .. })));
    }

    #[test]
    fn test_marshal_rejects_wide_command() {
        let packet = Packet::new(CommandGroup::System.as_u8(), CommandMode::Command, 0x40, 0, Bytes::new());
        assert!(matches!(
            marshal_to_vec(&packet),
            Err(Error::CommandOutOfRange { command: 0x40 })
        ));
    }

    mod proptests {
        use super::*;
        use crate::protocol::{PowerOutputs, PowerState};
        use proptest::prelude::*;

        fn builder_packet() -> impl Strategy<Value = Packet> {
            (any::<u16>(), any::<u16>(), any::<u16>(), any::<u16>(), any::<bool>(), 0usize..8)
                .prop_map(|(sender, a, b, c, on, which)| {
                    let builder = PacketBuilder::new(sender);
                    match which {
                        0 => builder.login(),
                        1 => builder.logout(a),
                        2 => builder.power_mode(a, PowerOutputs::from_bits(b as u8), PowerState::On),
                        3 => builder.loco_speed(a, b, LocoFlags::new()),
                        4 => builder.loco_function(a, b, on),
                        5 => builder.cv_write(a, b, c),
                        6 => builder.data_item_by_index(a, DataGroup::Accessories, b),
                        _ => builder.module_info(a, b),
                    }
                })
        }

        proptest! {
            /// Property: unmarshal inverts marshal for builder packets
            #[test]
            fn prop_marshal_inverse(packet in builder_packet()) {
                let bytes = marshal_to_vec(&packet).unwrap();
                prop_assert_eq!(bytes.len(), HEADER_SIZE + packet.dlc());
                let decoded = unmarshal(&bytes).unwrap();
                prop_assert_eq!(decoded, packet);
            }

            /// Property: arbitrary input never panics
            #[test]
            fn prop_unmarshal_total(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
                let _ = unmarshal(&bytes);
            }
        }
    }
}
