use std::sync::Arc;

use zimo_wire::serial::{
    DLE, EOT, Mx1Config, Mx1Deframer, SOH, decode_frame, encode_frame, escape, escaped_size,
};
use zimo_wire::transport::{LinkConfig, LinkEvent, MemoryChannel, Mx1Link};
use zimo_wire::util::crc8;
use zimo_wire::Error;

#[test]
fn escape_laws() {
    assert_eq!(escaped_size(&[0, SOH]), 3);
    assert_eq!(escaped_size(&[SOH, DLE, 2]), 5);

    let mut out = Vec::new();
    assert_eq!(escape(&[0, DLE, 2, EOT], Some(&mut out)).unwrap(), 6);
    assert_eq!(out, [0, DLE, DLE ^ 0x20, 2, DLE, EOT ^ 0x20]);
}

#[test]
fn crc_vector() {
    assert_eq!(crc8(0xFF, &[0x88, 0x00, 0x01]), 0xCB);
}

#[test]
fn chunked_stream_with_noise_and_errors() {
    let seed = 0xFF;
    let mut stream = vec![0x55, 0x66];
    for payload in [&[0x01u8, 0x02][..], &[DLE, EOT, SOH][..], &[][..]] {
        encode_frame(payload, seed, &mut stream).unwrap();
    }
    // frame cut short by a new SOH
    stream.extend_from_slice(&[SOH, 0x44]);
    encode_frame(&[0x77], seed, &mut stream).unwrap();
    // corrupted checksum
    let mut bad = Vec::new();
    encode_frame(&[0x30, 0x31], seed, &mut bad).unwrap();
    let crc_at = bad.len() - 2;
    bad[crc_at] ^= 0x08;
    stream.extend(bad);

    for chunk_size in [1, 2, 3, 7, stream.len()] {
        let mut deframer = Mx1Deframer::new(Mx1Config::default());
        let mut frames = Vec::new();
        let mut errors = Vec::new();
        for chunk in stream.chunks(chunk_size) {
            deframer.feed(chunk, |outcome| match outcome {
                Ok(frame) => frames.push(frame.to_vec()),
                Err(err) => errors.push(err),
            });
        }
        assert_eq!(
            frames,
            vec![vec![0x01, 0x02], vec![DLE, EOT, SOH], vec![], vec![0x77]],
            "chunk size {chunk_size}"
        );
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::ChecksumMismatch { .. }));
        assert_eq!(deframer.stats().aborted, 1);
    }
}

#[test]
fn one_shot_and_streaming_agree() {
    let mut frame = Vec::new();
    encode_frame(&[0x10, 0x20, 0x30], 0x5A, &mut frame).unwrap();
    let one_shot = decode_frame(&frame, 0x5A).unwrap();

    let mut deframer = Mx1Deframer::new(Mx1Config {
        checksum_seed: 0x5A,
        ..Mx1Config::default()
    });
    let mut streamed = Vec::new();
    deframer.feed_frames(&frame, |f| streamed.push(f));
    assert_eq!(streamed, vec![one_shot]);
}

#[test]
fn mx1_link_round_trip_between_two_ends() {
    let wire = Arc::new(MemoryChannel::new());
    let config = LinkConfig::default();
    let sender = Mx1Link::new(Arc::clone(&wire), &config).unwrap();
    let receiver = Mx1Link::new(MemoryChannel::new(), &config).unwrap();
    let (_, rx) = receiver.events().subscribe_channel();

    sender.send(&[SOH, 0x42, EOT]).unwrap();
    sender.send(&[0x99]).unwrap();
    let bytes: Vec<u8> = wire.take().concat();
    assert_eq!(receiver.receive(&bytes), 2);

    let frames: Vec<Vec<u8>> = rx
        .try_iter()
        .filter_map(|event| match event {
            LinkEvent::Frame(frame) => Some(frame.to_vec()),
            _ => None,
        })
        .collect();
    assert_eq!(frames, vec![vec![SOH, 0x42, EOT], vec![0x99]]);
}

#[test]
fn flag_byte_survives_the_serial_link() {
    use zimo_wire::protocol::PacketFlags;

    let wire = Arc::new(MemoryChannel::new());
    let config = LinkConfig::default();
    let station = Mx1Link::new(Arc::clone(&wire), &config).unwrap();
    let client = Mx1Link::new(MemoryChannel::new(), &config).unwrap();
    let (_, rx) = client.events().subscribe_channel();

    let flags = PacketFlags::new()
        .with(PacketFlags::REPLY)
        .with(PacketFlags::SECONDARY);
    // sequence number, flags, then a sentinel-valued body byte
    station.send(&[0x07, flags.as_u8(), DLE, 0x42]).unwrap();
    client.receive(&wire.take().concat());

    let Ok(LinkEvent::Frame(frame)) = rx.try_recv() else {
        panic!("expected a frame");
    };
    let received = PacketFlags::from_u8(frame[1]).unwrap();
    assert_eq!(received, flags);
    assert!(received.is_answer());
    assert_eq!(&frame[2..], &[DLE, 0x42]);
}
