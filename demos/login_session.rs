//! Login exchange against an in-memory command station.
//!
//! Run with `cargo run --example login_session`.

use std::sync::Arc;

use zimo_wire::protocol::{
    CommandGroup, CommandMode, LocoFlags, LoginReply, Packet, PacketBuilder, command,
    marshal_to_vec,
};
use zimo_wire::transport::{LinkConfig, LinkEvent, MemoryChannel, ZcanLink};
use zimo_wire::util::to_hex;

const CLIENT: u16 = 0xBABE;
const STATION: u16 = 0xCAFE;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("ZCAN login session");
    println!("==================\n");

    let wire = Arc::new(MemoryChannel::new());
    let link = ZcanLink::new(Arc::clone(&wire), &LinkConfig::default())?;
    let (_, events) = link.events().subscribe_channel();

    let client = PacketBuilder::new(CLIENT);
    link.send(&client.login())?;
    link.send(&client.loco_speed(3, 240, LocoFlags::new().with(LocoFlags::FORWARD)))?;
    for datagram in wire.take() {
        println!("-> {}", to_hex(&datagram));
    }

    // What the station would answer
    let reply = Packet::new(
        CommandGroup::Network.as_u8(),
        CommandMode::Ack,
        command::network::LOGIN,
        STATION,
        STATION.to_le_bytes().to_vec(),
    );
    let datagram = marshal_to_vec(&reply)?;
    println!("<- {}", to_hex(&datagram));
    link.receive(&datagram);

    for event in events.try_iter() {
        if let LinkEvent::Packet(packet) = event {
            match packet.adapter::<LoginReply>() {
                Some(login) => println!("logged in, master {:#06X}", login.master()),
                None => println!("unhandled {packet}"),
            }
        }
    }

    link.send(&client.logout(STATION))?;
    println!("-> {}", to_hex(&wire.take().concat()));
    Ok(())
}
