extern crate sdp;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use env_logger;
use log::LevelFilter;
use sdp::channel::LoopbackChannel;
use sdp::Node;

/// Two nodes, each with its own receiver thread, talking over an in-memory
/// loopback pair. `node1` sends a request and blocks for `node2`'s reply,
/// the way a host application would talk to a firmware peer over a wire.
fn main() {
    log::set_max_level(LevelFilter::Trace);
    env_logger::init();

    let (chan1, chan2) = LoopbackChannel::pair();
    let tx_data: [u8; 8] = [0xaa, 0xaa, 0xaa, 0, 0, 0, 0, 1];

    let requests_seen = Arc::new(AtomicUsize::new(0));
    let seen = requests_seen.clone();

    let node2 = Arc::new(Node::new(
        move |payload| {
            print!("node2 received: [ ");
            for byte in payload {
                print!("0x{:02x} ", byte);
            }
            println!("]");
            seen.fetch_add(1, Ordering::SeqCst);
        },
        chan2,
        1,
        64,
    ));
    let node1 = Node::new(|_payload| {}, chan1, 0, 64);

    node1.enable_receiver();
    node2.enable_receiver();

    let responder = node2.clone();
    let handle = std::thread::spawn(move || node1.send_request(&tx_data));

    while requests_seen.load(Ordering::SeqCst) == 0 {
        std::thread::sleep(Duration::from_millis(2));
    }
    responder.send_empty_ack().unwrap();

    match handle.join().unwrap() {
        Ok(reply) => println!("node1 received reply: {reply:?}"),
        Err(e) => println!("send_request failed: {e}"),
    }

    node2.disable_receiver();
}
