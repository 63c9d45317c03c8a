extern crate sdp;
use std::time::Duration;

use env_logger;
use log::LevelFilter;
use sdp::channel::SerialChannel;
use sdp::{Node, NodeConfig};

const SERIAL_PORT: &str = "/dev/ttyS5";
const BAUD_RATE: u32 = 115_200;

fn main() {
    log::set_max_level(LevelFilter::Debug);
    env_logger::init();

    let config = NodeConfig::default();
    let channel = SerialChannel::open(
        SERIAL_PORT,
        BAUD_RATE,
        config.rx_byte_timeout,
        config.tx_frame_timeout,
    )
    .unwrap();

    let node = Node::with_config(
        |payload| {
            if let Ok(s) = std::str::from_utf8(payload) {
                println!("get msg: {s}");
            } else {
                print!("get data: [ ");
                for byte in payload {
                    print!("0x{:02x} ", byte);
                }
                println!("]");
            }
        },
        channel,
        0,
        255,
        config,
    );
    node.enable_receiver();

    let tx_data: [u8; 3] = [1, 2, 3];
    match node.send_request(&tx_data) {
        Ok(reply) => println!("got reply: {reply:?}"),
        Err(e) => println!("send_request failed: {e}"),
    }

    loop {
        std::thread::sleep(Duration::from_millis(10));
    }
}
