//! # SDP
//! SDP (Simple Data Protocol) is a byte-stuffed, CRC-16 framed point-to-point
//! protocol for connecting two ends of a reliable byte stream, typically a
//! serial/UART link.
//!
//! A frame is `SOF, ack, stuffed(payload), stuffed(crc16), EOF` with `SOF`,
//! `EOF`, and `DLE` escaped out of the payload/CRC regions by byte stuffing.
//! A [`Node`] owns one end of the link: it runs a dedicated receiver thread
//! that drives the frame grammar byte by byte and dispatches completed
//! frames, while [`Node::send_request`] implements stop-and-wait delivery
//! with bounded retransmission.
//!
//! ## Example
//! ```
//! use sdp::{Node, channel::LoopbackChannel};
//!
//! let (a, b) = LoopbackChannel::pair();
//! let node_b = Node::new(|_payload| {}, b, 1, 64);
//! let node_a = Node::new(|_payload| {}, a, 0, 64);
//!
//! node_a.enable_receiver();
//! node_b.enable_receiver();
//!
//! node_a.disable_receiver();
//! node_b.disable_receiver();
//! ```

pub mod channel;
pub mod codec;
mod config;
mod crc;
mod diag;
mod error;
mod node;
mod payload;
mod receiver;
mod rx;

pub use channel::ByteChannel;
pub use codec::AckCode;
pub use config::NodeConfig;
pub use diag::{Diagnostic, DiagnosticSink, LogSink, NullSink};
pub use error::{Error, Result};
pub use node::Node;
pub use payload::{Element, Payload};
