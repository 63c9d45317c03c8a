//! Node session: the public surface coordinating the send paths with the
//! concurrently-running receiver, per spec.md §4.7.
//!
//! Mirrors the shape of the teacher's `Context` (construction takes the
//! transport handle, an id, and callbacks) but replaces the busy-wait
//! response loop from `original_source/python/sdp_cleaned.py`'s
//! `send_data` with a `Condvar` wait, per design note §9.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::channel::ByteChannel;
use crate::codec::{self, AckCode};
use crate::config::NodeConfig;
use crate::diag::{Diagnostic, DiagnosticSink, LogSink};
use crate::error::{Error, Result};
use crate::receiver::{ReceiverLoop, SharedRx};

/// A Simple Data Protocol node: one end of a point-to-point link over a
/// [`ByteChannel`].
pub struct Node {
    id: u32,
    max_payload: usize,
    config: Mutex<NodeConfig>,
    channel: Arc<Mutex<dyn ByteChannel>>,
    shared: Arc<Mutex<SharedRx>>,
    signal: Arc<Condvar>,
    diag: Arc<dyn DiagnosticSink>,
    handler: Arc<dyn Fn(&[u8]) + Send + Sync>,
    receiver: Mutex<Option<ReceiverLoop>>,
}

impl Node {
    /// Builds a node with default timing (spec.md §4.9) and a `log`-backed
    /// diagnostic sink.
    pub fn new<C, H>(handler: H, channel: C, id: u32, max_payload: usize) -> Self
    where
        C: ByteChannel + 'static,
        H: Fn(&[u8]) + Send + Sync + 'static,
    {
        Self::with_config(handler, channel, id, max_payload, NodeConfig::default())
    }

    pub fn with_config<C, H>(
        handler: H,
        channel: C,
        id: u32,
        max_payload: usize,
        config: NodeConfig,
    ) -> Self
    where
        C: ByteChannel + 'static,
        H: Fn(&[u8]) + Send + Sync + 'static,
    {
        if max_payload > 255 {
            log::warn!(
                target: "sdp::node",
                "node {id}: max_payload {max_payload} exceeds the 255-byte limit imposed by the \
                 interoperable firmware counterpart; proceeding host-to-host only"
            );
        }

        Node {
            id,
            max_payload,
            shared: Arc::new(Mutex::new(SharedRx::new(max_payload, config.rx_frame_timeout))),
            signal: Arc::new(Condvar::new()),
            channel: Arc::new(Mutex::new(channel)),
            diag: Arc::new(LogSink),
            handler: Arc::new(handler),
            config: Mutex::new(config),
            receiver: Mutex::new(None),
        }
    }

    /// Replaces the default `log`-backed diagnostic sink.
    pub fn set_diagnostic_sink(&mut self, sink: Arc<dyn DiagnosticSink>) {
        self.diag = sink;
    }

    /// Overrides the default `response_timeout` (seconds).
    pub fn set_response_timeout(&self, seconds: f64) {
        self.config.lock().unwrap().response_timeout = Duration::from_secs_f64(seconds);
    }

    /// Overrides `rx_frame_timeout`/`tx_frame_timeout` (seconds).
    pub fn set_timeouts(&self, rx_frame_timeout: f64, tx_frame_timeout: f64) {
        let mut cfg = self.config.lock().unwrap();
        cfg.rx_frame_timeout = Duration::from_secs_f64(rx_frame_timeout);
        cfg.tx_frame_timeout = Duration::from_secs_f64(tx_frame_timeout);
        self.shared.lock().unwrap().rx.set_frame_timeout(cfg.rx_frame_timeout);
    }

    /// `true` if the underlying channel reports itself open.
    pub fn status(&self) -> bool {
        self.channel.lock().unwrap().is_open()
    }

    /// Starts the receiver thread. Flushes the channel's input/output
    /// buffers first, same as the source's `enable_receiver`.
    pub fn enable_receiver(&self) -> bool {
        if !self.status() {
            self.report("enable_receiver", "serial port is not open");
            return false;
        }

        let mut slot = self.receiver.lock().unwrap();
        if slot.is_some() {
            return true;
        }

        {
            let mut ch = self.channel.lock().unwrap();
            ch.flush_input();
            ch.flush_output();
        }

        let io_debug = self.config.lock().unwrap().io_debug;
        let receiver = ReceiverLoop::spawn(
            self.id,
            self.max_payload,
            self.channel.clone(),
            self.shared.clone(),
            self.signal.clone(),
            self.diag.clone(),
            self.handler.clone(),
            io_debug,
        );
        *slot = Some(receiver);
        true
    }

    /// Stops the receiver thread, waiting up to `thread_stop_timeout`.
    pub fn disable_receiver(&self) -> bool {
        let Some(receiver) = self.receiver.lock().unwrap().take() else {
            return true;
        };
        let timeout = self.config.lock().unwrap().thread_stop_timeout;
        receiver.stop(timeout)
    }

    /// Sends `payload` as a request and blocks for the peer's response,
    /// retrying up to `retransmit_limit` times on NACK or timeout, per
    /// spec.md §4.7.
    pub fn send_request(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if !self.status() {
            self.report("send_request", "serial port is not open");
            return Err(Error::ChannelClosed);
        }

        let (retransmit_limit, retransmit_delay, response_timeout) = {
            let cfg = self.config.lock().unwrap();
            (cfg.retransmit_limit, cfg.retransmit_delay, cfg.response_timeout)
        };

        for _ in 0..retransmit_limit {
            let frame = codec::encode(AckCode::Ack, payload, self.max_payload)?;
            if !self.transmit(&frame, "send_request") {
                std::thread::sleep(retransmit_delay);
                continue;
            }

            {
                let mut guard = self.shared.lock().unwrap();
                guard.rx.force_idle();
                guard.expect_response = true;
            }

            let deadline = Instant::now() + response_timeout;
            let result = self.wait_for_response(deadline);

            match result {
                Some(AckCode::Ack) => {
                    let payload = self.shared.lock().unwrap().last_payload.clone();
                    return Ok(payload);
                }
                Some(AckCode::Nack) => {
                    self.report("send_request", "CRC validation failure");
                    std::thread::sleep(retransmit_delay);
                }
                None => {
                    self.report("send_request", "timeout expecting response");
                }
            }
        }

        Err(Error::ResponseTimeout)
    }

    /// Waits until the receiver clears `expect_response` or `deadline`
    /// passes, returning the ack it observed (or `None` on timeout).
    fn wait_for_response(&self, deadline: Instant) -> Option<AckCode> {
        let mut guard = self.shared.lock().unwrap();
        while guard.expect_response {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (next_guard, timeout_result) =
                self.signal.wait_timeout(guard, deadline - now).unwrap();
            guard = next_guard;
            if timeout_result.timed_out() && guard.expect_response {
                return None;
            }
        }
        Some(guard.last_ack)
    }

    /// Replies to an inbound message from a handler, choosing ACK/NACK
    /// based on the ACK value the receiver last observed.
    pub fn send_response(&self, payload: &[u8]) -> Result<()> {
        if !self.status() {
            self.report("send_response", "serial port is not open");
            return Err(Error::ChannelClosed);
        }

        let ack = self.shared.lock().unwrap().last_ack;
        let frame = codec::encode(ack, payload, self.max_payload)?;
        if self.transmit(&frame, "send_response") {
            Ok(())
        } else {
            Err(Error::WriteFailed(std::io::Error::new(
                std::io::ErrorKind::Other,
                "transmission failure",
            )))
        }
    }

    /// Emits the minimal three-byte positive acknowledgment
    /// `[SOF, ACK, EOF]`.
    pub fn send_empty_ack(&self) -> Result<()> {
        if !self.status() {
            self.report("send_empty_ack", "serial port is not open");
            return Err(Error::ChannelClosed);
        }
        if self.transmit(&codec::empty_ack_frame(), "send_empty_ack") {
            Ok(())
        } else {
            Err(Error::WriteFailed(std::io::Error::new(
                std::io::ErrorKind::Other,
                "transmission failure",
            )))
        }
    }

    fn transmit(&self, frame: &[u8], operation: &'static str) -> bool {
        let result = self.channel.lock().unwrap().write(frame);
        match result {
            Ok(()) => true,
            Err(_) => {
                if let Some(receiver) = self.receiver.lock().unwrap().as_ref() {
                    receiver.request_stop();
                }
                self.report(operation, "transmission failure");
                false
            }
        }
    }

    fn report(&self, operation: &'static str, cause: &str) {
        self.diag.report(Diagnostic {
            node_id: self.id,
            operation,
            cause: cause.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LoopbackChannel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn empty_ack_is_a_legal_response_to_a_pending_request() {
        let (a, b) = LoopbackChannel::pair();
        let request_seen = Arc::new(AtomicUsize::new(0));
        let seen = request_seen.clone();
        let node_a = Arc::new(Node::new(
            move |_payload| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
            a,
            0,
            64,
        ));
        let node_b = Node::new(|_| {}, b, 1, 64);

        node_a.enable_receiver();
        node_b.enable_receiver();

        let handle = std::thread::spawn(move || node_b.send_request(&[1, 2, 3]));

        while request_seen.load(Ordering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(2));
        }
        node_a.send_empty_ack().unwrap();

        let result = handle.join().unwrap().unwrap();
        assert!(result.is_empty());

        node_a.disable_receiver();
    }

    #[test]
    fn send_request_times_out_against_a_silent_peer() {
        let node = Node::with_config(
            |_| {},
            LoopbackChannel::silent(),
            0,
            64,
            NodeConfig {
                response_timeout: Duration::from_millis(20),
                retransmit_delay: Duration::from_millis(5),
                retransmit_limit: 2,
                ..NodeConfig::default()
            },
        );
        node.enable_receiver();
        let start = Instant::now();
        let result = node.send_request(&[0x01]);
        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(1));
        node.disable_receiver();
    }

    #[test]
    fn send_request_receives_a_response_via_send_response() {
        let (a, b) = LoopbackChannel::pair();
        let requests_seen = Arc::new(AtomicUsize::new(0));
        let seen = requests_seen.clone();

        let node_b = Arc::new(Node::new(
            move |_payload| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
            b,
            1,
            64,
        ));
        let node_a = Node::new(|_| {}, a, 0, 64);

        node_b.enable_receiver();
        node_a.enable_receiver();

        let handle = std::thread::spawn(move || node_a.send_request(&[7, 8, 9]));

        // Wait for node_b's handler to observe the request, then reply.
        while requests_seen.load(Ordering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(2));
        }
        node_b.send_response(&[42]).unwrap();

        let result = handle.join().unwrap();
        assert_eq!(result.unwrap(), vec![42]);
        node_b.disable_receiver();
    }
}
