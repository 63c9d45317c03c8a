//! Receive state machine: consumes bytes one at a time, reconstructs
//! frames, validates their CRC-16 trailer, and reports completed frames
//! or faults to the caller.
//!
//! Pure and synchronous by design (no channel, no thread, no clock source
//! beyond what the caller passes in) so it can be driven either from the
//! live [`crate::receiver::ReceiverLoop`] or fed a whole captured buffer in
//! a unit test, the way the teacher's `Context::poll` is driven from both
//! `examples/real_uart_on_linux.rs` and `tests/no_transport_test.rs`.

use std::time::{Duration, Instant};

use crate::codec::{AckCode, DLE, EOF, SOF};
use crate::crc::crc16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    AwaitAck,
    Receiving,
    Escape,
}

/// Outcome of feeding one byte (or one timeout tick) into the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxEvent {
    /// The machine consumed the byte and needs more to complete a frame.
    NeedMore,
    /// EOF closed a frame with an empty payload. The caller must check its
    /// own `expect_response` flag: if set, this is a legal empty response
    /// (`send_empty_ack`) and should just clear the flag; otherwise it is
    /// diagnostic-only and should be ignored.
    EmptyFrame,
    /// EOF closed a non-empty frame. `ack` reflects the CRC outcome
    /// (`Nack` if the trailer failed to validate) and `payload` has the
    /// CRC bytes already stripped.
    FrameDelivered { ack: AckCode, payload: Vec<u8> },
    /// A non-fatal framing fault: the machine already reset itself to
    /// `Idle` and will resume on the next SOF. `reason` is diagnostic text.
    Fault { reason: &'static str },
}

/// The receive half of the protocol, held by a `Node` behind its shared
/// state lock so `rx_payload`/`ack`/`rx_state` stay consistent with the
/// sender's view required by §5.
pub struct RxMachine {
    state: State,
    max_payload: usize,
    payload: Vec<u8>,
    ack: AckCode,
    start_time: Option<Instant>,
    frame_timeout: Duration,
}

impl RxMachine {
    pub fn new(max_payload: usize, frame_timeout: Duration) -> Self {
        RxMachine {
            state: State::Idle,
            max_payload,
            payload: Vec::new(),
            ack: AckCode::Ack,
            start_time: None,
            frame_timeout,
        }
    }

    pub fn set_frame_timeout(&mut self, timeout: Duration) {
        self.frame_timeout = timeout;
    }

    /// Forces the machine back to `Idle`, discarding any in-flight frame.
    /// Used by `send_request` (§4.7 step c: "force rx_state = IDLE").
    pub fn force_idle(&mut self) {
        self.state = State::Idle;
        self.payload.clear();
        self.start_time = None;
    }

    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Current ACK/NACK value, meaningful once a frame has reached
    /// `AwaitAck` or later.
    pub fn ack(&self) -> AckCode {
        self.ack
    }

    /// Feeds one byte at time `now`, advancing the state machine.
    pub fn feed(&mut self, byte: u8, now: Instant) -> RxEvent {
        match self.state {
            State::Idle => {
                if byte == SOF {
                    self.start_time = Some(now);
                    self.ack = AckCode::Ack;
                    self.payload.clear();
                    self.state = State::AwaitAck;
                }
                RxEvent::NeedMore
            }
            State::AwaitAck => {
                self.ack = AckCode::from_byte(byte);
                self.payload.clear();
                self.state = State::Receiving;
                RxEvent::NeedMore
            }
            State::Receiving => match byte {
                DLE => {
                    self.state = State::Escape;
                    RxEvent::NeedMore
                }
                EOF => self.close_frame(),
                b => self.append_byte(b),
            },
            State::Escape => {
                let unmasked = byte ^ crate::codec::XOR_MASK;
                if matches!(unmasked, SOF | EOF | DLE) {
                    self.state = State::Receiving;
                    self.append_byte(unmasked)
                } else {
                    self.abort("standalone DLE")
                }
            }
        }
    }

    /// Evaluates the inter-byte timeout; call this on every tick, including
    /// ticks where no bytes were available to feed.
    pub fn tick_timeout(&mut self, now: Instant) -> Option<RxEvent> {
        if self.state == State::Idle {
            return None;
        }
        let start = self.start_time?;
        if now > start + self.frame_timeout {
            self.state = State::Idle;
            self.payload.clear();
            self.start_time = None;
            Some(RxEvent::Fault {
                reason: "receiving frame timeout",
            })
        } else {
            None
        }
    }

    fn append_byte(&mut self, byte: u8) -> RxEvent {
        if self.payload.len() < self.max_payload + 2 {
            self.payload.push(byte);
            RxEvent::NeedMore
        } else {
            self.abort("payload oversized")
        }
    }

    fn abort(&mut self, reason: &'static str) -> RxEvent {
        self.state = State::Idle;
        self.payload.clear();
        self.start_time = None;
        RxEvent::Fault { reason }
    }

    fn close_frame(&mut self) -> RxEvent {
        self.state = State::Idle;
        self.start_time = None;

        if self.payload.is_empty() {
            return RxEvent::EmptyFrame;
        }
        if self.payload.len() < 2 {
            return self.abort("frame shorter than the CRC trailer");
        }

        if crc16(&self.payload) != 0 {
            self.ack = AckCode::Nack;
        }
        let crc_len = self.payload.len();
        self.payload.truncate(crc_len - 2);

        RxEvent::FrameDelivered {
            ack: self.ack,
            payload: std::mem::take(&mut self.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(m: &mut RxMachine, bytes: &[u8]) -> Vec<RxEvent> {
        let now = Instant::now();
        bytes.iter().map(|&b| m.feed(b, now)).collect()
    }

    #[test]
    fn garbage_before_sof_is_discarded() {
        let mut m = RxMachine::new(255, Duration::from_millis(300));
        let payload = [0x41_u8];
        let crc = crc16(&payload);
        let frame = [
            0x11, 0x22, SOF, AckCode::ACK_BYTE, 0x41, (crc >> 8) as u8, crc as u8, EOF,
        ];
        let events = feed_all(&mut m, &frame);
        let last = events.last().unwrap();
        assert_eq!(
            *last,
            RxEvent::FrameDelivered {
                ack: AckCode::Ack,
                payload: vec![0x41]
            }
        );
    }

    #[test]
    fn corrupted_crc_yields_nack() {
        let mut m = RxMachine::new(255, Duration::from_millis(300));
        let frame = [SOF, AckCode::ACK_BYTE, 0x41, 0x00, 0x00, EOF];
        let events = feed_all(&mut m, &frame);
        assert_eq!(
            *events.last().unwrap(),
            RxEvent::FrameDelivered {
                ack: AckCode::Nack,
                payload: vec![0x41]
            }
        );
    }

    #[test]
    fn standalone_dle_aborts_to_idle() {
        let mut m = RxMachine::new(255, Duration::from_millis(300));
        let frame = [SOF, AckCode::ACK_BYTE, 0x41, DLE, 0x01, EOF];
        let events = feed_all(&mut m, &frame);
        assert!(events.iter().any(|e| matches!(
            e,
            RxEvent::Fault {
                reason: "standalone DLE"
            }
        )));
        assert!(m.is_idle());
    }

    #[test]
    fn double_escape_roundtrips() {
        let mut m = RxMachine::new(255, Duration::from_millis(300));
        let payload = [0x7D_u8, 0x66];
        let crc = crc16(&payload);
        let mut frame = vec![SOF, AckCode::ACK_BYTE];
        crate::codec::stuff_region(&mut frame, &payload);
        crate::codec::stuff_region(&mut frame, &[(crc >> 8) as u8, crc as u8]);
        frame.push(EOF);
        let events = feed_all(&mut m, &frame);
        assert_eq!(
            *events.last().unwrap(),
            RxEvent::FrameDelivered {
                ack: AckCode::Ack,
                payload: payload.to_vec()
            }
        );
    }

    #[test]
    fn oversize_payload_aborts() {
        let mut m = RxMachine::new(2, Duration::from_millis(300));
        let now = Instant::now();
        m.feed(SOF, now);
        m.feed(AckCode::ACK_BYTE, now);
        for b in [1u8, 2, 3, 4, 5] {
            let ev = m.feed(b, now);
            if let RxEvent::Fault { reason } = ev {
                assert_eq!(reason, "payload oversized");
                return;
            }
        }
        panic!("expected oversize fault");
    }

    #[test]
    fn single_byte_region_is_too_short_for_a_crc_trailer_and_aborts() {
        let mut m = RxMachine::new(255, Duration::from_millis(300));
        let frame = [SOF, AckCode::ACK_BYTE, 0x41, EOF];
        let events = feed_all(&mut m, &frame);
        assert_eq!(
            *events.last().unwrap(),
            RxEvent::Fault {
                reason: "frame shorter than the CRC trailer"
            }
        );
        assert!(m.is_idle());
    }

    #[test]
    fn empty_frame_without_expect_response_is_just_a_signal() {
        let mut m = RxMachine::new(255, Duration::from_millis(300));
        let frame = [SOF, AckCode::ACK_BYTE, EOF];
        let events = feed_all(&mut m, &frame);
        assert_eq!(*events.last().unwrap(), RxEvent::EmptyFrame);
    }

    #[test]
    fn timeout_resets_in_flight_frame() {
        let mut m = RxMachine::new(255, Duration::from_millis(10));
        let start = Instant::now();
        m.feed(SOF, start);
        m.feed(AckCode::ACK_BYTE, start);
        let later = start + Duration::from_millis(50);
        let event = m.tick_timeout(later);
        assert_eq!(
            event,
            Some(RxEvent::Fault {
                reason: "receiving frame timeout"
            })
        );
        assert!(m.is_idle());
    }
}
