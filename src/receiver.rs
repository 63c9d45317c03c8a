//! Receiver loop: the dedicated thread that pulls bytes off the channel,
//! drives the receive state machine, and routes completed frames.
//!
//! Grounded on the same split the teacher uses in `examples/multithread.rs`
//! (one thread owns the transport read side, hands bytes to the protocol)
//! and on the `ashv2` pack example's `Receiver` (`Arc<Mutex<_>>` shared
//! state plus an `is_running()` check against a shared stop flag).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::channel::ByteChannel;
use crate::codec::{self, AckCode};
use crate::diag::{Diagnostic, DiagnosticSink};
use crate::rx::{RxEvent, RxMachine};

/// Rx-side state shared between the receiver thread and the caller thread
/// blocked in `send_request`. Guarded by a single mutex so the §5
/// publish/acquire ordering on `expect_response`/`ack`/`rx_payload` falls
/// out of normal lock semantics.
pub(crate) struct SharedRx {
    pub rx: RxMachine,
    pub expect_response: bool,
    pub last_ack: AckCode,
    pub last_payload: Vec<u8>,
}

impl SharedRx {
    pub fn new(max_payload: usize, frame_timeout: Duration) -> Self {
        SharedRx {
            rx: RxMachine::new(max_payload, frame_timeout),
            expect_response: false,
            last_ack: AckCode::Ack,
            last_payload: Vec::new(),
        }
    }
}

/// Wakes a thread parked in `send_request` the moment the receiver clears
/// `expect_response`, replacing the source's busy-wait loop per the
/// "Concurrency primitive choice" design note.
pub(crate) type ResponseSignal = Condvar;

/// Per-enable stop request. The receiver clears `requested` on its way out
/// so a later `enable_receiver` can reuse the same flag without the caller
/// having to reset it (§9 "stop-flag reuse semantics").
#[derive(Default)]
pub(crate) struct StopFlag {
    requested: AtomicBool,
    stopped: Mutex<bool>,
    stopped_cv: Condvar,
}

impl StopFlag {
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    fn should_stop(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
        *self.stopped.lock().unwrap() = true;
        self.stopped_cv.notify_all();
    }

    /// Blocks until the receiver thread has observed the stop request and
    /// exited, or `timeout` elapses. Returns `true` if it stopped in time.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        let guard = self.stopped.lock().unwrap();
        if *guard {
            return true;
        }
        let (guard, result) = self.stopped_cv.wait_timeout(guard, timeout).unwrap();
        *guard || !result.timed_out()
    }

    fn reset_for_reuse(&self) {
        *self.stopped.lock().unwrap() = false;
    }
}

pub(crate) struct ReceiverLoop {
    handle: Option<JoinHandle<()>>,
    stop: Arc<StopFlag>,
}

#[allow(clippy::too_many_arguments)]
impl ReceiverLoop {
    pub fn spawn(
        node_id: u32,
        max_payload: usize,
        channel: Arc<Mutex<dyn ByteChannel>>,
        shared: Arc<Mutex<SharedRx>>,
        signal: Arc<ResponseSignal>,
        diag: Arc<dyn DiagnosticSink>,
        handler: Arc<dyn Fn(&[u8]) + Send + Sync>,
        io_debug: bool,
    ) -> Self {
        let stop = Arc::new(StopFlag::default());
        stop.reset_for_reuse();
        let stop_for_thread = stop.clone();

        let handle = thread::Builder::new()
            .name(format!("sdp-receiver-{node_id}"))
            .spawn(move || {
                receive_loop(
                    node_id,
                    max_payload,
                    channel,
                    shared,
                    signal,
                    diag,
                    handler,
                    stop_for_thread,
                    io_debug,
                )
            })
            .expect("failed to spawn receiver thread");

        ReceiverLoop {
            handle: Some(handle),
            stop,
        }
    }

    /// Signals the receiver to stop without waiting for it to exit. Used on
    /// a write failure (§4.7.1.b / §7 "Write failure: stop receiver; fail
    /// attempt") where the caller just needs the receiver to give up the
    /// channel, not a synchronous teardown.
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn stop(mut self, timeout: Duration) -> bool {
        self.stop.request_stop();
        let stopped = self.stop.wait_stopped(timeout);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        stopped
    }
}

#[allow(clippy::too_many_arguments)]
fn receive_loop(
    node_id: u32,
    max_payload: usize,
    channel: Arc<Mutex<dyn ByteChannel>>,
    shared: Arc<Mutex<SharedRx>>,
    signal: Arc<ResponseSignal>,
    diag: Arc<dyn DiagnosticSink>,
    handler: Arc<dyn Fn(&[u8]) + Send + Sync>,
    stop: Arc<StopFlag>,
    io_debug: bool,
) {
    while !stop.should_stop() {
        let bytes = {
            let mut ch = channel.lock().unwrap();
            let n = ch.bytes_available();
            if n == 0 {
                Vec::new()
            } else {
                ch.read(n).unwrap_or_default()
            }
        };

        if bytes.is_empty() {
            let now = Instant::now();
            let mut guard = shared.lock().unwrap();
            if let Some(RxEvent::Fault { reason }) = guard.rx.tick_timeout(now) {
                drop(guard);
                diag.report(Diagnostic {
                    node_id,
                    operation: "receive",
                    cause: reason.to_string(),
                });
            }
            thread::sleep(Duration::from_millis(2));
            continue;
        }

        if io_debug {
            diag.report(Diagnostic {
                node_id,
                operation: "receive",
                cause: format!("read {} bytes", bytes.len()),
            });
        }

        for byte in bytes {
            let now = Instant::now();
            let mut guard = shared.lock().unwrap();
            let event = guard.rx.feed(byte, now);
            match event {
                RxEvent::NeedMore => {}
                RxEvent::EmptyFrame => {
                    if guard.expect_response {
                        guard.expect_response = false;
                        guard.last_ack = AckCode::Ack;
                        guard.last_payload.clear();
                        drop(guard);
                        signal.notify_all();
                    } else {
                        drop(guard);
                        diag.report(Diagnostic {
                            node_id,
                            operation: "receive",
                            cause: "empty payload while not expecting response".into(),
                        });
                    }
                }
                RxEvent::FrameDelivered { ack, payload } => {
                    guard.last_ack = ack;
                    if guard.expect_response {
                        guard.expect_response = false;
                        guard.last_payload = payload;
                        drop(guard);
                        signal.notify_all();
                    } else if ack == AckCode::Ack {
                        drop(guard);
                        handler(&payload);
                    } else {
                        drop(guard);
                        diag.report(Diagnostic {
                            node_id,
                            operation: "receive",
                            cause: "CRC validation failure".into(),
                        });
                        if let Ok(frame) = codec::encode(AckCode::Nack, &payload, max_payload) {
                            let mut ch = channel.lock().unwrap();
                            if ch.write(&frame).is_err() {
                                diag.report(Diagnostic {
                                    node_id,
                                    operation: "send_response",
                                    cause: "transmission failure".into(),
                                });
                            }
                        }
                    }
                }
                RxEvent::Fault { reason } => {
                    drop(guard);
                    diag.report(Diagnostic {
                        node_id,
                        operation: "receive",
                        cause: reason.to_string(),
                    });
                }
            }
        }
    }

    stop.clear();
}
