//! The byte channel: the narrow transport contract the protocol is laid
//! over. `SerialChannel` backs it with a real serial port (via the
//! `serialport` crate); `LoopbackChannel` backs it with two in-memory
//! queues, used by tests and the multi-threaded demo the way the teacher's
//! `examples/multithread.rs` wires two `Uart`s together with `mpsc`
//! channels.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// External collaborator contract (§6): open/close, non-blocking read of
/// whatever bytes are already available, and a timed write.
pub trait ByteChannel: Send {
    fn is_open(&self) -> bool;
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()>;
    fn bytes_available(&mut self) -> usize;
    fn read(&mut self, max: usize) -> std::io::Result<Vec<u8>>;
    fn flush_input(&mut self);
    fn flush_output(&mut self);
    fn close(&mut self);
}

/// Real transport: a serial port configured 8-N-1, no flow control.
pub struct SerialChannel {
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialChannel {
    /// Opens `path` at `baud`, applying the fixed framing §6 mandates and
    /// the given read/write timeouts.
    pub fn open(
        path: &str,
        baud: u32,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> std::io::Result<Self> {
        let port = serialport::new(path, baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(read_timeout.max(write_timeout))
            .open()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(SerialChannel { port: Some(port) })
    }
}

impl ByteChannel for SerialChannel {
    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "channel closed"))?;
        let written = port.write(bytes)?;
        if written != bytes.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "partial write treated as failure",
            ));
        }
        port.flush()
    }

    fn bytes_available(&mut self) -> usize {
        self.port
            .as_mut()
            .and_then(|p| p.bytes_to_read().ok())
            .unwrap_or(0) as usize
    }

    fn read(&mut self, max: usize) -> std::io::Result<Vec<u8>> {
        let Some(port) = self.port.as_mut() else {
            return Ok(Vec::new());
        };
        let mut buf = vec![0u8; max];
        match port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn flush_input(&mut self) {
        if let Some(port) = &mut self.port {
            let _ = port.clear(serialport::ClearBuffer::Input);
        }
    }

    fn flush_output(&mut self) {
        if let Some(port) = &mut self.port {
            let _ = port.clear(serialport::ClearBuffer::Output);
        }
    }

    fn close(&mut self) {
        self.port = None;
    }
}

#[derive(Clone, Default)]
struct LoopbackQueues {
    inbound: Arc<Mutex<VecDeque<u8>>>,
}

/// In-memory, queue-backed channel for tests and demos. Two endpoints
/// created with [`LoopbackChannel::pair`] are cross-wired: writing to one
/// makes the bytes available for reading on the other.
pub struct LoopbackChannel {
    outbound: LoopbackQueues,
    inbound: LoopbackQueues,
    open: bool,
}

impl LoopbackChannel {
    /// Builds two cross-wired endpoints, as if connected by a wire.
    pub fn pair() -> (LoopbackChannel, LoopbackChannel) {
        let a_to_b = LoopbackQueues::default();
        let b_to_a = LoopbackQueues::default();
        (
            LoopbackChannel {
                outbound: a_to_b.clone(),
                inbound: b_to_a.clone(),
                open: true,
            },
            LoopbackChannel {
                outbound: b_to_a,
                inbound: a_to_b,
                open: true,
            },
        )
    }

    /// A channel with nobody on the other end: writes vanish, reads never
    /// produce bytes. Used to exercise the response-timeout/retry scenario.
    pub fn silent() -> LoopbackChannel {
        LoopbackChannel {
            outbound: LoopbackQueues::default(),
            inbound: LoopbackQueues::default(),
            open: true,
        }
    }
}

impl ByteChannel for LoopbackChannel {
    fn is_open(&self) -> bool {
        self.open
    }

    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        if !self.open {
            return Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "channel closed"));
        }
        self.outbound.inbound.lock().unwrap().extend(bytes.iter().copied());
        Ok(())
    }

    fn bytes_available(&mut self) -> usize {
        self.inbound.inbound.lock().unwrap().len()
    }

    fn read(&mut self, max: usize) -> std::io::Result<Vec<u8>> {
        let mut q = self.inbound.inbound.lock().unwrap();
        let n = max.min(q.len());
        Ok(q.drain(..n).collect())
    }

    fn flush_input(&mut self) {
        self.inbound.inbound.lock().unwrap().clear();
    }

    fn flush_output(&mut self) {
        self.outbound.inbound.lock().unwrap().clear();
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_pair_delivers_written_bytes_to_peer() {
        let (mut a, mut b) = LoopbackChannel::pair();
        a.write(&[1, 2, 3]).unwrap();
        assert_eq!(b.bytes_available(), 3);
        assert_eq!(b.read(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(b.bytes_available(), 0);
    }

    #[test]
    fn closed_channel_rejects_writes() {
        let (mut a, _b) = LoopbackChannel::pair();
        a.close();
        assert!(a.write(&[1]).is_err());
    }

    #[test]
    fn silent_channel_never_yields_bytes() {
        let mut s = LoopbackChannel::silent();
        s.write(&[9, 9]).unwrap();
        assert_eq!(s.bytes_available(), 0);
    }
}
