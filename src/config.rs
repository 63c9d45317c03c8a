use std::time::Duration;

/// Construction-time configuration record.
///
/// Replaces the source's module-level globals (`SDP_DEBUG`,
/// `SDP_RETRANSMIT`, the `SDP_DEFAULT_*` timeout constants) with a single
/// value a `Node` is built from, per the "process-wide state" design note.
#[derive(Debug, Clone, Copy)]
pub struct NodeConfig {
    /// Mirrors the source's `SDP_DEBUG`: enables diagnostic-level logging.
    pub debug: bool,
    /// Mirrors the source's `SDP_DEBUG_IO_DATA`: logs raw bytes in/out.
    pub io_debug: bool,
    /// Maximum number of send attempts for `send_request` (first try + retries).
    pub retransmit_limit: u8,
    /// Max time from SOF observation to EOF.
    pub rx_frame_timeout: Duration,
    /// Per-byte read timeout on the transport; passed to
    /// [`crate::channel::SerialChannel::open`] as its `read_timeout`.
    pub rx_byte_timeout: Duration,
    /// Max time to flush a frame on the wire.
    pub tx_frame_timeout: Duration,
    /// Max wait for a response after sending a request.
    pub response_timeout: Duration,
    /// Pause between retransmit attempts.
    pub retransmit_delay: Duration,
    /// Max wait for the receiver thread to observe a stop request.
    pub thread_stop_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            debug: true,
            io_debug: false,
            retransmit_limit: 2,
            rx_frame_timeout: Duration::from_millis(300),
            rx_byte_timeout: Duration::from_millis(300),
            tx_frame_timeout: Duration::from_millis(300),
            response_timeout: Duration::from_secs(1),
            retransmit_delay: Duration::from_millis(100),
            thread_stop_timeout: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_protocol_table() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.retransmit_limit, 2);
        assert_eq!(cfg.response_timeout, Duration::from_secs(1));
        assert_eq!(cfg.retransmit_delay, Duration::from_millis(100));
    }
}
