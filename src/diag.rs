//! Diagnostic sink: a single narrow channel for human-readable, non-fatal
//! causes observed by the receive state machine and the send paths.
//!
//! Mirrors the source's `debug()` method (`node id`, calling function name,
//! cause string), generalized into a small trait so a caller can log, drop,
//! or forward diagnostics instead of the source's hardcoded `print()`.

use log::{debug, warn};

/// One diagnostic observation.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub node_id: u32,
    pub operation: &'static str,
    pub cause: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SDP node {} in {}: {}",
            self.node_id, self.operation, self.cause
        )
    }
}

/// Receives diagnostics produced by a `Node`. Implementations may log,
/// drop, or forward them to some other collector.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diag: Diagnostic);
}

/// Default sink: forwards to the `log` crate, targeting the node id so
/// multiple nodes in one process can be told apart in log output, the way
/// the teacher's examples target `log::debug!(target: self.name.as_str(), ...)`.
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diag: Diagnostic) {
        let target = format!("sdp::node{}", diag.node_id);
        if diag.cause.contains("timeout") || diag.cause.contains("oversiz") {
            debug!(target: &target, "{}", diag);
        } else {
            warn!(target: &target, "{}", diag);
        }
    }
}

/// Sink that drops every diagnostic. Useful for tests that want to assert
/// on other outcomes without log noise.
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&self, _diag: Diagnostic) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct CollectingSink(Arc<Mutex<Vec<String>>>);

    impl DiagnosticSink for CollectingSink {
        fn report(&self, diag: Diagnostic) {
            self.0.lock().unwrap().push(diag.cause);
        }
    }

    #[test]
    fn sink_receives_reported_diagnostics() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = CollectingSink(log.clone());
        sink.report(Diagnostic {
            node_id: 0,
            operation: "send_request",
            cause: "timeout expecting response".into(),
        });
        assert_eq!(log.lock().unwrap().as_slice(), ["timeout expecting response"]);
    }
}
