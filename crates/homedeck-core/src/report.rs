// ── Fault reporting ──
//
// The central error-reporting collaborator. Nothing in the sync or
// command paths is allowed to crash the process: failures degrade to a
// reported `Fault` plus unchanged state, and front ends subscribe here
// to surface them as non-blocking notifications.

use tokio::sync::broadcast;
use tracing::warn;

const FAULT_CHANNEL_CAPACITY: usize = 64;

/// Which part of the core a fault originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Subsystem {
    EventStream,
    EventHandler,
    Command,
    Persistence,
    Auth,
}

/// One reported, non-fatal failure.
#[derive(Debug, Clone)]
pub struct Fault {
    pub subsystem: Subsystem,
    pub message: String,
}

/// Broadcast-based fault sink. Cheap to clone; reporting never blocks
/// and never fails (no subscribers just means the fault is only logged).
#[derive(Clone)]
pub struct FaultReporter {
    tx: broadcast::Sender<Fault>,
}

impl FaultReporter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FAULT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Record a fault: logged, then broadcast to subscribers.
    pub fn report(&self, subsystem: Subsystem, message: impl Into<String>) {
        let fault = Fault {
            subsystem,
            message: message.into(),
        };
        warn!(subsystem = %fault.subsystem, "{}", fault.message);
        let _ = self.tx.send(fault);
    }

    /// Subscribe to reported faults.
    pub fn subscribe(&self) -> broadcast::Receiver<Fault> {
        self.tx.subscribe()
    }
}

impl Default for FaultReporter {
    fn default() -> Self {
        Self::new()
    }
}
