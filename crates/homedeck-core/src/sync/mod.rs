// ── Event/state synchronization engine ──
//
// Consumes the broadcast envelope stream from `homedeck_api::events`
// and fans each event out to the handler registered for its object
// type. For Insert/Update/Refresh the referenced object is resolved
// first (from the payload, or via a backend fetch for types that need
// the authoritative record); Delete needs no resolution. A handler
// failure is reported and dispatch continues -- one faulty handler must
// never break the stream for the others.

mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use homedeck_api::{BackendClient, EventEnvelope, EventType, ObjectType};

use crate::error::CoreError;
use crate::report::{FaultReporter, Subsystem};
use crate::store::DataStore;

pub use handlers::{
    ConditionCheckHandler, DisabledPluginsHandler, NotificationHandler, PluginHandler,
    ServerHandler, StatusHandler, UserHandler,
};

/// A typed adapter translating generic events into store mutations for
/// one object type.
pub trait EntityEventHandler: Send + Sync {
    /// The object type this handler consumes; everything else on the
    /// stream is filtered out before the handler sees it.
    fn object_type(&self) -> ObjectType;

    /// Resolve the referenced object for Insert/Update/Refresh.
    ///
    /// May return the parsed payload directly or fetch the
    /// authoritative record from the backend. The future yields exactly
    /// once (first-value-only), so a handler never sees two resolutions
    /// for one event.
    fn resolve<'a>(
        &'a self,
        envelope: &'a EventEnvelope,
    ) -> futures_util::future::BoxFuture<'a, Result<Option<serde_json::Value>, CoreError>>;

    /// Apply an Insert event.
    fn apply_insert(
        &self,
        envelope: &EventEnvelope,
        resolved: Option<&serde_json::Value>,
    ) -> Result<(), CoreError>;

    /// Apply an Update or Refresh event. Responsible for the
    /// version/preliminary comparison; deciding not to mutate is a
    /// silent no-op, not an error.
    fn apply_update(
        &self,
        envelope: &EventEnvelope,
        resolved: Option<&serde_json::Value>,
    ) -> Result<(), CoreError>;

    /// Apply a Delete event. The key alone suffices -- the entity is
    /// already gone server-side.
    fn apply_delete(&self, envelope: &EventEnvelope) -> Result<(), CoreError>;
}

/// Routes envelopes to registered handlers.
pub struct SyncEngine {
    handlers: HashMap<ObjectType, Arc<dyn EntityEventHandler>>,
    reporter: FaultReporter,
}

impl SyncEngine {
    pub fn new(reporter: FaultReporter) -> Self {
        Self {
            handlers: HashMap::new(),
            reporter,
        }
    }

    /// Register a handler. A later registration for the same object
    /// type replaces the earlier one.
    pub fn register(&mut self, handler: Arc<dyn EntityEventHandler>) {
        self.handlers.insert(handler.object_type(), handler);
    }

    /// The full standard handler set over `store`.
    pub fn standard(
        store: Arc<DataStore>,
        client: Arc<BackendClient>,
        reporter: FaultReporter,
    ) -> Self {
        let mut engine = Self::new(reporter);
        engine.register(Arc::new(ServerHandler::new(Arc::clone(&store), client)));
        engine.register(Arc::new(PluginHandler::new(Arc::clone(&store))));
        engine.register(Arc::new(DisabledPluginsHandler::new(Arc::clone(&store))));
        engine.register(Arc::new(UserHandler::new(Arc::clone(&store))));
        engine.register(Arc::new(StatusHandler::new(Arc::clone(&store))));
        engine.register(Arc::new(ConditionCheckHandler::new(Arc::clone(&store))));
        engine.register(Arc::new(NotificationHandler::new(store)));
        engine
    }

    /// Consume the envelope stream until cancellation or stream close.
    ///
    /// Cancellation aborts an in-flight resolution too: a late-arriving
    /// fetch for a torn-down session never mutates the store.
    pub async fn run(
        self: Arc<Self>,
        mut rx: broadcast::Receiver<Arc<EventEnvelope>>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                received = rx.recv() => {
                    match received {
                        Ok(envelope) => {
                            tokio::select! {
                                biased;
                                () = cancel.cancelled() => break,
                                () = self.dispatch(&envelope) => {}
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event dispatch lagged behind the stream");
                            self.reporter.report(
                                Subsystem::EventStream,
                                format!("dropped {skipped} events (consumer lagged)"),
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        debug!("sync engine exiting");
    }

    /// Route one envelope. Never returns an error: handler and
    /// resolution failures are reported and swallowed here so dispatch
    /// for other handlers continues unaffected.
    pub(crate) async fn dispatch(&self, envelope: &EventEnvelope) {
        let Some(handler) = self.handlers.get(&envelope.object_type) else {
            debug!(object_type = %envelope.object_type, "no handler registered, dropping event");
            return;
        };

        let result = match envelope.event_type {
            EventType::Delete => handler.apply_delete(envelope),
            EventType::Insert => {
                let resolved = self.resolve(handler.as_ref(), envelope).await;
                handler.apply_insert(envelope, resolved.as_ref())
            }
            EventType::Update | EventType::Refresh => {
                let resolved = self.resolve(handler.as_ref(), envelope).await;
                handler.apply_update(envelope, resolved.as_ref())
            }
        };

        if let Err(e) = result {
            self.reporter.report(
                Subsystem::EventHandler,
                format!(
                    "{} handler failed for key {}: {e}",
                    envelope.object_type, envelope.key
                ),
            );
        }
    }

    /// Resolve with failure degraded to `None` -- the handler is still
    /// invoked with an absent object, mirroring the
    /// `(event, resolvedObjectOrUndefined)` contract.
    async fn resolve(
        &self,
        handler: &dyn EntityEventHandler,
        envelope: &EventEnvelope,
    ) -> Option<serde_json::Value> {
        match handler.resolve(envelope).await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.reporter.report(
                    Subsystem::EventStream,
                    format!(
                        "object resolution failed for {} key {}: {e}",
                        envelope.object_type, envelope.key
                    ),
                );
                None
            }
        }
    }
}
