// ── Per-entity event handlers ──
//
// One handler per object type. Most types resolve the referenced
// object straight from the event payload; servers fetch the
// authoritative record from the backend instead, because server events
// carry partial payloads.
//
// Update/Refresh events go through the version gate: a stored entity
// with the same version as the envelope is left alone unless it is a
// preliminary placeholder. Replaying the same event after a silent
// stream resume therefore cannot duplicate or churn state.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;

use homedeck_api::{BackendClient, EventEnvelope, ObjectType};

use super::EntityEventHandler;
use crate::error::CoreError;
use crate::model::{
    ConditionCheckResult, Notification, Plugin, Server, Status, User, Versioned,
};
use crate::store::DataStore;

// ── Shared helpers ──────────────────────────────────────────────────

/// Parse the envelope payload as raw JSON (the default resolver).
fn payload_value(envelope: &EventEnvelope) -> Result<Option<serde_json::Value>, CoreError> {
    envelope.payload().map_err(CoreError::from)
}

/// Decode the resolved object into a typed entity.
fn decode_entity<T: DeserializeOwned>(
    envelope: &EventEnvelope,
    resolved: Option<&serde_json::Value>,
) -> Result<T, CoreError> {
    let value = resolved.ok_or_else(|| {
        CoreError::Decode(format!(
            "{} event for key {} carries no object",
            envelope.object_type, envelope.key
        ))
    })?;
    serde_json::from_value(value.clone()).map_err(|e| CoreError::Decode(e.to_string()))
}

/// The version gate: replace the local copy only if the inbound version
/// differs, or the local copy is a preliminary placeholder.
fn should_apply<T: Versioned>(existing: Option<&T>, incoming_version: u64) -> bool {
    existing.is_none_or(|e| e.is_preliminary() || e.version() != incoming_version)
}

// ── Servers ─────────────────────────────────────────────────────────

/// Server events resolve via a backend fetch: event payloads are
/// partial, and the store should hold what the backend actually has.
pub struct ServerHandler {
    store: Arc<DataStore>,
    client: Arc<BackendClient>,
}

impl ServerHandler {
    pub fn new(store: Arc<DataStore>, client: Arc<BackendClient>) -> Self {
        Self { store, client }
    }
}

impl EntityEventHandler for ServerHandler {
    fn object_type(&self) -> ObjectType {
        ObjectType::Server
    }

    fn resolve<'a>(
        &'a self,
        envelope: &'a EventEnvelope,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, CoreError>> {
        async move {
            let server = self.client.get_server(&envelope.key, false).await?;
            let value =
                serde_json::to_value(server).map_err(|e| CoreError::Decode(e.to_string()))?;
            Ok(Some(value))
        }
        .boxed()
    }

    fn apply_insert(
        &self,
        envelope: &EventEnvelope,
        resolved: Option<&serde_json::Value>,
    ) -> Result<(), CoreError> {
        let server: Server = decode_entity(envelope, resolved)?;
        // Upsert, not insert: a preliminary placeholder for the same
        // address must be reconciled, and a replayed insert after a
        // stream resume must not duplicate state.
        self.store.servers().upsert_one(server);
        Ok(())
    }

    fn apply_update(
        &self,
        envelope: &EventEnvelope,
        resolved: Option<&serde_json::Value>,
    ) -> Result<(), CoreError> {
        let existing = self.store.servers().by_key(&envelope.key);
        if !should_apply(existing.as_deref(), envelope.version) {
            return Ok(());
        }
        let server: Server = decode_entity(envelope, resolved)?;
        self.store.servers().upsert_one(server);
        Ok(())
    }

    fn apply_delete(&self, envelope: &EventEnvelope) -> Result<(), CoreError> {
        self.store.servers().remove_one(&envelope.key);
        Ok(())
    }
}

// ── Payload-resolved handlers ───────────────────────────────────────

macro_rules! payload_handler {
    ($(#[$doc:meta])* $name:ident, $entity:ty, $object_type:expr, $table:ident) => {
        $(#[$doc])*
        pub struct $name {
            store: Arc<DataStore>,
        }

        impl $name {
            pub fn new(store: Arc<DataStore>) -> Self {
                Self { store }
            }
        }

        impl EntityEventHandler for $name {
            fn object_type(&self) -> ObjectType {
                $object_type
            }

            fn resolve<'a>(
                &'a self,
                envelope: &'a EventEnvelope,
            ) -> BoxFuture<'a, Result<Option<serde_json::Value>, CoreError>> {
                std::future::ready(payload_value(envelope)).boxed()
            }

            fn apply_insert(
                &self,
                envelope: &EventEnvelope,
                resolved: Option<&serde_json::Value>,
            ) -> Result<(), CoreError> {
                let entity: $entity = decode_entity(envelope, resolved)?;
                self.store.$table().upsert_one(entity);
                Ok(())
            }

            fn apply_update(
                &self,
                envelope: &EventEnvelope,
                resolved: Option<&serde_json::Value>,
            ) -> Result<(), CoreError> {
                let existing = self.store.$table().by_key(&envelope.key);
                if !should_apply(existing.as_deref(), envelope.version) {
                    return Ok(());
                }
                let entity: $entity = decode_entity(envelope, resolved)?;
                self.store.$table().upsert_one(entity);
                Ok(())
            }

            fn apply_delete(&self, envelope: &EventEnvelope) -> Result<(), CoreError> {
                self.store.$table().remove_one(&envelope.key);
                Ok(())
            }
        }
    };
}

payload_handler!(
    /// Plugin events carry the full plugin record inline.
    PluginHandler,
    Plugin,
    ObjectType::Plugin,
    plugins
);

payload_handler!(
    /// User events carry the full (credential-free) account inline.
    UserHandler,
    User,
    ObjectType::User,
    users
);

payload_handler!(
    /// Status events carry the full liveness record inline.
    StatusHandler,
    Status,
    ObjectType::Status,
    statuses
);

payload_handler!(
    /// Condition-check events carry the full result inline, keyed by
    /// the composite `"{ipaddress}_{data_id}"`.
    ConditionCheckHandler,
    ConditionCheckResult,
    ObjectType::ConditionCheckResult,
    checks
);

// ── Notifications ───────────────────────────────────────────────────

/// Notifications are unversioned: updates always apply.
pub struct NotificationHandler {
    store: Arc<DataStore>,
}

impl NotificationHandler {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self { store }
    }
}

impl EntityEventHandler for NotificationHandler {
    fn object_type(&self) -> ObjectType {
        ObjectType::Notification
    }

    fn resolve<'a>(
        &'a self,
        envelope: &'a EventEnvelope,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, CoreError>> {
        std::future::ready(payload_value(envelope)).boxed()
    }

    fn apply_insert(
        &self,
        envelope: &EventEnvelope,
        resolved: Option<&serde_json::Value>,
    ) -> Result<(), CoreError> {
        let notification: Notification = decode_entity(envelope, resolved)?;
        self.store.notifications().add_one(notification);
        Ok(())
    }

    fn apply_update(
        &self,
        envelope: &EventEnvelope,
        resolved: Option<&serde_json::Value>,
    ) -> Result<(), CoreError> {
        let notification: Notification = decode_entity(envelope, resolved)?;
        self.store.notifications().upsert_one(notification);
        Ok(())
    }

    fn apply_delete(&self, envelope: &EventEnvelope) -> Result<(), CoreError> {
        self.store.notifications().remove_one(&envelope.key);
        Ok(())
    }
}

// ── Disabled plugins ────────────────────────────────────────────────

/// The disabled-plugin set travels as one value: a JSON array of ids,
/// or the comma-joined form the actions endpoint uses.
pub struct DisabledPluginsHandler {
    store: Arc<DataStore>,
}

impl DisabledPluginsHandler {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self { store }
    }

    fn parse_ids(raw: &str) -> Vec<String> {
        if raw.trim().is_empty() {
            return Vec::new();
        }
        if let Ok(ids) = serde_json::from_str::<Vec<String>>(raw) {
            return ids;
        }
        raw.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

impl EntityEventHandler for DisabledPluginsHandler {
    fn object_type(&self) -> ObjectType {
        ObjectType::DisabledPlugins
    }

    fn resolve<'a>(
        &'a self,
        _envelope: &'a EventEnvelope,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, CoreError>> {
        // The raw value is not necessarily JSON; parsing happens in the
        // apply callbacks.
        std::future::ready(Ok(None)).boxed()
    }

    fn apply_insert(
        &self,
        envelope: &EventEnvelope,
        _resolved: Option<&serde_json::Value>,
    ) -> Result<(), CoreError> {
        self.store
            .disabled_plugins()
            .add_many(Self::parse_ids(&envelope.value));
        Ok(())
    }

    fn apply_update(
        &self,
        envelope: &EventEnvelope,
        _resolved: Option<&serde_json::Value>,
    ) -> Result<(), CoreError> {
        // The event value is the complete set: replace wholesale.
        self.store
            .disabled_plugins()
            .replace_all(Self::parse_ids(&envelope.value));
        Ok(())
    }

    fn apply_delete(&self, envelope: &EventEnvelope) -> Result<(), CoreError> {
        self.store.disabled_plugins().remove_one(&envelope.key);
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::report::FaultReporter;
    use crate::sync::SyncEngine;
    use homedeck_api::{EventType, TransportConfig};

    fn envelope(
        object_type: ObjectType,
        event_type: EventType,
        key: &str,
        value: serde_json::Value,
        version: u64,
    ) -> EventEnvelope {
        EventEnvelope {
            object_type,
            event_type,
            key_name: "key".into(),
            key: key.into(),
            value: if value.is_null() {
                String::new()
            } else {
                value.to_string()
            },
            version,
        }
    }

    fn status(ip: &str, is_running: bool, version: u64) -> Status {
        Status {
            ipaddress: ip.into(),
            is_running,
            version,
            is_preliminary: false,
        }
    }

    fn engine_without_server_handler(store: &Arc<DataStore>) -> SyncEngine {
        let mut engine = SyncEngine::new(FaultReporter::new());
        engine.register(Arc::new(PluginHandler::new(Arc::clone(store))));
        engine.register(Arc::new(DisabledPluginsHandler::new(Arc::clone(store))));
        engine.register(Arc::new(UserHandler::new(Arc::clone(store))));
        engine.register(Arc::new(StatusHandler::new(Arc::clone(store))));
        engine.register(Arc::new(ConditionCheckHandler::new(Arc::clone(store))));
        engine.register(Arc::new(NotificationHandler::new(Arc::clone(store))));
        engine
    }

    #[tokio::test]
    async fn update_with_same_version_is_suppressed() {
        let store = Arc::new(DataStore::new());
        store.statuses().upsert_one(status("10.0.0.5", true, 3));
        let held = store.status_by_ip("10.0.0.5").unwrap();

        let engine = engine_without_server_handler(&store);
        engine
            .dispatch(&envelope(
                ObjectType::Status,
                EventType::Update,
                "10.0.0.5",
                serde_json::json!({"ipaddress":"10.0.0.5","is_running":false,"version":3}),
                3,
            ))
            .await;

        // Same version, not preliminary: stored entity untouched,
        // by reference.
        let after = store.status_by_ip("10.0.0.5").unwrap();
        assert!(Arc::ptr_eq(&held, &after));
        assert!(after.is_running);
    }

    #[tokio::test]
    async fn update_with_newer_version_replaces() {
        let store = Arc::new(DataStore::new());
        store.statuses().upsert_one(status("10.0.0.5", true, 3));

        let engine = engine_without_server_handler(&store);
        engine
            .dispatch(&envelope(
                ObjectType::Status,
                EventType::Update,
                "10.0.0.5",
                serde_json::json!({"ipaddress":"10.0.0.5","is_running":false,"version":4}),
                4,
            ))
            .await;

        let after = store.status_by_ip("10.0.0.5").unwrap();
        assert!(!after.is_running);
        assert_eq!(after.version, 4);
    }

    #[tokio::test]
    async fn preliminary_entity_is_replaced_even_at_same_version() {
        let store = Arc::new(DataStore::new());
        store.statuses().upsert_one(Status {
            is_preliminary: true,
            ..status("10.0.0.5", false, 3)
        });

        let engine = engine_without_server_handler(&store);
        engine
            .dispatch(&envelope(
                ObjectType::Status,
                EventType::Update,
                "10.0.0.5",
                serde_json::json!({"ipaddress":"10.0.0.5","is_running":true,"version":3}),
                3,
            ))
            .await;

        let after = store.status_by_ip("10.0.0.5").unwrap();
        assert!(after.is_running);
        assert!(!after.is_preliminary);
    }

    #[tokio::test]
    async fn delete_event_removes_server() {
        let store = Arc::new(DataStore::new());
        store.servers().add_one(Server {
            ipaddress: "10.0.0.5".into(),
            name: "host1".into(),
            features: Vec::new(),
            version: 1,
            is_preliminary: false,
        });

        // Delete needs no backend round trip, so a client pointing
        // nowhere is fine.
        let client = Arc::new(
            BackendClient::new(
                url::Url::parse("https://127.0.0.1:1").unwrap(),
                &TransportConfig::default(),
            )
            .unwrap(),
        );
        let mut engine = SyncEngine::new(FaultReporter::new());
        engine.register(Arc::new(ServerHandler::new(Arc::clone(&store), client)));

        engine
            .dispatch(&envelope(
                ObjectType::Server,
                EventType::Delete,
                "10.0.0.5",
                serde_json::Value::Null,
                0,
            ))
            .await;

        assert!(store.server_by_ip("10.0.0.5").is_none());
    }

    #[tokio::test]
    async fn faulty_handler_does_not_break_others() {
        struct ExplodingHandler;

        impl EntityEventHandler for ExplodingHandler {
            fn object_type(&self) -> ObjectType {
                ObjectType::Plugin
            }
            fn resolve<'a>(
                &'a self,
                _envelope: &'a EventEnvelope,
            ) -> BoxFuture<'a, Result<Option<serde_json::Value>, CoreError>> {
                std::future::ready(Ok(None)).boxed()
            }
            fn apply_insert(
                &self,
                _envelope: &EventEnvelope,
                _resolved: Option<&serde_json::Value>,
            ) -> Result<(), CoreError> {
                Err(CoreError::Internal("boom".into()))
            }
            fn apply_update(
                &self,
                _envelope: &EventEnvelope,
                _resolved: Option<&serde_json::Value>,
            ) -> Result<(), CoreError> {
                Err(CoreError::Internal("boom".into()))
            }
            fn apply_delete(&self, _envelope: &EventEnvelope) -> Result<(), CoreError> {
                Err(CoreError::Internal("boom".into()))
            }
        }

        let store = Arc::new(DataStore::new());
        let reporter = FaultReporter::new();
        let mut faults = reporter.subscribe();

        let mut engine = SyncEngine::new(reporter);
        engine.register(Arc::new(ExplodingHandler));
        engine.register(Arc::new(StatusHandler::new(Arc::clone(&store))));

        engine
            .dispatch(&envelope(
                ObjectType::Plugin,
                EventType::Insert,
                "docker",
                serde_json::json!({"id":"docker"}),
                1,
            ))
            .await;
        engine
            .dispatch(&envelope(
                ObjectType::Status,
                EventType::Update,
                "10.0.0.5",
                serde_json::json!({"ipaddress":"10.0.0.5","is_running":true,"version":1}),
                1,
            ))
            .await;

        // The faulty handler was reported...
        let fault = faults.try_recv().unwrap();
        assert_eq!(fault.subsystem, crate::report::Subsystem::EventHandler);
        // ...and the status handler still processed its event.
        assert!(store.status_by_ip("10.0.0.5").unwrap().is_running);
    }

    #[tokio::test]
    async fn events_without_a_handler_are_dropped() {
        let store = Arc::new(DataStore::new());
        let engine = SyncEngine::new(FaultReporter::new());

        engine
            .dispatch(&envelope(
                ObjectType::Status,
                EventType::Update,
                "10.0.0.5",
                serde_json::json!({"ipaddress":"10.0.0.5"}),
                1,
            ))
            .await;

        assert!(store.status_by_ip("10.0.0.5").is_none());
    }

    #[test]
    fn disabled_plugin_ids_parse_both_shapes() {
        assert_eq!(
            DisabledPluginsHandler::parse_ids(r#"["smart","wol"]"#),
            vec!["smart".to_owned(), "wol".to_owned()]
        );
        assert_eq!(
            DisabledPluginsHandler::parse_ids("smart, wol"),
            vec!["smart".to_owned(), "wol".to_owned()]
        );
        assert!(DisabledPluginsHandler::parse_ids("  ").is_empty());
    }

    #[tokio::test]
    async fn disabled_plugins_update_replaces_the_set() {
        let store = Arc::new(DataStore::new());
        store.disabled_plugins().add_many(vec!["old".into()]);

        let engine = engine_without_server_handler(&store);
        engine
            .dispatch(&EventEnvelope {
                object_type: ObjectType::DisabledPlugins,
                event_type: EventType::Refresh,
                key_name: "ids".into(),
                key: "disabled".into(),
                value: "smart,wol".into(),
                version: 0,
            })
            .await;

        let ids: Vec<String> = store
            .disabled_plugins()
            .all()
            .iter()
            .map(|id| String::clone(id))
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"smart".to_owned()));
        assert!(!ids.contains(&"old".to_owned()));
    }

    #[tokio::test]
    async fn malformed_payload_is_reported_not_fatal() {
        let store = Arc::new(DataStore::new());
        let reporter = FaultReporter::new();
        let mut faults = reporter.subscribe();

        let mut engine = SyncEngine::new(reporter);
        engine.register(Arc::new(StatusHandler::new(Arc::clone(&store))));

        engine
            .dispatch(&EventEnvelope {
                object_type: ObjectType::Status,
                event_type: EventType::Insert,
                key_name: "ipaddress".into(),
                key: "10.0.0.5".into(),
                value: "{broken".into(),
                version: 1,
            })
            .await;

        assert!(faults.try_recv().is_ok());
        assert!(store.status_by_ip("10.0.0.5").is_none());
    }
}
