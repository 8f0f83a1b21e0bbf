// ── Toast projection ──
//
// Purely derived: given an event, produce zero or one human-readable
// popup descriptor by cross-referencing the store. Never mutates the
// store; tolerates the referenced entity being absent by falling back
// to the raw key.

use homedeck_api::{EventEnvelope, EventType, ObjectType};

use crate::model::Status;
use crate::store::DataStore;

/// A popup descriptor for the front end to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub body: String,
}

/// Derive a toast from an event, or `None` for events that are not
/// worth a popup (refreshes, condition-check churn, ...).
pub fn project(envelope: &EventEnvelope, store: &DataStore) -> Option<Toast> {
    match envelope.object_type {
        ObjectType::Server => server_toast(envelope, store),
        ObjectType::Status => status_toast(envelope, store),
        ObjectType::Plugin => plugin_toast(envelope, store),
        ObjectType::Notification => notification_toast(envelope),
        ObjectType::User => user_toast(envelope),
        // Set churn and check results are reflected in the UI directly.
        ObjectType::DisabledPlugins | ObjectType::ConditionCheckResult => None,
    }
}

/// Display name for a server: its stored name, or the raw key when the
/// entity is absent (or unnamed).
fn server_label(store: &DataStore, key: &str) -> String {
    store
        .server_by_ip(key)
        .filter(|s| !s.name.is_empty())
        .map_or_else(|| key.to_owned(), |s| format!("{} ({key})", s.name))
}

fn server_toast(envelope: &EventEnvelope, store: &DataStore) -> Option<Toast> {
    let label = server_label(store, &envelope.key);
    let body = match envelope.event_type {
        EventType::Insert => format!("Server {label} added"),
        EventType::Update => format!("Server {label} changed"),
        EventType::Delete => format!("Server {label} removed"),
        EventType::Refresh => return None,
    };
    Some(Toast {
        title: "Servers".into(),
        body,
    })
}

fn status_toast(envelope: &EventEnvelope, store: &DataStore) -> Option<Toast> {
    // Only state flips are popup-worthy; deletes and refreshes are not.
    if !matches!(envelope.event_type, EventType::Insert | EventType::Update) {
        return None;
    }
    let status: Status = envelope.payload().ok()??;
    let label = server_label(store, &envelope.key);
    Some(Toast {
        title: "Status".into(),
        body: if status.is_running {
            format!("{label} is up")
        } else {
            format!("{label} is down")
        },
    })
}

fn plugin_toast(envelope: &EventEnvelope, store: &DataStore) -> Option<Toast> {
    let label = store
        .plugin_by_id(&envelope.key)
        .filter(|p| !p.name.is_empty())
        .map_or_else(|| envelope.key.clone(), |p| p.name.clone());
    let body = match envelope.event_type {
        EventType::Insert => format!("Plugin {label} available"),
        EventType::Delete => format!("Plugin {label} removed"),
        EventType::Update | EventType::Refresh => return None,
    };
    Some(Toast {
        title: "Plugins".into(),
        body,
    })
}

fn notification_toast(envelope: &EventEnvelope) -> Option<Toast> {
    if envelope.event_type != EventType::Insert {
        return None;
    }
    let notification: crate::model::Notification = envelope.payload().ok()??;
    Some(Toast {
        title: "Notification".into(),
        body: if notification.message.is_empty() {
            envelope.key.clone()
        } else {
            notification.message
        },
    })
}

fn user_toast(envelope: &EventEnvelope) -> Option<Toast> {
    let body = match envelope.event_type {
        EventType::Insert => format!("User {} added", envelope.key),
        EventType::Delete => format!("User {} removed", envelope.key),
        EventType::Update | EventType::Refresh => return None,
    };
    Some(Toast {
        title: "Users".into(),
        body,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Server;

    fn envelope(
        object_type: ObjectType,
        event_type: EventType,
        key: &str,
        value: &str,
    ) -> EventEnvelope {
        EventEnvelope {
            object_type,
            event_type,
            key_name: "key".into(),
            key: key.into(),
            value: value.into(),
            version: 1,
        }
    }

    #[test]
    fn server_toast_uses_display_name_from_store() {
        let store = DataStore::new();
        store.servers().add_one(Server {
            ipaddress: "10.0.0.5".into(),
            name: "host1".into(),
            features: Vec::new(),
            version: 1,
            is_preliminary: false,
        });

        let toast = project(
            &envelope(ObjectType::Server, EventType::Update, "10.0.0.5", ""),
            &store,
        )
        .unwrap();
        assert_eq!(toast.body, "Server host1 (10.0.0.5) changed");
    }

    #[test]
    fn absent_entity_falls_back_to_raw_key() {
        let store = DataStore::new();
        let toast = project(
            &envelope(ObjectType::Server, EventType::Delete, "10.0.0.5", ""),
            &store,
        )
        .unwrap();
        assert_eq!(toast.body, "Server 10.0.0.5 removed");
    }

    #[test]
    fn status_toast_reports_state_flip() {
        let store = DataStore::new();
        let toast = project(
            &envelope(
                ObjectType::Status,
                EventType::Update,
                "10.0.0.5",
                r#"{"ipaddress":"10.0.0.5","is_running":false}"#,
            ),
            &store,
        )
        .unwrap();
        assert_eq!(toast.body, "10.0.0.5 is down");
    }

    #[test]
    fn projection_never_mutates_the_store() {
        let store = DataStore::new();
        let rx = store.revision();
        let before = *rx.borrow();

        let _ = project(
            &envelope(
                ObjectType::Status,
                EventType::Update,
                "10.0.0.5",
                r#"{"ipaddress":"10.0.0.5","is_running":true}"#,
            ),
            &store,
        );

        assert_eq!(*rx.borrow(), before);
        assert!(store.statuses().is_empty());
    }

    #[test]
    fn check_results_do_not_toast() {
        let store = DataStore::new();
        assert!(
            project(
                &envelope(
                    ObjectType::ConditionCheckResult,
                    EventType::Update,
                    "10.0.0.5_d1",
                    "{}",
                ),
                &store,
            )
            .is_none()
        );
    }
}
