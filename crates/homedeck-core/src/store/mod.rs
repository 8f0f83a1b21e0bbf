// ── Central reactive data store ──
//
// One table per synchronized entity type. All mutation flows through
// the tables' declared operations; the store itself only adds typed
// accessors, a store-wide revision counter for the persistence layer,
// and whole-store dump/load for snapshots.

pub(crate) mod snapshot;
mod table;

use std::sync::Arc;

use tokio::sync::watch;

use crate::model::{
    ConditionCheckResult, Keyed, Notification, Plugin, Server, Status, User, UserToken,
    compare_plugins, compare_servers,
};

pub use snapshot::{FileSnapshotStore, HydrationOutcome, SnapshotStore, StoreSnapshot, hydrate};
pub(crate) use snapshot::persist_task;
pub use table::EntityTable;

/// Central reactive store for all synchronized entities.
pub struct DataStore {
    revision: Arc<watch::Sender<u64>>,
    servers: EntityTable<Server>,
    plugins: EntityTable<Plugin>,
    disabled_plugins: EntityTable<String>,
    users: EntityTable<User>,
    user_tokens: EntityTable<UserToken>,
    statuses: EntityTable<Status>,
    checks: EntityTable<ConditionCheckResult>,
    notifications: EntityTable<Notification>,
}

impl DataStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0u64);
        let revision = Arc::new(revision);

        Self {
            servers: EntityTable::new(Keyed::key, Arc::clone(&revision))
                .with_comparer(compare_servers),
            plugins: EntityTable::new(Keyed::key, Arc::clone(&revision))
                .with_comparer(compare_plugins),
            disabled_plugins: EntityTable::new(Keyed::key, Arc::clone(&revision)),
            users: EntityTable::new(Keyed::key, Arc::clone(&revision)),
            user_tokens: EntityTable::new(Keyed::key, Arc::clone(&revision)),
            statuses: EntityTable::new(Keyed::key, Arc::clone(&revision)),
            checks: EntityTable::new(Keyed::key, Arc::clone(&revision)),
            notifications: EntityTable::new(Keyed::key, Arc::clone(&revision)),
            revision,
        }
    }

    // ── Tables ───────────────────────────────────────────────────────

    pub fn servers(&self) -> &EntityTable<Server> {
        &self.servers
    }

    pub fn plugins(&self) -> &EntityTable<Plugin> {
        &self.plugins
    }

    pub fn disabled_plugins(&self) -> &EntityTable<String> {
        &self.disabled_plugins
    }

    pub fn users(&self) -> &EntityTable<User> {
        &self.users
    }

    pub fn user_tokens(&self) -> &EntityTable<UserToken> {
        &self.user_tokens
    }

    pub fn statuses(&self) -> &EntityTable<Status> {
        &self.statuses
    }

    pub fn checks(&self) -> &EntityTable<ConditionCheckResult> {
        &self.checks
    }

    pub fn notifications(&self) -> &EntityTable<Notification> {
        &self.notifications
    }

    // ── Convenience selectors ────────────────────────────────────────

    pub fn server_by_ip(&self, ipaddress: &str) -> Option<Arc<Server>> {
        self.servers.by_key(ipaddress)
    }

    pub fn plugin_by_id(&self, id: &str) -> Option<Arc<Plugin>> {
        self.plugins.by_key(id)
    }

    pub fn status_by_ip(&self, ipaddress: &str) -> Option<Arc<Status>> {
        self.statuses.by_key(ipaddress)
    }

    pub fn check_by_key(&self, composite_key: &str) -> Option<Arc<ConditionCheckResult>> {
        self.checks.by_key(composite_key)
    }

    /// The current session, if any. The token table holds at most one
    /// entry.
    pub fn current_token(&self) -> Option<Arc<UserToken>> {
        self.user_tokens.all().into_iter().next()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Reset every table to its empty initial shape (logout).
    pub fn reset(&self) {
        self.servers.remove_all();
        self.plugins.remove_all();
        self.disabled_plugins.remove_all();
        self.users.remove_all();
        self.user_tokens.remove_all();
        self.statuses.remove_all();
        self.checks.remove_all();
        self.notifications.remove_all();
    }

    /// Subscribe to the store-wide transition counter. Bumped once per
    /// accepted mutation on any table; the persistence layer watches
    /// this (coalescing is inherent -- a `watch` receiver only ever sees
    /// the latest value).
    pub fn revision(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// Clone the whole store into a serializable snapshot.
    pub fn dump(&self) -> StoreSnapshot {
        fn values<T: Clone + Send + Sync + 'static>(table: &EntityTable<T>) -> Vec<T> {
            table.all().iter().map(|e| T::clone(e)).collect()
        }

        StoreSnapshot {
            servers: values(&self.servers),
            plugins: values(&self.plugins),
            disabled_plugins: values(&self.disabled_plugins),
            users: values(&self.users),
            user_tokens: values(&self.user_tokens),
            statuses: values(&self.statuses),
            checks: values(&self.checks),
            notifications: values(&self.notifications),
        }
    }

    /// Seed every table from a snapshot, replacing current contents.
    pub fn load(&self, snapshot: StoreSnapshot) {
        self.servers.replace_all(snapshot.servers);
        self.plugins.replace_all(snapshot.plugins);
        self.disabled_plugins.replace_all(snapshot.disabled_plugins);
        self.users.replace_all(snapshot.users);
        self.user_tokens.replace_all(snapshot.user_tokens);
        self.statuses.replace_all(snapshot.statuses);
        self.checks.replace_all(snapshot.checks);
        self.notifications.replace_all(snapshot.notifications);
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn server(ip: &str, name: &str) -> Server {
        Server {
            ipaddress: ip.into(),
            name: name.into(),
            features: Vec::new(),
            version: 0,
            is_preliminary: false,
        }
    }

    #[test]
    fn insert_then_select_by_ip() {
        let store = DataStore::new();
        store.servers().add_one(server("10.0.0.5", "host1"));

        assert_eq!(store.servers().len(), 1);
        let found = store.server_by_ip("10.0.0.5").unwrap();
        assert_eq!(found.name, "host1");
    }

    #[test]
    fn delete_is_terminal() {
        let store = DataStore::new();
        store.servers().add_one(server("10.0.0.5", "host1"));
        store.servers().remove_one("10.0.0.5");

        assert!(store.server_by_ip("10.0.0.5").is_none());
        assert!(!store.servers().update_one("10.0.0.5", |s| s.name = "ghost".into()));
        assert!(store.server_by_ip("10.0.0.5").is_none());
    }

    #[test]
    fn reset_empties_every_table() {
        let store = DataStore::new();
        store.servers().add_one(server("10.0.0.5", "host1"));
        store.user_tokens().upsert_one(UserToken {
            user_id: "admin".into(),
            token: "t".into(),
            client_key: String::new(),
        });

        store.reset();
        assert!(store.servers().is_empty());
        assert!(store.current_token().is_none());
    }

    #[test]
    fn revision_counts_across_tables() {
        let store = DataStore::new();
        let rx = store.revision();
        let start = *rx.borrow();

        store.servers().add_one(server("10.0.0.5", "a"));
        store.statuses().upsert_one(Status {
            ipaddress: "10.0.0.5".into(),
            is_running: true,
            version: 1,
            is_preliminary: false,
        });

        assert_eq!(*rx.borrow(), start + 2);
    }

    #[test]
    fn servers_come_back_in_numeric_ip_order() {
        let store = DataStore::new();
        store.servers().add_one(server("10.0.0.10", "c"));
        store.servers().add_one(server("10.0.0.2", "a"));
        store.servers().add_one(server("10.0.0.9", "b"));

        let ips: Vec<String> = store
            .servers()
            .all()
            .iter()
            .map(|s| s.ipaddress.clone())
            .collect();
        assert_eq!(ips, vec!["10.0.0.2", "10.0.0.9", "10.0.0.10"]);
    }
}
