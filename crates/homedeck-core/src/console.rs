// ── Console abstraction ──
//
// Full lifecycle management for one session against the homedeck
// backend: hydration, authentication, the push event stream, command
// routing, and reactive data access through the DataStore.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use secrecy::SecretString;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use homedeck_api::actions::{ActionRequest, ActionType, ConditionCheck};
use homedeck_api::{BackendClient, EventStreamHandle, TransportConfig};

use crate::command::{
    ActionConfirmer, AlwaysConfirm, BulkOutcome, Command, CommandEnvelope, CommandResult,
};
use crate::config::ConsoleConfig;
use crate::error::CoreError;
use crate::model::{Feature, Server, User};
use crate::report::{FaultReporter, Subsystem};
use crate::store::snapshot::NullSnapshotStore;
use crate::store::{DataStore, FileSnapshotStore, HydrationOutcome, SnapshotStore};
use crate::sync::SyncEngine;

const COMMAND_CHANNEL_SIZE: usize = 64;

// ── SessionState ─────────────────────────────────────────────────

/// Session state observable by consumers.
///
/// Deliberately minimal: the event stream handles its own reconnection
/// transparently, so there is no reconnect/backoff state here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── Console ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ConsoleInner>`. Owns the session state
/// machine: `Disconnected → Connecting → Connected → Disconnected`.
#[derive(Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

struct ConsoleInner {
    config: ConsoleConfig,
    client: Arc<BackendClient>,
    store: Arc<DataStore>,
    storage: Arc<dyn SnapshotStore>,
    reporter: FaultReporter,
    confirmer: Arc<dyn ActionConfirmer>,
    session_state: watch::Sender<SessionState>,
    /// First-run memo: whether any user account exists. Initialized on
    /// first query, reset on logout.
    users_exist: ArcSwapOption<bool>,
    command_tx: Mutex<mpsc::Sender<CommandEnvelope>>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    /// Child token for the current session — cancelled on logout,
    /// replaced on the next login.
    cancel_child: Mutex<CancellationToken>,
    /// Token for the current hydration/persistence cycle.
    persist_cancel: Mutex<CancellationToken>,
    persist_handle: Mutex<Option<JoinHandle<()>>>,
    stream_handle: Mutex<Option<EventStreamHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Console {
    /// Create a console from configuration. Does NOT touch the network --
    /// call [`hydrate`](Self::hydrate) and [`login`](Self::login) to
    /// start a session.
    pub fn new(config: ConsoleConfig) -> Result<Self, CoreError> {
        Self::with_confirmer(config, Arc::new(AlwaysConfirm))
    }

    /// Create a console with a custom confirmation collaborator.
    pub fn with_confirmer(
        config: ConsoleConfig,
        confirmer: Arc<dyn ActionConfirmer>,
    ) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: config.tls.clone(),
            timeout: config.timeout,
        };
        let client = Arc::new(BackendClient::new(config.url.clone(), &transport)?);

        let storage: Arc<dyn SnapshotStore> = match &config.snapshot_path {
            Some(path) => Arc::new(FileSnapshotStore::new(path.clone())),
            None => Arc::new(NullSnapshotStore),
        };

        let (session_state, _) = watch::channel(SessionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();
        let persist_cancel = cancel.child_token();

        Ok(Self {
            inner: Arc::new(ConsoleInner {
                config,
                client,
                store: Arc::new(DataStore::new()),
                storage,
                reporter: FaultReporter::new(),
                confirmer,
                session_state,
                users_exist: ArcSwapOption::empty(),
                command_tx: Mutex::new(command_tx),
                command_rx: Mutex::new(Some(command_rx)),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                persist_cancel: Mutex::new(persist_cancel),
                persist_handle: Mutex::new(None),
                stream_handle: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Access the console configuration.
    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    /// Access the underlying DataStore.
    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    /// Subscribe to session state changes.
    pub fn session_state(&self) -> watch::Receiver<SessionState> {
        self.inner.session_state.subscribe()
    }

    /// Subscribe to reported faults.
    pub fn faults(&self) -> tokio::sync::broadcast::Receiver<crate::report::Fault> {
        self.inner.reporter.subscribe()
    }

    // ── Hydration ────────────────────────────────────────────────

    /// Seed the store from the persisted snapshot and start the
    /// persistence task.
    ///
    /// Runs once at startup, before any live effect mutates the store;
    /// runs again after a logout to begin a fresh persistence cycle.
    /// The hydration seed itself is never written back.
    pub async fn hydrate(&self) -> HydrationOutcome {
        // Stop a previous persistence cycle, if any.
        self.stop_persistence().await;

        let outcome = crate::store::hydrate(&self.inner.store, self.inner.storage.as_ref());
        if outcome == HydrationOutcome::Discarded {
            self.inner
                .reporter
                .report(Subsystem::Persistence, "corrupt snapshot discarded");
        }

        // Session tokens survive reloads through the snapshot.
        if let Some(token) = self.inner.store.current_token() {
            self.inner.client.set_token(token.token.clone());
        }

        let persist_cancel = self.inner.cancel.child_token();
        *self.inner.persist_cancel.lock().await = persist_cancel.clone();
        *self.inner.persist_handle.lock().await =
            Some(tokio::spawn(crate::store::persist_task(
                Arc::clone(&self.inner.store),
                Arc::clone(&self.inner.storage),
                self.inner.reporter.clone(),
                persist_cancel,
            )));

        outcome
    }

    async fn stop_persistence(&self) {
        self.inner.persist_cancel.lock().await.cancel();
        if let Some(handle) = self.inner.persist_handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    // ── First-run detection ──────────────────────────────────────

    /// Whether any user account exists. Memoized process-wide;
    /// reset on logout.
    pub async fn users_exist(&self) -> Result<bool, CoreError> {
        if let Some(cached) = self.inner.users_exist.load_full() {
            return Ok(*cached);
        }
        let exists = self.inner.client.users_exist().await?;
        self.inner.users_exist.store(Some(Arc::new(exists)));
        Ok(exists)
    }

    /// Create the very first user account.
    pub async fn create_initial_user(
        &self,
        user: &User,
        password: &SecretString,
    ) -> Result<(), CoreError> {
        self.inner.client.create_initial_user(user, password).await?;
        self.inner.users_exist.store(Some(Arc::new(true)));
        Ok(())
    }

    // ── Session lifecycle ────────────────────────────────────────

    /// Authenticate and start the session: command processing, the
    /// push event stream, and an initial load of all entity tables.
    pub async fn login(
        &self,
        user_id: &str,
        password: &SecretString,
    ) -> Result<(), CoreError> {
        let _ = self.inner.session_state.send(SessionState::Connecting);

        let token = match self.inner.client.authenticate(user_id, password).await {
            Ok(token) => token,
            Err(e) => {
                let _ = self.inner.session_state.send(SessionState::Disconnected);
                return Err(e.into());
            }
        };

        self.inner.client.set_token(token.token.clone());
        self.inner.store.user_tokens().upsert_one(token);

        self.start_session().await;
        info!(user_id, "logged in");
        Ok(())
    }

    /// Resume a session restored by [`hydrate`](Self::hydrate).
    ///
    /// Returns `false` when the snapshot held no token; the caller then
    /// goes through [`login`](Self::login) instead.
    pub async fn resume_session(&self) -> bool {
        let Some(token) = self.inner.store.current_token() else {
            return false;
        };
        let _ = self.inner.session_state.send(SessionState::Connecting);
        self.inner.client.set_token(token.token.clone());
        self.start_session().await;
        info!(user_id = %token.user_id, "session resumed");
        true
    }

    /// Spawn the session task set: command processor, push event
    /// stream, and the initial load of all entity tables.
    async fn start_session(&self) {
        // Fresh child token for this session.
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let mut handles = self.inner.task_handles.lock().await;

        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            let console = self.clone();
            handles.push(tokio::spawn(command_processor_task(console, rx)));
        }

        // Push event stream: active if and only if a session exists.
        if self.inner.config.events_enabled {
            let handle = EventStreamHandle::connect(
                self.inner.client.events_url(),
                self.inner.client.http().clone(),
                self.inner.config.reconnect.clone(),
                child.child_token(),
            );
            let engine = Arc::new(SyncEngine::standard(
                Arc::clone(&self.inner.store),
                Arc::clone(&self.inner.client),
                self.inner.reporter.clone(),
            ));
            handles.push(tokio::spawn(engine.run(handle.subscribe(), child.clone())));
            *self.inner.stream_handle.lock().await = Some(handle);
        }
        drop(handles);

        // Initial data load. Individual failures are reported, not fatal:
        // the stream will converge the store anyway.
        if let Err(e) = route_command(self, Command::LoadAll).await {
            self.inner
                .reporter
                .report(Subsystem::Command, format!("initial load failed: {e}"));
        }

        let _ = self.inner.session_state.send(SessionState::Connected);
    }

    /// End the session.
    ///
    /// Cancels background tasks (any event resolution in flight is
    /// dropped before it can touch the store), clears the persisted
    /// snapshot, resets the live store to its empty initial shape, and
    /// destroys the session token. Persistence resumes only once a new
    /// [`hydrate`](Self::hydrate) cycle completes.
    pub async fn logout(&self) {
        // Cancel the child token (not the parent — allows re-login).
        self.inner.cancel_child.lock().await.cancel();

        if let Some(handle) = self.inner.stream_handle.lock().await.take() {
            handle.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        // Stop persistence before touching the store so the reset is
        // not written back as a fresh snapshot.
        self.stop_persistence().await;
        if let Err(e) = self.inner.storage.clear() {
            warn!(error = %e, "failed to clear persisted snapshot");
        }

        self.inner.client.clear_token();
        self.inner.store.reset();
        self.inner.users_exist.store(None);

        // Recreate the command channel so a re-login can spawn a fresh
        // processor. The previous receiver was consumed by the task.
        {
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
            *self.inner.command_tx.lock().await = tx;
            *self.inner.command_rx.lock().await = Some(rx);
        }

        let _ = self.inner.session_state.send(SessionState::Disconnected);
        debug!("logged out");
    }

    /// Tear down client-side session state after the backend rejected
    /// the token. Unlike [`logout`](Self::logout) this runs from inside
    /// a session task, so it cannot join the task set; cancellation
    /// winds the tasks down asynchronously.
    async fn handle_session_loss(&self) {
        self.inner.cancel_child.lock().await.cancel();
        if let Some(handle) = self.inner.stream_handle.lock().await.take() {
            handle.shutdown();
        }
        self.inner.client.clear_token();
        self.inner.store.user_tokens().remove_all();
        let _ = self.inner.session_state.send(SessionState::Disconnected);
        self.inner
            .reporter
            .report(Subsystem::Auth, "session expired, logged out");
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a command against the backend.
    ///
    /// Sends the command through the internal channel to the command
    /// processor task and awaits the result.
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        if *self.inner.session_state.borrow() != SessionState::Connected {
            return Err(CoreError::Disconnected);
        }

        let (tx, rx) = oneshot::channel();
        let command_tx = self.inner.command_tx.lock().await.clone();

        command_tx
            .send(CommandEnvelope {
                command,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::Disconnected)?;

        rx.await.map_err(|_| CoreError::Disconnected)?
    }

    // ── Typed intent helpers ─────────────────────────────────────

    /// Save (create or replace) a server record.
    pub async fn save_server(&self, server: Server) -> Result<CommandResult, CoreError> {
        self.execute(Command::SaveServer(server)).await
    }

    /// Delete a server record.
    pub async fn delete_server(&self, ipaddress: &str) -> Result<CommandResult, CoreError> {
        self.execute(Command::DeleteServer {
            ipaddress: ipaddress.to_owned(),
        })
        .await
    }

    /// Attach a feature to a server.
    pub async fn add_feature(
        &self,
        ipaddress: &str,
        feature: Feature,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::AddFeature {
            ipaddress: ipaddress.to_owned(),
            feature,
        })
        .await
    }

    /// Scan a CIDR range for hosts; found servers land in the store as
    /// preliminary entries until saved.
    pub async fn discover_servers(
        &self,
        network: &str,
        lookup_names: bool,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::DiscoverServers {
            network: network.to_owned(),
            lookup_names,
        })
        .await
    }

    /// Probe a host for features its plugins recognize.
    pub async fn scan_features(&self, ipaddress: &str) -> Result<CommandResult, CoreError> {
        self.execute(Command::ExecuteAction {
            ipaddress: Some(ipaddress.to_owned()),
            request: ActionRequest::new(ActionType::FeatureScan),
            needs_confirmation: false,
        })
        .await
    }

    /// Fetch monitoring rows for one data series on one host.
    pub async fn query_data(
        &self,
        ipaddress: &str,
        data_id: &str,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::ExecuteAction {
            ipaddress: Some(ipaddress.to_owned()),
            request: ActionRequest::new(ActionType::QueryData).with_param("data_id", data_id),
            needs_confirmation: false,
        })
        .await
    }

    /// Run a plugin action against a host, optionally gated by
    /// confirmation and condition checks.
    pub async fn execute_feature_action(
        &self,
        ipaddress: &str,
        feature_id: &str,
        action_id: &str,
        condition_checks: Vec<ConditionCheck>,
        needs_confirmation: bool,
    ) -> Result<CommandResult, CoreError> {
        let mut request = ActionRequest::new(ActionType::ExecuteFeatureAction)
            .with_param("feature", feature_id)
            .with_param("action", action_id);
        request.condition_checks = condition_checks;

        self.execute(Command::ExecuteAction {
            ipaddress: Some(ipaddress.to_owned()),
            request,
            needs_confirmation,
        })
        .await
    }
}

// ── Command processor ────────────────────────────────────────────

async fn command_processor_task(console: Console, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = console.inner.cancel_child.lock().await.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&console, envelope.command).await;

                if let Err(ref e) = result {
                    if e.is_session_loss() {
                        console.handle_session_loss().await;
                    } else {
                        console
                            .inner
                            .reporter
                            .report(Subsystem::Command, e.to_string());
                    }
                }

                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

/// Route a command to the backend and apply the success mutation.
///
/// The store is only touched after the backend call succeeded; a
/// failure leaves it unchanged.
#[allow(clippy::too_many_lines)]
async fn route_command(console: &Console, command: Command) -> Result<CommandResult, CoreError> {
    let client = &console.inner.client;
    let store = &console.inner.store;

    match command {
        // ── Bulk loads ────────────────────────────────────────────
        Command::LoadAll => {
            let (servers, plugins, disabled, users) = tokio::join!(
                client.list_servers(),
                client.list_plugins(),
                client.disabled_plugin_ids(),
                client.list_users(),
            );

            apply_load(console, "servers", servers, |list| {
                store.servers().replace_all(list);
            })?;
            apply_load(console, "plugins", plugins, |list| {
                store.plugins().replace_all(list);
            })?;
            apply_load(console, "disabled plugins", disabled, |ids| {
                store.disabled_plugins().replace_all(ids);
            })?;
            apply_load(console, "users", users, |list| {
                store.users().replace_all(list);
            })?;

            debug!(
                servers = store.servers().len(),
                plugins = store.plugins().len(),
                "initial load complete"
            );
            Ok(CommandResult::Ok)
        }

        Command::LoadServers => {
            let servers = client.list_servers().await?;
            store.servers().replace_all(servers.clone());
            Ok(CommandResult::Servers(servers))
        }

        Command::LoadPlugins => {
            let (plugins, disabled) =
                tokio::join!(client.list_plugins(), client.disabled_plugin_ids());
            store.plugins().replace_all(plugins?);
            store.disabled_plugins().replace_all(disabled?);
            Ok(CommandResult::Ok)
        }

        Command::LoadUsers => {
            let users = client.list_users().await?;
            store.users().replace_all(users);
            Ok(CommandResult::Ok)
        }

        // ── Server operations ─────────────────────────────────────
        Command::SaveServer(server) => {
            let saved = save_server_item(console, server).await?;
            Ok(CommandResult::Server(saved))
        }

        Command::SaveServers(servers) => {
            let mut outcome = BulkOutcome::default();
            for server in servers {
                let key = server.ipaddress.clone();
                match save_server_item(console, server).await {
                    Ok(_) => outcome.succeeded.push(key),
                    Err(e) => {
                        if e.is_session_loss() {
                            return Err(e);
                        }
                        console.inner.reporter.report(
                            Subsystem::Command,
                            format!("save failed for {key}: {e}"),
                        );
                        outcome.failed.push((key, e.to_string()));
                    }
                }
            }
            Ok(CommandResult::Bulk(outcome))
        }

        Command::DeleteServer { ipaddress } => {
            client.delete_server(&ipaddress).await?;
            store.servers().remove_one(&ipaddress);
            // The liveness record is keyed by the same address and is
            // meaningless without the server.
            store.statuses().remove_one(&ipaddress);
            Ok(CommandResult::Ok)
        }

        Command::RemoveServers { ipaddresses } => {
            let mut outcome = BulkOutcome::default();
            for ipaddress in ipaddresses {
                match client.delete_server(&ipaddress).await {
                    Ok(()) => {
                        store.servers().remove_one(&ipaddress);
                        store.statuses().remove_one(&ipaddress);
                        outcome.succeeded.push(ipaddress);
                    }
                    Err(e) => {
                        let e = CoreError::from(e);
                        if e.is_session_loss() {
                            return Err(e);
                        }
                        console.inner.reporter.report(
                            Subsystem::Command,
                            format!("remove failed for {ipaddress}: {e}"),
                        );
                        outcome.failed.push((ipaddress, e.to_string()));
                    }
                }
            }
            Ok(CommandResult::Bulk(outcome))
        }

        Command::AddFeature { ipaddress, feature } => {
            // Read-modify-write against the FULL record: the cached copy
            // never carries encrypted credentials.
            let mut full = client.get_server(&ipaddress, true).await?;
            match full.features.iter_mut().find(|f| f.id == feature.id) {
                Some(existing) => *existing = feature,
                None => full.features.push(feature),
            }
            let saved = client.update_server(&full).await?;
            store.servers().upsert_one(saved.clone());
            Ok(CommandResult::Server(saved))
        }

        // ── Actions ───────────────────────────────────────────────
        Command::ExecuteAction {
            ipaddress,
            request,
            needs_confirmation,
        } => {
            if needs_confirmation {
                let target = ipaddress.as_deref().unwrap_or("all servers");
                let prompt = format!("Execute {:?} on {target}?", request.action_type);
                if !console.inner.confirmer.confirm(&prompt).await {
                    return Ok(CommandResult::Cancelled);
                }
            }
            let value = client.execute_action(ipaddress.as_deref(), &request).await?;
            Ok(CommandResult::Value(value))
        }

        Command::DiscoverServers {
            network,
            lookup_names,
        } => {
            let mut found = client.auto_discover(&network, lookup_names).await?;
            for server in &mut found {
                server.is_preliminary = true;
            }
            // add, not upsert: already-managed hosts keep their records.
            store.servers().add_many(found.clone());
            Ok(CommandResult::Servers(found))
        }

        // ── Plugins ───────────────────────────────────────────────
        Command::DisablePlugins { ids } => {
            client.disable_plugins(&ids).await?;
            store.disabled_plugins().replace_all(ids);
            Ok(CommandResult::Ok)
        }

        // ── Users ─────────────────────────────────────────────────
        Command::SaveUser { user, password } => {
            let created = client.create_user(&user, &password).await?;
            store.users().upsert_one(created);
            Ok(CommandResult::Ok)
        }

        Command::DeleteUser { user_id } => {
            client.delete_user(&user_id).await?;
            store.users().remove_one(&user_id);
            Ok(CommandResult::Ok)
        }

        Command::ChangePassword {
            user_id,
            old_password,
            new_password,
        } => {
            client
                .change_password(&user_id, &old_password, &new_password)
                .await?;
            Ok(CommandResult::Ok)
        }

        // ── DNS ───────────────────────────────────────────────────
        Command::LoadDnsServers => {
            let dns = client.list_dns_servers().await?;
            Ok(CommandResult::DnsServers(dns))
        }

        Command::SaveDnsServer(dns) => {
            client.create_dns_server(&dns).await?;
            Ok(CommandResult::Ok)
        }

        Command::DeleteDnsServer { ipaddress } => {
            client.delete_dns_server(&ipaddress).await?;
            Ok(CommandResult::Ok)
        }
    }
}

/// Apply one load-all result. Session loss aborts the whole load;
/// anything else is reported and skipped so the other tables still
/// populate.
fn apply_load<T>(
    console: &Console,
    what: &str,
    result: Result<T, homedeck_api::Error>,
    apply: impl FnOnce(T),
) -> Result<(), CoreError> {
    match result {
        Ok(value) => {
            apply(value);
            Ok(())
        }
        Err(homedeck_api::Error::SessionExpired) => Err(CoreError::SessionExpired),
        Err(e) => {
            console
                .inner
                .reporter
                .report(Subsystem::Command, format!("loading {what} failed: {e}"));
            Ok(())
        }
    }
}

/// Save one server with read-modify-write semantics.
///
/// The cached copy is possibly partial (no encrypted credentials), so
/// the write is based on the full backend record; incoming fields win,
/// but credentials missing from the incoming copy are preserved.
async fn save_server_item(console: &Console, server: Server) -> Result<Server, CoreError> {
    let client = &console.inner.client;

    let base = match client.get_server(&server.ipaddress, true).await {
        Ok(full) => Some(full),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    let mut saved = match base {
        Some(mut full) => {
            full.name = server.name;
            full.features = merge_features(full.features, server.features);
            client.update_server(&full).await?
        }
        None => {
            let mut fresh = server;
            fresh.is_preliminary = false;
            client.create_server(&fresh).await?
        }
    };

    saved.is_preliminary = false;
    console.inner.store.servers().upsert_one(saved.clone());
    Ok(saved)
}

/// Incoming features win, but a feature arriving without credentials
/// keeps the credentials the full record already has.
fn merge_features(full: Vec<Feature>, incoming: Vec<Feature>) -> Vec<Feature> {
    incoming
        .into_iter()
        .map(|mut feature| {
            if feature.credentials.is_empty() {
                if let Some(existing) = full.iter().find(|f| f.id == feature.id) {
                    feature.credentials = existing.credentials.clone();
                }
            }
            feature
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Credential;

    fn feature(id: &str, credentials: Vec<Credential>) -> Feature {
        Feature {
            id: id.into(),
            name: id.into(),
            params: Vec::new(),
            credentials,
        }
    }

    #[test]
    fn merge_preserves_credentials_missing_from_partial_copy() {
        let full = vec![feature(
            "docker",
            vec![Credential {
                key: "password".into(),
                value: "sealed".into(),
            }],
        )];
        let incoming = vec![feature("docker", Vec::new()), feature("wol", Vec::new())];

        let merged = merge_features(full, incoming);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].credentials.len(), 1);
        assert_eq!(merged[0].credentials[0].value, "sealed");
        assert!(merged[1].credentials.is_empty());
    }

    #[test]
    fn merge_lets_incoming_credentials_win() {
        let full = vec![feature(
            "docker",
            vec![Credential {
                key: "password".into(),
                value: "old".into(),
            }],
        )];
        let incoming = vec![feature(
            "docker",
            vec![Credential {
                key: "password".into(),
                value: "new".into(),
            }],
        )];

        let merged = merge_features(full, incoming);
        assert_eq!(merged[0].credentials[0].value, "new");
    }

    #[test]
    fn dropped_features_do_not_survive_merge() {
        let full = vec![feature("docker", Vec::new()), feature("wol", Vec::new())];
        let incoming = vec![feature("docker", Vec::new())];

        let merged = merge_features(full, incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "docker");
    }
}
