// homedeck-core: Reactive state layer between homedeck-api and consumers.
//
// One persistent server-push stream fans out to per-entity tables with
// optimistic local mutations, version-conflict suppression, and
// rehydration from a persisted snapshot.

pub mod command;
pub mod config;
pub mod console;
pub mod error;
pub mod model;
pub mod report;
pub mod store;
pub mod stream;
pub mod sync;
pub mod toast;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{ActionConfirmer, AlwaysConfirm, BulkOutcome, Command, CommandResult};
pub use config::ConsoleConfig;
pub use console::{Console, SessionState};
pub use error::CoreError;
pub use report::{Fault, FaultReporter, Subsystem};
pub use store::{DataStore, EntityTable, HydrationOutcome, SnapshotStore, StoreSnapshot};
pub use stream::{EntityStream, PluginFilter, ServerFilter};
pub use toast::Toast;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ConditionCheckResult, Credential, DnsServer, Feature, Notification, NotificationLevel, Param,
    Plugin, PluginAction, Server, Status, User, UserToken,
};
