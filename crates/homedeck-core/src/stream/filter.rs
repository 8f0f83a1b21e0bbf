// ── Filter predicates for entity streams ──
//
// Used by front ends to narrow snapshots without re-querying the
// backend.

use crate::model::{Plugin, Server};

/// Filter predicate for server collections.
pub enum ServerFilter {
    All,
    /// Client-created placeholders awaiting backend confirmation.
    Preliminary,
    /// Servers carrying a feature of the given plugin id.
    WithFeature(String),
    Custom(Box<dyn Fn(&Server) -> bool + Send + Sync>),
}

impl ServerFilter {
    pub fn matches(&self, server: &Server) -> bool {
        match self {
            Self::All => true,
            Self::Preliminary => server.is_preliminary,
            Self::WithFeature(id) => server.features.iter().any(|f| &f.id == id),
            Self::Custom(f) => f(server),
        }
    }
}

/// Filter predicate for plugin collections.
pub enum PluginFilter {
    All,
    /// Plugins NOT in the given disabled-id set.
    Enabled(Vec<String>),
    Custom(Box<dyn Fn(&Plugin) -> bool + Send + Sync>),
}

impl PluginFilter {
    pub fn matches(&self, plugin: &Plugin) -> bool {
        match self {
            Self::All => true,
            Self::Enabled(disabled) => !disabled.contains(&plugin.id),
            Self::Custom(f) => f(plugin),
        }
    }
}
