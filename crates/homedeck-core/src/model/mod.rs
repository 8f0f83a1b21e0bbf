// ── Domain model ──
//
// The wire shapes ARE the domain model here -- the store holds the
// exact payloads the backend sends, so the types live in homedeck-api
// and this module adds what only the client cares about: key
// extraction, version metadata access, and sort ordering.

use std::cmp::Ordering;
use std::net::Ipv4Addr;

pub use homedeck_api::models::{
    ConditionCheckResult, Credential, DnsServer, Feature, Notification, NotificationLevel, Param,
    Plugin, PluginAction, Server, Status, User, UserToken, composite_check_key,
};

// ── Key extraction ──────────────────────────────────────────────────

/// An entity with a unique store key.
pub trait Keyed {
    fn key(&self) -> String;
}

impl Keyed for Server {
    fn key(&self) -> String {
        self.ipaddress.clone()
    }
}

impl Keyed for Plugin {
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Keyed for User {
    fn key(&self) -> String {
        self.user_id.clone()
    }
}

impl Keyed for UserToken {
    fn key(&self) -> String {
        self.user_id.clone()
    }
}

impl Keyed for Status {
    fn key(&self) -> String {
        self.ipaddress.clone()
    }
}

impl Keyed for ConditionCheckResult {
    fn key(&self) -> String {
        self.composite_key()
    }
}

impl Keyed for Notification {
    fn key(&self) -> String {
        self.id.clone()
    }
}

// Disabled plugins are stored as bare id strings.
impl Keyed for String {
    fn key(&self) -> String {
        self.clone()
    }
}

// ── Version metadata ────────────────────────────────────────────────

/// An entity the backend stamps with a monotonically increasing
/// version. A client-held copy is replaced by an inbound update only
/// if the inbound version differs from the local one, or the local
/// copy is a preliminary placeholder awaiting server confirmation.
pub trait Versioned {
    fn version(&self) -> u64;
    fn is_preliminary(&self) -> bool;
}

macro_rules! impl_versioned {
    ($($ty:ty),+ $(,)?) => {
        $(impl Versioned for $ty {
            fn version(&self) -> u64 {
                self.version
            }
            fn is_preliminary(&self) -> bool {
                self.is_preliminary
            }
        })+
    };
}

impl_versioned!(Server, Plugin, User, Status, ConditionCheckResult);

// ── Sort comparers ──────────────────────────────────────────────────

/// Numeric IPv4 ordering: `10.0.0.9` sorts before `10.0.0.10`.
/// Unparseable addresses sort last, by string as a tiebreak.
pub fn compare_servers(a: &Server, b: &Server) -> Ordering {
    ip_sort_key(&a.ipaddress)
        .cmp(&ip_sort_key(&b.ipaddress))
        .then_with(|| a.ipaddress.cmp(&b.ipaddress))
}

/// Plugins are presented alphabetically.
pub fn compare_plugins(a: &Plugin, b: &Plugin) -> Ordering {
    a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))
}

fn ip_sort_key(ip: &str) -> u64 {
    ip.parse::<Ipv4Addr>()
        .map_or(u64::MAX, |addr| u64::from(u32::from(addr)))
}
