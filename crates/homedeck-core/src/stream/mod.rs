// ── Reactive entity streams ──
//
// Subscription types for consuming table changes from the DataStore.
// Delivery is single-threaded and ordered per subscriber; a receiver
// only ever observes whole table snapshots, never partial mutations.

mod filter;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use indexmap::IndexMap;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub use filter::{PluginFilter, ServerFilter};

/// A subscription to one entity table.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed`](Self::changed) or by converting to a
/// `Stream`.
pub struct EntityStream<T: Clone + Send + Sync + 'static> {
    current: Arc<IndexMap<String, Arc<T>>>,
    receiver: watch::Receiver<Arc<IndexMap<String, Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> EntityStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Arc<IndexMap<String, Arc<T>>>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time.
    pub fn current(&self) -> &Arc<IndexMap<String, Arc<T>>> {
        &self.current
    }

    /// The latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Arc<IndexMap<String, Arc<T>>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the sender (DataStore) has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<IndexMap<String, Arc<T>>>> {
        self.receiver.changed().await.ok()?;
        let snapshot = self.receiver.borrow_and_update().clone();
        self.current = snapshot.clone();
        Some(snapshot)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> EntityWatchStream<T> {
        EntityWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields a new table snapshot each time the underlying table is
/// replaced.
pub struct EntityWatchStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<Arc<IndexMap<String, Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> Stream for EntityWatchStream<T> {
    type Item = Arc<IndexMap<String, Arc<T>>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // WatchStream is Unpin when the inner type is Unpin, and
        // Arc<IndexMap<..>> always is.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::model::Server;
    use crate::store::DataStore;

    fn server(ip: &str) -> Server {
        Server {
            ipaddress: ip.into(),
            name: String::new(),
            features: Vec::new(),
            version: 0,
            is_preliminary: false,
        }
    }

    #[tokio::test]
    async fn changed_yields_the_new_snapshot() {
        let store = DataStore::new();
        let mut stream = store.servers().stream();
        assert!(stream.current().is_empty());

        store.servers().add_one(server("10.0.0.5"));

        let snapshot = stream.changed().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("10.0.0.5"));
    }

    #[tokio::test]
    async fn latest_sees_mutations_without_awaiting() {
        let store = DataStore::new();
        let stream = store.servers().stream();

        store.servers().add_one(server("10.0.0.5"));

        assert!(stream.current().is_empty());
        assert_eq!(stream.latest().len(), 1);
    }
}
