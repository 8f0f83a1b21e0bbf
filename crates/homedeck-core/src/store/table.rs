// ── Generic entity table ──
//
// One key→entity mapping per entity type, parameterized by a key
// extraction function and an optional sort comparer. The current table
// is only ever REPLACED, never mutated in place: every operation clones
// the map, applies the change, and publishes the new `Arc` through a
// `watch` channel. Readers holding a previous snapshot never observe a
// half-applied mutation.

use std::cmp::Ordering;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::watch;

/// A reactive key→entity table for a single entity type.
pub struct EntityTable<T: Clone + Send + Sync + 'static> {
    key_of: fn(&T) -> String,
    comparer: Option<fn(&T, &T) -> Ordering>,
    entries: watch::Sender<Arc<IndexMap<String, Arc<T>>>>,
    /// Store-wide transition counter, bumped on every accepted mutation.
    revision: Arc<watch::Sender<u64>>,
}

impl<T: Clone + Send + Sync + 'static> EntityTable<T> {
    pub(crate) fn new(key_of: fn(&T) -> String, revision: Arc<watch::Sender<u64>>) -> Self {
        let (entries, _) = watch::channel(Arc::new(IndexMap::new()));
        Self {
            key_of,
            comparer: None,
            entries,
            revision,
        }
    }

    pub(crate) fn with_comparer(mut self, comparer: fn(&T, &T) -> Ordering) -> Self {
        self.comparer = Some(comparer);
        self
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Insert an entity. If the key already exists the existing entry is
    /// left untouched (insert never overwrites -- use
    /// [`upsert_one`](Self::upsert_one) for that). Returns `true` if the
    /// entity was inserted.
    pub fn add_one(&self, entity: T) -> bool {
        let key = (self.key_of)(&entity);
        self.mutate(|map| {
            if map.contains_key(&key) {
                false
            } else {
                map.insert(key.clone(), Arc::new(entity));
                true
            }
        })
    }

    /// Insert every entity whose key is not already present.
    pub fn add_many(&self, entities: Vec<T>) -> usize {
        let mut inserted = 0;
        self.mutate(|map| {
            for entity in entities {
                let key = (self.key_of)(&entity);
                if !map.contains_key(&key) {
                    map.insert(key, Arc::new(entity));
                    inserted += 1;
                }
            }
            inserted > 0
        });
        inserted
    }

    /// Insert or fully replace. An existing entry's fields do NOT
    /// survive -- this is a replacement, not a merge. Returns `true` if
    /// the key was new.
    pub fn upsert_one(&self, entity: T) -> bool {
        let key = (self.key_of)(&entity);
        let mut was_new = false;
        self.mutate(|map| {
            was_new = map.insert(key.clone(), Arc::new(entity)).is_none();
            true
        });
        was_new
    }

    /// Merge changes into an existing entry via `apply`. No-op (and no
    /// transition) if the key is absent. Returns `true` if applied.
    pub fn update_one(&self, key: &str, apply: impl FnOnce(&mut T)) -> bool {
        self.mutate(|map| {
            let Some(existing) = map.get(key) else {
                return false;
            };
            let mut updated = T::clone(existing);
            apply(&mut updated);
            map.insert(key.to_owned(), Arc::new(updated));
            true
        })
    }

    /// Remove by key. Returns the removed entity if it existed.
    pub fn remove_one(&self, key: &str) -> Option<Arc<T>> {
        let mut removed = None;
        self.mutate(|map| {
            removed = map.shift_remove(key);
            removed.is_some()
        });
        removed
    }

    /// Remove every entry.
    pub fn remove_all(&self) {
        self.mutate(|map| {
            if map.is_empty() {
                false
            } else {
                map.clear();
                true
            }
        });
    }

    /// Replace the whole table contents in a single transition
    /// (load-all results, hydration seeds).
    pub fn replace_all(&self, entities: Vec<T>) {
        self.mutate(|map| {
            map.clear();
            for entity in entities {
                map.insert((self.key_of)(&entity), Arc::new(entity));
            }
            true
        });
    }

    // ── Selectors ────────────────────────────────────────────────────

    /// Look up one entity by key.
    pub fn by_key(&self, key: &str) -> Option<Arc<T>> {
        self.entries.borrow().get(key).cloned()
    }

    /// All entities, in table order (sorted when a comparer is declared).
    pub fn all(&self) -> Vec<Arc<T>> {
        self.entries.borrow().values().cloned().collect()
    }

    /// The current table (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<IndexMap<String, Arc<T>>> {
        self.entries.borrow().clone()
    }

    /// Subscribe to table replacements.
    pub fn subscribe(&self) -> watch::Receiver<Arc<IndexMap<String, Arc<T>>>> {
        self.entries.subscribe()
    }

    /// Subscribe as an [`EntityStream`](crate::stream::EntityStream).
    pub fn stream(&self) -> crate::stream::EntityStream<T> {
        crate::stream::EntityStream::new(self.entries.subscribe())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Copy-on-write mutation. `f` returns whether anything changed; an
    /// unchanged table is not republished and does not count as a store
    /// transition.
    fn mutate(&self, f: impl FnOnce(&mut IndexMap<String, Arc<T>>) -> bool) -> bool {
        let mut next = (**self.entries.borrow()).clone();
        let changed = f(&mut next);
        if changed {
            if let Some(comparer) = self.comparer {
                next.sort_by(|_, a, _, b| comparer(a, b));
            }
            self.entries.send_replace(Arc::new(next));
            self.revision.send_modify(|r| *r += 1);
        }
        changed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item {
        id: String,
        label: String,
    }

    fn item(id: &str, label: &str) -> Item {
        Item {
            id: id.into(),
            label: label.into(),
        }
    }

    fn table() -> (EntityTable<Item>, Arc<watch::Sender<u64>>) {
        let (revision, _) = watch::channel(0u64);
        let revision = Arc::new(revision);
        (
            EntityTable::new(|i: &Item| i.id.clone(), Arc::clone(&revision)),
            revision,
        )
    }

    #[test]
    fn add_one_is_idempotent() {
        let (t, _) = table();
        assert!(t.add_one(item("a", "first")));
        let before = t.snapshot();
        assert!(!t.add_one(item("a", "second")));
        let after = t.snapshot();

        // Same Arc: the duplicate insert produced no new table at all.
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(t.by_key("a").unwrap().label, "first");
    }

    #[test]
    fn upsert_replaces_fully() {
        let (t, _) = table();
        t.upsert_one(item("a", "first"));
        t.upsert_one(item("a", "second"));
        assert_eq!(t.len(), 1);
        assert_eq!(t.by_key("a").unwrap().label, "second");
    }

    #[test]
    fn update_after_remove_is_noop() {
        let (t, revision) = table();
        t.add_one(item("a", "first"));
        t.remove_one("a");
        assert!(t.by_key("a").is_none());

        let before = *revision.borrow();
        assert!(!t.update_one("a", |i| i.label = "ghost".into()));
        assert_eq!(*revision.borrow(), before);
        assert!(t.by_key("a").is_none());
    }

    #[test]
    fn update_one_merges_changes() {
        let (t, _) = table();
        t.add_one(item("a", "first"));
        assert!(t.update_one("a", |i| i.label = "patched".into()));
        assert_eq!(t.by_key("a").unwrap().label, "patched");
    }

    #[test]
    fn remove_all_clears() {
        let (t, _) = table();
        t.add_many(vec![item("a", "x"), item("b", "y")]);
        t.remove_all();
        assert!(t.is_empty());
    }

    #[test]
    fn add_many_skips_existing_keys() {
        let (t, _) = table();
        t.add_one(item("a", "kept"));
        let inserted = t.add_many(vec![item("a", "clobbered"), item("b", "new")]);
        assert_eq!(inserted, 1);
        assert_eq!(t.by_key("a").unwrap().label, "kept");
    }

    #[test]
    fn comparer_keeps_table_sorted() {
        let (revision, _) = watch::channel(0u64);
        let t = EntityTable::new(|i: &Item| i.id.clone(), Arc::new(revision))
            .with_comparer(|a, b| a.label.cmp(&b.label));

        t.add_many(vec![item("1", "zebra"), item("2", "apple"), item("3", "mango")]);
        let labels: Vec<String> = t.all().iter().map(|i| i.label.clone()).collect();
        assert_eq!(labels, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn readers_keep_old_snapshot_across_mutations() {
        let (t, _) = table();
        t.add_one(item("a", "first"));
        let held = t.snapshot();
        t.upsert_one(item("a", "second"));

        assert_eq!(held.get("a").unwrap().label, "first");
        assert_eq!(t.by_key("a").unwrap().label, "second");
    }

    #[test]
    fn mutations_bump_the_shared_revision() {
        let (t, revision) = table();
        let start = *revision.borrow();
        t.add_one(item("a", "x"));
        t.upsert_one(item("a", "y"));
        assert_eq!(*revision.borrow(), start + 2);
    }
}
