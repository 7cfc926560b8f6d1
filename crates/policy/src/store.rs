//! Single-writer / many-reader holder of the active policy snapshot.
//!
//! Readers call [`PolicyStore::current`] and get an `Arc` they can keep for
//! the whole evaluation of a request; a concurrent [`PolicyStore::swap`]
//! never invalidates it. The slot is an [`ArcSwap`], so readers never block
//! and never observe a partially built snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::snapshot::PolicySnapshot;

pub struct PolicyStore {
    current: ArcSwap<PolicySnapshot>,
    generation: AtomicU64,
}

impl PolicyStore {
    /// A store holding the "no policy loaded" sentinel.
    pub fn new() -> Self {
        Self::with_snapshot(PolicySnapshot::unloaded())
    }

    pub fn with_snapshot(snapshot: PolicySnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
            generation: AtomicU64::new(0),
        }
    }

    /// The latest successfully loaded snapshot (or the sentinel).
    pub fn current(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    /// Replace the active snapshot, returning the previous one.
    pub fn swap(&self, next: Arc<PolicySnapshot>) -> Arc<PolicySnapshot> {
        let previous = self.current.swap(next);
        self.generation.fetch_add(1, Ordering::AcqRel);
        previous
    }

    /// Number of swaps performed so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.current();
        f.debug_struct("PolicyStore")
            .field("generation", &self.generation())
            .field("loaded", &snap.is_loaded())
            .field("policies", &snap.policies().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::thread;

    use crate::schema::{Effect, PolicyDocument, PolicyMetadata, PolicyRule, POLICY_KIND};

    /// A snapshot whose every policy id and rule name carry the same tag,
    /// so a torn read would show mixed tags.
    fn tagged_snapshot(tag: &str, policies: usize) -> PolicySnapshot {
        let docs = (0..policies)
            .map(|i| {
                let doc = PolicyDocument {
                    api_version: "v1".to_string(),
                    kind: POLICY_KIND.to_string(),
                    metadata: PolicyMetadata {
                        id: format!("{tag}-{i}"),
                        name: tag.to_string(),
                        description: None,
                        tags: None,
                        enabled: true,
                    },
                    rules: vec![PolicyRule {
                        name: tag.to_string(),
                        effect: Effect::Allow,
                        users: vec!["*".to_string()],
                        actions: vec!["*".to_string()],
                        uris: Vec::new(),
                        readonly: false,
                    }],
                };
                (PathBuf::from(format!("{tag}-{i}.yml")), doc)
            })
            .collect();
        PolicySnapshot::from_documents(docs).unwrap()
    }

    #[test]
    fn starts_with_sentinel() {
        let store = PolicyStore::new();
        assert!(!store.current().is_loaded());
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn swap_replaces_and_returns_previous() {
        let store = PolicyStore::new();
        let previous = store.swap(Arc::new(tagged_snapshot("a", 1)));
        assert!(!previous.is_loaded());
        assert_eq!(store.current().policies()[0].name, "a");
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn held_snapshot_survives_swap() {
        let store = PolicyStore::with_snapshot(tagged_snapshot("old", 2));
        let held = store.current();
        store.swap(Arc::new(tagged_snapshot("new", 3)));

        assert_eq!(held.policies().len(), 2);
        assert!(held.policies().iter().all(|p| p.name == "old"));
        assert_eq!(store.current().policies().len(), 3);
    }

    #[test]
    fn concurrent_reads_see_whole_snapshots() {
        let store = Arc::new(PolicyStore::with_snapshot(tagged_snapshot("pre", 8)));
        let post = Arc::new(tagged_snapshot("post", 16));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let snap = store.current();
                        let tag = snap.policies()[0].name.clone();
                        let expected_len = if tag == "pre" { 8 } else { 16 };
                        assert_eq!(snap.policies().len(), expected_len);
                        assert!(snap.policies().iter().all(|p| p.name == tag));
                        assert!(snap
                            .policies()
                            .iter()
                            .flat_map(|p| p.rules.iter())
                            .all(|r| r.name == tag));
                    }
                })
            })
            .collect();

        store.swap(post);

        for reader in readers {
            reader.join().expect("reader panicked");
        }
        assert_eq!(store.current().policies()[0].name, "post");
    }
}
