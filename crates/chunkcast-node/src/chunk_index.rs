use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chunkcast_common::protocol::ChunkRef;

/// Maps each (filename, chunk) to the set of peer names known to hold it.
///
/// A per-peer reverse index keeps `remove_peer` proportional to that peer's
/// holdings rather than a scan of the whole directory, which matters when a
/// flapping child forces a purge of everything it previously reported.
#[derive(Default)]
pub struct ChunkLocationIndex {
    inner: Mutex<IndexState>,
}

#[derive(Default)]
struct IndexState {
    holders: HashMap<ChunkRef, HashSet<String>>,
    by_peer: HashMap<String, HashSet<ChunkRef>>,
}

impl ChunkLocationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `peer` holds `(filename, chunk)`.
    pub fn insert(&self, filename: &str, chunk: u64, peer: &str) {
        let key = ChunkRef::new(filename, chunk);
        let mut state = self.inner.lock().unwrap();
        state
            .holders
            .entry(key.clone())
            .or_default()
            .insert(peer.to_string());
        state.by_peer.entry(peer.to_string()).or_default().insert(key);
    }

    /// Records that `peer` no longer holds `(filename, chunk)`.
    pub fn remove(&self, filename: &str, chunk: u64, peer: &str) {
        let key = ChunkRef::new(filename, chunk);
        let mut state = self.inner.lock().unwrap();
        let emptied = state
            .holders
            .get_mut(&key)
            .map(|set| {
                set.remove(peer);
                set.is_empty()
            })
            .unwrap_or(false);
        if emptied {
            state.holders.remove(&key);
        }

        let emptied = state
            .by_peer
            .get_mut(peer)
            .map(|set| {
                set.remove(&key);
                set.is_empty()
            })
            .unwrap_or(false);
        if emptied {
            state.by_peer.remove(peer);
        }
    }

    /// Drops every entry attributed to `peer`.
    ///
    /// Used when a child dies or flaps; after this call the directory holds
    /// nothing for that peer name.
    pub fn remove_peer(&self, peer: &str) {
        let mut state = self.inner.lock().unwrap();
        if let Some(keys) = state.by_peer.remove(peer) {
            for key in keys {
                let emptied = state
                    .holders
                    .get_mut(&key)
                    .map(|set| {
                        set.remove(peer);
                        set.is_empty()
                    })
                    .unwrap_or(false);
                if emptied {
                    state.holders.remove(&key);
                }
            }
        }
    }

    /// Names of the peers known to hold `(filename, chunk)`.
    pub fn holders(&self, filename: &str, chunk: u64) -> Vec<String> {
        let key = ChunkRef::new(filename, chunk);
        let state = self.inner.lock().unwrap();
        state
            .holders
            .get(&key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let index = ChunkLocationIndex::new();
        index.insert("movie", 0, "leaf-1");
        index.insert("movie", 0, "leaf-2");
        index.insert("movie", 1, "leaf-1");

        let mut holders = index.holders("movie", 0);
        holders.sort();
        assert_eq!(holders, vec!["leaf-1", "leaf-2"]);
        assert_eq!(index.holders("movie", 1), vec!["leaf-1"]);
        assert!(index.holders("movie", 2).is_empty());
    }

    #[test]
    fn test_insert_is_idempotent() {
        let index = ChunkLocationIndex::new();
        index.insert("movie", 0, "leaf-1");
        index.insert("movie", 0, "leaf-1");
        assert_eq!(index.holders("movie", 0).len(), 1);
    }

    #[test]
    fn test_remove() {
        let index = ChunkLocationIndex::new();
        index.insert("movie", 0, "leaf-1");
        index.insert("movie", 0, "leaf-2");
        index.remove("movie", 0, "leaf-1");
        assert_eq!(index.holders("movie", 0), vec!["leaf-2"]);

        // Removing an absent entry is a no-op.
        index.remove("movie", 9, "leaf-1");
    }

    #[test]
    fn test_remove_peer_purges_all_entries() {
        let index = ChunkLocationIndex::new();
        index.insert("movie", 0, "leaf-1");
        index.insert("movie", 1, "leaf-1");
        index.insert("other", 7, "leaf-1");
        index.insert("movie", 0, "leaf-2");

        index.remove_peer("leaf-1");

        assert_eq!(index.holders("movie", 0), vec!["leaf-2"]);
        assert!(index.holders("movie", 1).is_empty());
        assert!(index.holders("other", 7).is_empty());
    }
}
