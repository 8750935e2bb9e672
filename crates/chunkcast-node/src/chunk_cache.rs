use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chunkcast_common::protocol::ChunkRef;
use tokio::sync::mpsc;

/// A change in the cache's holdings, consumed by the status reporter so the
/// master's directory tracks what this node can actually serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Added(ChunkRef),
    Evicted(ChunkRef),
}

/// Bounded local store of chunk data with LRU eviction.
///
/// Keyed by (filename, chunk). `get` refreshes recency; inserting into a
/// full cache evicts the least-recently-used entry. Every add and eviction
/// is published on the event channel.
pub struct ChunkCache {
    capacity: usize,
    inner: Mutex<CacheState>,
    events: mpsc::UnboundedSender<CacheEvent>,
}

struct CacheState {
    entries: HashMap<ChunkRef, String>,
    // Recency order, least recently used at the front.
    order: VecDeque<ChunkRef>,
}

impl ChunkCache {
    /// Creates a cache holding at most `capacity` chunks, plus the receiver
    /// for its add/evict events.
    pub fn new(capacity: usize) -> (Self, mpsc::UnboundedReceiver<CacheEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cache = Self {
            capacity,
            inner: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            events: tx,
        };
        (cache, rx)
    }

    /// Fetches a chunk, refreshing its recency.
    pub fn get(&self, filename: &str, chunk: u64) -> Option<String> {
        let key = ChunkRef::new(filename, chunk);
        let mut state = self.inner.lock().unwrap();
        if let Some(data) = state.entries.get(&key).cloned() {
            touch(&mut state.order, &key);
            Some(data)
        } else {
            None
        }
    }

    /// Stores a chunk, evicting the least-recently-used entry if full.
    pub fn put(&self, filename: &str, chunk: u64, data: String) {
        let key = ChunkRef::new(filename, chunk);
        let mut state = self.inner.lock().unwrap();

        if state.entries.insert(key.clone(), data).is_some() {
            // Overwrite of an existing chunk; holdings are unchanged.
            touch(&mut state.order, &key);
            return;
        }

        state.order.push_back(key.clone());
        if state.entries.len() > self.capacity {
            if let Some(victim) = state.order.pop_front() {
                state.entries.remove(&victim);
                let _ = self.events.send(CacheEvent::Evicted(victim));
            }
        }
        let _ = self.events.send(CacheEvent::Added(key));
    }

    /// Every chunk currently held, for registration with a master.
    pub fn all_chunks(&self) -> Vec<ChunkRef> {
        let state = self.inner.lock().unwrap();
        state.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().entries.is_empty()
    }
}

fn touch(order: &mut VecDeque<ChunkRef>, key: &ChunkRef) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        order.remove(pos);
    }
    order.push_back(key.clone());
}
