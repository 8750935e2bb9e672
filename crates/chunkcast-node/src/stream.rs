//! Ordered-delivery sequencer for child pull sessions.
//!
//! A child streaming a file pulls chunks one at a time and must receive
//! each chunk exactly once, in order, even when its requests race or get
//! retransmitted. Each pull session is a [`Stream`] holding two pieces of
//! state: the next deliverable chunk index (`position`) and a single
//! pending-registration slot. A request first claims the slot via
//! [`Stream::begin`]; a second request arriving while the slot is occupied
//! is rejected outright, which makes duplicate detection O(1) and
//! side-effect-free. Delivery completes through the returned
//! [`DeliveryGuard`], which advances the position exactly once.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use chunkcast_common::protocol::error::{ChunkcastError, Result};
use tracing::debug;

static STREAM_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One ordered pull session for one piece of content.
#[derive(Debug)]
pub struct Stream {
    filename: String,
    id: String,
    state: Mutex<StreamState>,
}

#[derive(Debug, Default)]
struct StreamState {
    /// Next chunk index eligible for delivery. Monotonically non-decreasing.
    position: u64,
    /// The single in-flight registration, if any.
    pending: Option<u64>,
}

impl Stream {
    fn new(filename: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            id: id.into(),
            state: Mutex::new(StreamState::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn position(&self) -> u64 {
        self.state.lock().unwrap().position
    }

    fn has_pending(&self) -> bool {
        self.state.lock().unwrap().pending.is_some()
    }

    /// Attempts to register `chunk` as this stream's in-flight delivery.
    ///
    /// Fails with `StaleRequest` if the chunk was already delivered, or
    /// with `DuplicateInFlight` if any registration is currently pending —
    /// only one request per stream may be in flight, which is what rejects
    /// redundant concurrent retries without re-serving anything.
    ///
    /// On success the caller owns the delivery: read the chunk, reply, and
    /// call [`DeliveryGuard::complete`] to advance the stream. Dropping the
    /// guard without completing releases the slot with the position
    /// untouched, so a failed delivery stays retryable.
    pub fn begin(self: &Arc<Self>, chunk: u64) -> Result<DeliveryGuard> {
        let mut state = self.state.lock().unwrap();

        if chunk < state.position {
            return Err(ChunkcastError::StaleRequest {
                chunk,
                position: state.position,
            });
        }
        if let Some(pending) = state.pending {
            return Err(ChunkcastError::DuplicateInFlight { chunk: pending });
        }

        state.pending = Some(chunk);
        Ok(DeliveryGuard {
            stream: Arc::clone(self),
            chunk,
            done: false,
        })
    }
}

/// Exclusive right to deliver one chunk on one stream.
///
/// Exactly one guard can exist per stream at a time; see [`Stream::begin`].
#[derive(Debug)]
pub struct DeliveryGuard {
    stream: Arc<Stream>,
    chunk: u64,
    done: bool,
}

impl DeliveryGuard {
    pub fn chunk(&self) -> u64 {
        self.chunk
    }

    /// Marks the delivery successful: the position moves past this chunk
    /// and the pending slot clears.
    pub fn complete(mut self) {
        let mut state = self.stream.state.lock().unwrap();
        state.position = self.chunk + 1;
        state.pending = None;
        self.done = true;
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        if !self.done {
            // Delivery never finished; free the slot without advancing so
            // the child can retry this index.
            let mut state = self.stream.state.lock().unwrap();
            state.pending = None;
        }
    }
}

/// Process-wide table of pull sessions, keyed by (filename, stream id).
///
/// Streams are created lazily on first request and evicted LRU once the
/// table exceeds its capacity. Only streams with no in-flight delivery are
/// evictable; an evicted session that comes back starts over at position 0.
pub struct StreamManager {
    capacity: usize,
    inner: Mutex<ManagerState>,
}

#[derive(Default)]
struct ManagerState {
    streams: HashMap<(String, String), Arc<Stream>>,
    // Recency order, least recently used at the front.
    order: VecDeque<(String, String)>,
}

impl StreamManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(ManagerState::default()),
        }
    }

    /// Looks up the session for `(filename, stream_id)`, creating it if
    /// absent. A caller with no stream id yet gets a fresh session under a
    /// newly generated id, which it must echo back on subsequent pulls.
    pub fn resolve(&self, filename: &str, stream_id: Option<&str>) -> Arc<Stream> {
        let id = match stream_id {
            Some(id) => id.to_string(),
            None => generate_stream_id(),
        };
        let key = (filename.to_string(), id.clone());

        let mut state = self.inner.lock().unwrap();
        if let Some(stream) = state.streams.get(&key).cloned() {
            touch(&mut state.order, &key);
            return stream;
        }

        let stream = Arc::new(Stream::new(filename, id));
        state.streams.insert(key.clone(), Arc::clone(&stream));
        state.order.push_back(key);

        if state.streams.len() > self.capacity {
            evict_one(&mut state);
        }

        stream
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().streams.is_empty()
    }
}

/// Evict the least-recently-used stream that has no pending delivery.
fn evict_one(state: &mut ManagerState) {
    let pos = state.order.iter().position(|key| {
        state
            .streams
            .get(key)
            .map(|s| !s.has_pending())
            .unwrap_or(true)
    });

    if let Some(key) = pos.and_then(|p| state.order.remove(p)) {
        debug!("Evicting idle stream {} for {}", key.1, key.0);
        state.streams.remove(&key);
    }
}

fn touch(order: &mut VecDeque<(String, String)>, key: &(String, String)) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        order.remove(pos);
    }
    order.push_back(key.clone());
}

fn generate_stream_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let counter = STREAM_ID_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("s-{:x}-{}", timestamp, counter)
}
