use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::peer::PeerHandle;

/// Tracks which peers have registered as children of this node.
///
/// All mutation goes through this type's own lock; callers never hold it
/// across a call into another collaborator.
#[derive(Default)]
pub struct ChildRegistry {
    children: Mutex<HashMap<String, Arc<PeerHandle>>>,
}

impl ChildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a child, returning `true` if the peer was new.
    ///
    /// Returning `false` means the node already tracked a child by this
    /// name (a flap); the caller is responsible for purging the peer's
    /// stale directory entries. The fresh handle replaces the old one
    /// either way, since the peer may have come back on a new address.
    pub fn add(&self, peer: Arc<PeerHandle>) -> bool {
        let mut children = self.children.lock().unwrap();
        children.insert(peer.name().to_string(), peer).is_none()
    }

    pub fn has(&self, name: &str) -> bool {
        self.children.lock().unwrap().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<PeerHandle>> {
        self.children.lock().unwrap().get(name).cloned()
    }

    /// Removes a child, typically on a death notification.
    pub fn remove(&self, name: &str) -> Option<Arc<PeerHandle>> {
        self.children.lock().unwrap().remove(name)
    }

    pub fn len(&self) -> usize {
        self.children.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(name: &str) -> Arc<PeerHandle> {
        Arc::new(PeerHandle::new(name, "127.0.0.1:9001").unwrap())
    }

    #[test]
    fn test_add_new_child() {
        let registry = ChildRegistry::new();
        assert!(registry.add(peer("leaf-1")));
        assert!(registry.has("leaf-1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_existing_child_reports_flap() {
        let registry = ChildRegistry::new();
        assert!(registry.add(peer("leaf-1")));
        assert!(!registry.add(peer("leaf-1")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_readd_replaces_handle() {
        let registry = ChildRegistry::new();
        registry.add(peer("leaf-1"));
        let replacement = Arc::new(PeerHandle::new("leaf-1", "127.0.0.1:9099").unwrap());
        registry.add(replacement);
        assert_eq!(registry.get("leaf-1").unwrap().address(), "127.0.0.1:9099");
    }

    #[test]
    fn test_remove_child() {
        let registry = ChildRegistry::new();
        registry.add(peer("leaf-1"));
        assert!(registry.remove("leaf-1").is_some());
        assert!(!registry.has("leaf-1"));
        assert!(registry.remove("leaf-1").is_none());
    }
}
