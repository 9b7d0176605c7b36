//! The per-read table of created nodes.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use sb_core::native::{NativeResult, NodeId};
use sb_core::usd::ScenePath;

/// Maps `(prim path, key)` to the node created for it.
///
/// The key disambiguates several nodes made from one prim: `""` for the primary node,
/// `"i3"` for instance 3, `"texture"` for an expanded sub-node. Shared by every worker of a
/// read; insert-if-absent and node creation happen under one lock.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    entries: Mutex<BTreeMap<(ScenePath, String), NodeId>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the node registered for `(path, key)`, calling `create` to make it if there is
    /// none. The flag is true when the node was created by this call.
    pub fn get_or_create(
        &self,
        path: &ScenePath,
        key: &str,
        create: impl FnOnce() -> NativeResult<NodeId>,
    ) -> NativeResult<(NodeId, bool)> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry_key = (path.clone(), key.to_string());
        if let Some(id) = entries.get(&entry_key) {
            return Ok((*id, false));
        }
        let id = create()?;
        entries.insert(entry_key, id);
        Ok((id, true))
    }

    pub fn get(&self, path: &ScenePath, key: &str) -> Option<NodeId> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(path.clone(), key.to_string()))
            .copied()
    }

    /// The primary node of a prim.
    pub fn primary(&self, path: &ScenePath) -> Option<NodeId> {
        self.get(path, "")
    }

    /// The node registered at the smallest path at or below `prefix`.
    pub fn first_under(&self, prefix: &ScenePath) -> Option<NodeId> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .range((prefix.clone(), String::new())..)
            .find(|((path, _), _)| path.has_prefix(prefix))
            .map(|(_, id)| *id)
    }

    /// Every node at or below `prefix`.
    pub fn under(&self, prefix: &ScenePath) -> Vec<NodeId> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|((path, _), _)| path.has_prefix(prefix))
            .map(|(_, id)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::native::NativeError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn path(s: &str) -> ScenePath {
        ScenePath::new(s).unwrap()
    }

    #[test]
    fn test_get_or_create_once() {
        let registry = NodeRegistry::new();
        let (a, created) = registry
            .get_or_create(&path("/A"), "", || Ok(NodeId(4)))
            .unwrap();
        assert!(created);
        let (b, created) = registry
            .get_or_create(&path("/A"), "", || Ok(NodeId(9)))
            .unwrap();
        assert!(!created);
        assert_eq!(a, b);
        assert_eq!(registry.primary(&path("/A")), Some(NodeId(4)));
    }

    #[test]
    fn test_failed_creation_not_registered() {
        let registry = NodeRegistry::new();
        let result = registry.get_or_create(&path("/A"), "", || {
            Err(NativeError::UnknownNodeType("nope".into()))
        });
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_insert_creates_once() {
        let registry = NodeRegistry::new();
        let calls = AtomicU32::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    registry
                        .get_or_create(&path("/Shared"), "", || {
                            Ok(NodeId(calls.fetch_add(1, Ordering::SeqCst)))
                        })
                        .unwrap();
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_prefix_queries() {
        let registry = NodeRegistry::new();
        for (p, key, id) in [
            ("/Proto/B", "", 2),
            ("/Proto/A/Mesh", "", 1),
            ("/Protos", "", 3),
            ("/Proto/A/Mesh", "i0", 4),
        ] {
            registry.get_or_create(&path(p), key, || Ok(NodeId(id))).unwrap();
        }
        assert_eq!(registry.first_under(&path("/Proto")), Some(NodeId(1)));
        let mut under = registry.under(&path("/Proto"));
        under.sort();
        assert_eq!(under, vec![NodeId(1), NodeId(2), NodeId(4)]);
        assert_eq!(registry.first_under(&path("/Missing")), None);
    }
}
