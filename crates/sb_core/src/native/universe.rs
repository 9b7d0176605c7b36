//! The native universe: owner of every node.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::mask::NodeMask;
use super::node::{NativeError, NativeResult, Node, NodeId};
use super::schema::node_entry;

#[derive(Default)]
struct Nodes {
    list: Vec<Arc<Mutex<Node>>>,
    /// Names are scoped by the owning procedural.
    by_name: HashMap<(Option<NodeId>, String), NodeId>,
}

/// A thread-safe container of native nodes.
///
/// Node creation is one serialized critical section; parameter edits lock only the node
/// being edited, so workers filling in different nodes do not contend.
pub struct Universe {
    nodes: RwLock<Nodes>,
    options: NodeId,
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl Universe {
    /// A new universe holding its `options` node.
    pub fn new() -> Self {
        let options = NodeId(0);
        let mut nodes = Nodes::default();
        if let Some(entry) = node_entry("options") {
            nodes.list.push(Arc::new(Mutex::new(Node::new(
                options,
                "options".to_string(),
                entry,
                None,
            ))));
            nodes.by_name.insert((None, "options".to_string()), options);
        }
        Self {
            nodes: RwLock::new(nodes),
            options,
        }
    }

    /// Create a node. Unknown types are rejected, as are non-empty names already used by
    /// another node with the same parent.
    pub fn create_node(
        &self,
        node_type: &str,
        name: &str,
        parent: Option<NodeId>,
    ) -> NativeResult<NodeId> {
        let entry =
            node_entry(node_type).ok_or_else(|| NativeError::UnknownNodeType(node_type.to_string()))?;

        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        let key = (parent, name.to_string());
        if !name.is_empty() && nodes.by_name.contains_key(&key) {
            return Err(NativeError::DuplicateName(name.to_string()));
        }
        let id = NodeId(nodes.list.len() as u32);
        nodes
            .list
            .push(Arc::new(Mutex::new(Node::new(id, name.to_string(), entry, parent))));
        if !name.is_empty() {
            nodes.by_name.insert(key, id);
        }
        Ok(id)
    }

    fn handle(&self, id: NodeId) -> Option<Arc<Mutex<Node>>> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .list
            .get(id.0 as usize)
            .cloned()
    }

    /// Run `f` with shared access to a node.
    pub fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&Node) -> R) -> NativeResult<R> {
        let handle = self.handle(id).ok_or(NativeError::NoSuchNode(id))?;
        let node = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&node))
    }

    /// Run `f` with exclusive access to a node.
    pub fn with_node_mut<R>(&self, id: NodeId, f: impl FnOnce(&mut Node) -> R) -> NativeResult<R> {
        let handle = self.handle(id).ok_or(NativeError::NoSuchNode(id))?;
        let mut node = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut node))
    }

    /// A snapshot copy of a node.
    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.with_node(id, Node::clone).ok()
    }

    /// Find a top-level node by name.
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.lookup_in(None, name)
    }

    /// Find a node by name among the children of `parent`.
    pub fn lookup_in(&self, parent: Option<NodeId>, name: &str) -> Option<NodeId> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_name
            .get(&(parent, name.to_string()))
            .copied()
    }

    /// Ids of every node whose category is in `mask`, in creation order.
    pub fn nodes(&self, mask: NodeMask) -> Vec<NodeId> {
        let handles: Vec<_> = self
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .list
            .clone();
        handles
            .iter()
            .filter_map(|h| {
                let node = h.lock().unwrap_or_else(PoisonError::into_inner);
                mask.contains(node.category()).then(|| node.id())
            })
            .collect()
    }

    pub fn options(&self) -> NodeId {
        self.options
    }

    /// The render camera: `options.camera` if set, else the first camera created.
    pub fn camera(&self) -> Option<NodeId> {
        self.with_node(self.options, |o| o.get_node("camera"))
            .ok()
            .flatten()
            .or_else(|| self.nodes(NodeMask::CAMERA).first().copied())
    }

    pub fn len(&self) -> usize {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .list
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::param::ParamValue;

    #[test]
    fn test_options_created() {
        let universe = Universe::new();
        assert_eq!(universe.len(), 1);
        assert_eq!(universe.lookup("options"), Some(universe.options()));
        assert_eq!(universe.nodes(NodeMask::OPTIONS), vec![universe.options()]);
    }

    #[test]
    fn test_create_node() {
        let universe = Universe::new();
        let id = universe.create_node("sphere", "/World/Ball", None).unwrap();
        assert_eq!(universe.lookup("/World/Ball"), Some(id));
        assert_eq!(universe.node(id).unwrap().node_type(), "sphere");

        assert!(matches!(
            universe.create_node("sphere", "/World/Ball", None),
            Err(NativeError::DuplicateName(_))
        ));
        assert!(matches!(
            universe.create_node("teapot", "t", None),
            Err(NativeError::UnknownNodeType(_))
        ));
        // Anonymous nodes never collide.
        assert!(universe.create_node("flat", "", None).is_ok());
        assert!(universe.create_node("flat", "", None).is_ok());
    }

    #[test]
    fn test_names_scoped_by_parent() {
        let universe = Universe::new();
        let proc_a = universe.create_node("usd", "proc_a", None).unwrap();
        let proc_b = universe.create_node("usd", "proc_b", None).unwrap();
        let a = universe.create_node("sphere", "/Ball", Some(proc_a)).unwrap();
        let b = universe.create_node("sphere", "/Ball", Some(proc_b)).unwrap();
        assert_ne!(a, b);
        assert_eq!(universe.lookup_in(Some(proc_b), "/Ball"), Some(b));
        assert_eq!(universe.lookup("/Ball"), None);
        assert!(universe.create_node("sphere", "/Ball", Some(proc_a)).is_err());
    }

    #[test]
    fn test_camera_lookup() {
        let universe = Universe::new();
        assert!(universe.camera().is_none());
        let a = universe.create_node("persp_camera", "a", None).unwrap();
        let b = universe.create_node("ortho_camera", "b", None).unwrap();
        assert_eq!(universe.camera(), Some(a));

        universe
            .with_node_mut(universe.options(), |o| o.set("camera", ParamValue::Node(Some(b))))
            .unwrap()
            .unwrap();
        assert_eq!(universe.camera(), Some(b));
    }

    #[test]
    fn test_concurrent_creation() {
        let universe = Universe::new();
        std::thread::scope(|s| {
            for t in 0..4 {
                let universe = &universe;
                s.spawn(move || {
                    for i in 0..25 {
                        universe
                            .create_node("points", &format!("p{}_{}", t, i), None)
                            .unwrap();
                    }
                });
            }
        });
        assert_eq!(universe.nodes(NodeMask::SHAPE).len(), 100);
    }
}
