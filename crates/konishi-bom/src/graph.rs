//! Deduplicating dependency graph rooted at one asset.
//!
//! Nodes live in an arena keyed by `(name, version)`. The whole graph sits
//! behind one mutex: construction is not a hot loop, and a single lock keeps
//! node creation and type promotion atomic with respect to each other.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::dependency::{DepType, Dependency};

/// Index of a node in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// The synthetic root node.
    pub const ROOT: Self = Self(0);
}

#[derive(Debug)]
struct GraphNode {
    asset: Option<Dependency>,
    dep_type: DepType,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Inner {
    nodes: Vec<GraphNode>,
    index: HashMap<(String, String), NodeId>,
}

/// Thread-safe dependency graph with exactly one synthetic root.
#[derive(Debug)]
pub struct Graph {
    inner: Mutex<Inner>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// An empty graph containing only the root.
    #[must_use]
    pub fn new() -> Self {
        let root = GraphNode {
            asset: None,
            dep_type: DepType::Direct,
            children: Vec::new(),
        };
        Self {
            inner: Mutex::new(Inner {
                nodes: vec![root],
                index: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Existing node for `(name, version)`, or a new empty Transient one.
    pub fn node(&self, name: &str, version: &str) -> NodeId {
        let mut inner = self.lock();
        inner.get_or_create(name, version)
    }

    /// Create the node if needed and set its asset unless already set.
    pub fn new_node(&self, name: &str, version: &str, dep: Dependency) -> NodeId {
        let mut inner = self.lock();
        let id = inner.get_or_create(name, version);
        let node = &mut inner.nodes[id.0];
        if node.asset.is_none() {
            node.asset = Some(dep);
        }
        id
    }

    /// Link `parent -> (name, version)`, promoting root children to Direct.
    pub fn add_child(&self, parent: NodeId, name: &str, version: &str, dep: Dependency) -> NodeId {
        let mut inner = self.lock();
        let id = inner.get_or_create(name, version);
        let node = &mut inner.nodes[id.0];
        if node.asset.is_none() {
            node.asset = Some(dep);
        }
        if parent == NodeId::ROOT {
            node.dep_type = DepType::Direct;
        }
        if let Some(p) = inner.nodes.get_mut(parent.0) {
            if !p.children.contains(&id) {
                p.children.push(id);
            }
        }
        id
    }

    /// Type of a node.
    #[must_use]
    pub fn dep_type(&self, id: NodeId) -> Option<DepType> {
        self.lock().nodes.get(id.0).map(|n| n.dep_type)
    }

    /// Children of a node, in insertion order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.lock()
            .nodes
            .get(id.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Number of nodes including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    /// True when only the root exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    /// Populated non-root nodes in creation order, each stamped with its
    /// node's current type.
    #[must_use]
    pub fn flat_deps(&self) -> Vec<Dependency> {
        let inner = self.lock();
        inner
            .nodes
            .iter()
            .skip(1)
            .filter_map(|node| {
                node.asset.as_ref().map(|dep| Dependency {
                    dep_type: node.dep_type,
                    ..dep.clone()
                })
            })
            .collect()
    }
}

impl Inner {
    fn get_or_create(&mut self, name: &str, version: &str) -> NodeId {
        let key = (name.to_owned(), version.to_owned());
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(GraphNode {
            asset: None,
            dep_type: DepType::Transient,
            children: Vec::new(),
        });
        self.index.insert(key, id);
        id
    }
}
