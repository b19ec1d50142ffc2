//! Arena storage for object graphs that may contain cycles.
//!
//! Nodes refer to each other by [`NodeId`] instead of by pointer, so a graph
//! can be cloned, serialized and compared without chasing shared ownership.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A value stored in an [`ObjectGraph`] that may point at other nodes.
pub trait Node: Clone {
    /// Calls `f` with every node this one refers to.
    fn visit_edges(&self, f: &mut dyn FnMut(NodeId));

    /// Calls `f` with a mutable handle to every reference so it can be
    /// rewritten.
    fn visit_edges_mut(&mut self, f: &mut dyn FnMut(&mut NodeId));
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectGraph<T> {
    nodes: Vec<T>,
}

impl<T> Default for ObjectGraph<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<T: Node> ObjectGraph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: T) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Copies the subgraph reachable from `root` into a new arena, returning
    /// it together with the id of the copied root.
    ///
    /// # Panics
    ///
    /// Panics if `root` or any reachable edge points outside the arena.
    pub fn clone_reachable(&self, root: NodeId) -> (ObjectGraph<T>, NodeId) {
        let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([root]);
        remap.insert(root, NodeId(0));
        order.push(root);

        while let Some(id) = queue.pop_front() {
            self.node(id).visit_edges(&mut |edge| {
                if !remap.contains_key(&edge) {
                    remap.insert(edge, NodeId(order.len() as u32));
                    order.push(edge);
                    queue.push_back(edge);
                }
            });
        }

        let nodes = order
            .iter()
            .map(|&id| {
                let mut node = self.node(id).clone();
                node.visit_edges_mut(&mut |edge| *edge = remap[&*edge]);
                node
            })
            .collect();
        (ObjectGraph { nodes }, NodeId(0))
    }

    fn node(&self, id: NodeId) -> &T {
        match self.nodes.get(id.index()) {
            Some(node) => node,
            None => panic!("node {} is not in the graph", id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Obj {
        label: String,
        refs: Vec<NodeId>,
    }

    impl Node for Obj {
        fn visit_edges(&self, f: &mut dyn FnMut(NodeId)) {
            self.refs.iter().copied().for_each(f)
        }

        fn visit_edges_mut(&mut self, f: &mut dyn FnMut(&mut NodeId)) {
            self.refs.iter_mut().for_each(f)
        }
    }

    fn obj(label: &str, refs: &[u32]) -> Obj {
        Obj {
            label: label.to_owned(),
            refs: refs.iter().map(|&i| NodeId(i)).collect(),
        }
    }

    #[test]
    fn test_clone_reachable_handles_cycles() {
        let mut g = ObjectGraph::new();
        g.insert(obj("unreachable", &[1]));
        g.insert(obj("a", &[2]));
        g.insert(obj("b", &[1, 2]));

        let (copy, root) = g.clone_reachable(NodeId(1));
        assert_eq!(copy.len(), 2);
        assert_eq!(copy.get(root), Some(&obj("a", &[1])));
        assert_eq!(copy.get(NodeId(1)), Some(&obj("b", &[0, 1])));
    }

    #[test]
    fn test_graph_json_round_trip() {
        let mut g = ObjectGraph::new();
        let a = g.insert(obj("a", &[1]));
        g.insert(obj("b", &[0]));
        let json = serde_json::to_string(&g).unwrap();
        let back: ObjectGraph<Obj> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
        assert_eq!(back.get(a).map(|o| o.refs.clone()), Some(vec![NodeId(1)]));
    }

    #[test]
    #[should_panic]
    fn test_dangling_edge_panics() {
        let mut g = ObjectGraph::new();
        g.insert(obj("a", &[7]));
        g.clone_reachable(NodeId(0));
    }
}
