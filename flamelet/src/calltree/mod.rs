use indextree::{Arena, NodeId};
use serde::{Deserialize, Serialize};

use crate::frame::{FrameName, FrameNode};
use crate::traits::Mergeable;

pub mod builder;
pub mod classify;
pub mod diff;

pub use builder::FrameTreeBuilder;
pub use diff::{diff, DiffMark, DiffNode, DiffTree};

pub const ROOT_LABEL: &str = "-";

/// Aggregated call tree, one node per distinct frame path. The root is a
/// synthetic node whose totals equal the sum of all accepted sample
/// weights once the builder has finalized it.
#[derive(Serialize, Deserialize, Debug)]
pub struct FrameTree {
    pub arena: Arena<FrameNode>,
    pub root: NodeId,
}

impl Default for FrameTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTree {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(FrameNode::new(FrameName::synthetic(ROOT_LABEL)));
        Self { arena, root }
    }

    pub fn node(&self, id: NodeId) -> &FrameNode {
        self.arena[id].get()
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut FrameNode {
        self.arena[id].get_mut()
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Find a child by label.
    pub fn child_by_name(&self, parent: NodeId, method: &str) -> Option<NodeId> {
        parent
            .children(&self.arena)
            .find(|id| self.arena[*id].get().name.method == method)
    }

    /// Find or insert a child, keeping siblings ordered by label so that
    /// the tree shape is independent of sample order.
    pub(crate) fn child_or_insert(&mut self, parent: NodeId, name: &FrameName) -> NodeId {
        let mut before = None;
        for id in parent.children(&self.arena) {
            let existing = &self.arena[id].get().name;
            if existing.method == name.method {
                return id;
            }
            if before.is_none() && existing.method > name.method {
                before = Some(id);
            }
        }

        let node = self.arena.new_node(FrameNode::new(name.clone()));
        match before {
            Some(sibling) => sibling.insert_before(node, &mut self.arena),
            None => parent.append(node, &mut self.arena),
        }
        node
    }

    pub fn total_weight(&self) -> u64 {
        self.node(self.root).total_weight
    }

    pub fn node_count(&self) -> usize {
        self.arena.count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children(&self.arena).next().is_none()
    }
}

impl Mergeable for FrameTree {
    /// Label-wise merge; counters add, subtrees missing on this side are
    /// adopted whole. Associative and commutative, so partial trees built
    /// from disjoint sample batches combine in any order.
    fn merge(&mut self, other: &FrameTree) -> &Self {
        self.node_mut(self.root).absorb(other.node(other.root));

        let mut stack = vec![(self.root, other.root)];
        while let Some((mine, theirs)) = stack.pop() {
            for oc in theirs.children(&other.arena) {
                let onode = other.arena[oc].get();
                let mc = self.child_or_insert(mine, &onode.name);
                self.node_mut(mc).absorb(onode);
                stack.push((mc, oc));
            }
        }

        self
    }
}

pub mod serialize {
    //! Nested-JSON view of a tree, for callers that want the raw
    //! hierarchy rather than rendered layers.

    use indextree::{Arena, NodeId};
    use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

    pub struct Node<'a, T: Serialize> {
        id: NodeId,
        arena: &'a Arena<T>,
    }

    impl<'a, T: Serialize> Node<'a, T> {
        pub fn new(id: NodeId, arena: &'a Arena<T>) -> Self {
            Node { id, arena }
        }
    }

    impl<T: Serialize> Serialize for Node<'_, T> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(2))?;
            map.serialize_entry("frame", self.arena[self.id].get())?;
            map.serialize_entry(
                "children",
                &Children {
                    id: self.id,
                    arena: self.arena,
                },
            )?;
            map.end()
        }
    }

    struct Children<'a, T: Serialize> {
        id: NodeId,
        arena: &'a Arena<T>,
    }

    impl<T: Serialize> Serialize for Children<'_, T> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(None)?;
            for child in self.id.children(self.arena) {
                seq.serialize_element(&Node::new(child, self.arena))?;
            }
            seq.end()
        }
    }
}
