use indextree::{Arena, NodeId};
use serde::{Deserialize, Serialize};

use super::FrameTree;
use crate::frame::FrameName;

/// Which side(s) of the comparison a subtree exists on. Absence on one
/// side is data, never an error.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq)]
pub enum DiffMark {
    Shared { baseline: u64, comparison: u64 },
    Added { total: u64, self_weight: u64 },
    Removed { total: u64, self_weight: u64 },
}

impl DiffMark {
    pub fn total(&self) -> u64 {
        match self {
            DiffMark::Shared {
                baseline,
                comparison,
            } => baseline + comparison,
            DiffMark::Added { total, .. } | DiffMark::Removed { total, .. } => *total,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiffNode {
    pub name: FrameName,
    pub mark: DiffMark,
}

/// Two finished trees merged into one annotated tree, immutable after
/// construction.
#[derive(Serialize, Deserialize, Debug)]
pub struct DiffTree {
    pub arena: Arena<DiffNode>,
    pub root: NodeId,
}

impl DiffTree {
    pub fn node(&self, id: NodeId) -> &DiffNode {
        self.arena[id].get()
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// baseline + comparison weight of the whole graph.
    pub fn grand_total(&self) -> u64 {
        self.node(self.root).mark.total()
    }

    pub fn child_by_name(&self, parent: NodeId, method: &str) -> Option<NodeId> {
        parent
            .children(&self.arena)
            .find(|id| self.arena[*id].get().name.method == method)
    }
}

/// Merge two finished trees by label. Labels on both sides recurse as
/// SHARED; one-sided labels wrap the source subtree unchanged.
pub fn diff(baseline: &FrameTree, comparison: &FrameTree) -> DiffTree {
    let mut arena = Arena::new();
    let root = arena.new_node(DiffNode {
        name: baseline.node(baseline.root).name.clone(),
        mark: DiffMark::Shared {
            baseline: baseline.total_weight(),
            comparison: comparison.total_weight(),
        },
    });

    let mut stack = vec![(baseline.root, comparison.root, root)];
    while let Some((b, c, out)) = stack.pop() {
        for bc in baseline.children(b) {
            let bn = baseline.node(bc);
            match comparison.child_by_name(c, &bn.name.method) {
                Some(cc) => {
                    let node = arena.new_node(DiffNode {
                        name: bn.name.clone(),
                        mark: DiffMark::Shared {
                            baseline: bn.total_weight,
                            comparison: comparison.node(cc).total_weight,
                        },
                    });
                    out.append(node, &mut arena);
                    stack.push((bc, cc, node));
                }
                None => one_sided(&mut arena, baseline, bc, out, false),
            }
        }
        for cc in comparison.children(c) {
            let cn = comparison.node(cc);
            if baseline.child_by_name(b, &cn.name.method).is_none() {
                one_sided(&mut arena, comparison, cc, out, true);
            }
        }
    }

    DiffTree { arena, root }
}

fn one_sided(
    arena: &mut Arena<DiffNode>,
    tree: &FrameTree,
    from: NodeId,
    parent: NodeId,
    added: bool,
) {
    let node = tree.node(from);
    let mark = if added {
        DiffMark::Added {
            total: node.total_weight,
            self_weight: node.self_weight,
        }
    } else {
        DiffMark::Removed {
            total: node.total_weight,
            self_weight: node.self_weight,
        }
    };
    let out = arena.new_node(DiffNode {
        name: node.name.clone(),
        mark,
    });
    parent.append(out, arena);

    for child in tree.children(from) {
        one_sided(arena, tree, child, out, added);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calltree::FrameTreeBuilder;
    use crate::config::BuildOptions;
    use crate::frame::FrameKind;
    use crate::sample::{RawFrame, Sample, StackTrace};
    use std::sync::Arc;

    fn tree(paths: &[(&[&str], u64)]) -> FrameTree {
        let mut builder = FrameTreeBuilder::new(BuildOptions::default());
        for (id, (labels, weight)) in paths.iter().enumerate() {
            let frames = labels
                .iter()
                .rev()
                .map(|l| RawFrame::new(*l, 1, 0, FrameKind::JitCompiled))
                .collect();
            let stack = Arc::new(StackTrace::new(id as u64 + 1, frames));
            builder
                .add_sample(&Sample::execution(Some(stack), *weight, 0, None))
                .unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_diff_with_self_is_all_shared() {
        let a = tree(&[(&["a", "b"], 10), (&["a", "c"], 5)]);
        let diffed = diff(&a, &a);

        let mut stack = vec![diffed.root];
        while let Some(id) = stack.pop() {
            match diffed.node(id).mark {
                DiffMark::Shared {
                    baseline,
                    comparison,
                } => assert_eq!(baseline, comparison),
                other => panic!("unexpected one-sided mark: {other:?}"),
            }
            stack.extend(diffed.children(id));
        }
    }

    #[test]
    fn test_one_sided_subtrees() {
        let baseline = tree(&[(&["a", "gone"], 10)]);
        let comparison = tree(&[(&["a", "new", "deeper"], 4)]);
        let diffed = diff(&baseline, &comparison);

        let a = diffed.child_by_name(diffed.root, "a").unwrap();
        assert_eq!(
            diffed.node(a).mark,
            DiffMark::Shared {
                baseline: 10,
                comparison: 4
            }
        );

        let gone = diffed.child_by_name(a, "gone").unwrap();
        assert_eq!(
            diffed.node(gone).mark,
            DiffMark::Removed {
                total: 10,
                self_weight: 10
            }
        );

        let new = diffed.child_by_name(a, "new").unwrap();
        assert_eq!(
            diffed.node(new).mark,
            DiffMark::Added {
                total: 4,
                self_weight: 0
            }
        );
        // the whole subtree carries the one-sided mark
        let deeper = diffed.child_by_name(new, "deeper").unwrap();
        assert_eq!(
            diffed.node(deeper).mark,
            DiffMark::Added {
                total: 4,
                self_weight: 4
            }
        );
    }

    #[test]
    fn test_total_invariant() {
        let baseline = tree(&[(&["a", "b"], 10), (&["a", "c"], 5)]);
        let comparison = tree(&[(&["a", "b"], 2)]);
        let diffed = diff(&baseline, &comparison);

        // parent total == self share + sum of child totals, at every level
        let a = diffed.child_by_name(diffed.root, "a").unwrap();
        let children_total: u64 = diffed
            .children(a)
            .map(|id| diffed.node(id).mark.total())
            .sum();
        assert_eq!(diffed.node(a).mark.total(), 17);
        assert_eq!(children_total, 17);
        assert_eq!(diffed.grand_total(), 17);
    }

    #[test]
    fn test_antisymmetry_of_marks() {
        let baseline = tree(&[(&["a", "gone"], 10)]);
        let comparison = tree(&[(&["a", "new"], 4)]);

        let forward = diff(&baseline, &comparison);
        let backward = diff(&comparison, &baseline);

        let fa = forward.child_by_name(forward.root, "a").unwrap();
        let ba = backward.child_by_name(backward.root, "a").unwrap();
        assert_eq!(
            forward.node(fa).mark,
            DiffMark::Shared {
                baseline: 10,
                comparison: 4
            }
        );
        assert_eq!(
            backward.node(ba).mark,
            DiffMark::Shared {
                baseline: 4,
                comparison: 10
            }
        );

        let f_gone = forward.child_by_name(fa, "gone").unwrap();
        let b_gone = backward.child_by_name(ba, "gone").unwrap();
        assert!(matches!(forward.node(f_gone).mark, DiffMark::Removed { .. }));
        assert!(matches!(backward.node(b_gone).mark, DiffMark::Added { .. }));
    }
}
