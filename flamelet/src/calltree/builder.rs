use fxhash::FxHashMap;
use indextree::NodeId;
use tracing::{debug, warn};

use crate::calltree::classify::Pipeline;
use crate::calltree::FrameTree;
use crate::config::BuildOptions;
use crate::error::TreeError;
use crate::frame::{FrameKind, FrameNode};
use crate::sample::Sample;

/// One entry of a cached stack resolution. `raw_index` mirrors
/// `NewFrame::raw_index`: present only when the kind must be re-derived
/// from the raw frame on every hit.
#[derive(Debug, Clone, Copy)]
struct CachedFrame {
    node: NodeId,
    kind: FrameKind,
    raw_index: Option<usize>,
}

/// Cached resolutions for one stack identity. In thread mode the resolved
/// path starts at a per-thread marker, so one pooled stack seen from two
/// threads resolves to two distinct paths.
struct CacheSlot {
    thread: Option<String>,
    path: Vec<CachedFrame>,
}

/// Single-writer accumulator turning a stream of samples into a
/// `FrameTree`. Stacks already seen (by ingestion id, not content) skip
/// the classification pipeline entirely; only the java-level kinds are
/// re-derived per sample because the compilation tier varies at runtime.
pub struct FrameTreeBuilder {
    tree: FrameTree,
    pipeline: Pipeline,
    cache: FxHashMap<u64, Vec<CacheSlot>>,
    thread_scoped: bool,
    dropped: u64,
}

impl FrameTreeBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            tree: FrameTree::new(),
            pipeline: Pipeline::for_options(&options),
            cache: FxHashMap::default(),
            thread_scoped: options.thread_mode,
            dropped: 0,
        }
    }

    /// Resolve the sample's stack and add its weight along the frame
    /// path. Samples without stack data are dropped with a diagnostic,
    /// never an error.
    pub fn add_sample(&mut self, sample: &Sample) -> Result<(), TreeError> {
        let Some(stack) = &sample.stack else {
            match &sample.thread {
                Some(thread) => warn!(thread = %thread.name, "missing stacktrace"),
                None => warn!("missing stacktrace and thread"),
            }
            self.dropped += 1;
            return Ok(());
        };
        if stack.frames.is_empty() {
            warn!(stack_id = stack.id, "stacktrace without frames");
            self.dropped += 1;
            return Ok(());
        }

        let thread_key = if self.thread_scoped {
            sample.thread.as_ref().map(|t| t.name.as_str())
        } else {
            None
        };

        // Fast path: the stack id was resolved before, reuse the node path.
        if let Some(slots) = self.cache.get(&stack.id) {
            if let Some(slot) = slots.iter().find(|s| s.thread.as_deref() == thread_key) {
                let last = slot.path.len() - 1;
                for (i, entry) in slot.path.iter().enumerate() {
                    let kind = match entry.raw_index {
                        Some(raw) => stack.frames[raw].kind,
                        None => entry.kind,
                    };
                    self.tree
                        .node_mut(entry.node)
                        .increment(kind, sample.weight, i == last);
                }
                return Ok(());
            }
        }

        let frames = self.pipeline.resolve(sample, stack)?;
        let mut path = Vec::with_capacity(frames.len());
        let mut parent = self.tree.root;
        let last = frames.len() - 1;
        for (i, frame) in frames.iter().enumerate() {
            let node = self.tree.child_or_insert(parent, &frame.name);
            self.tree
                .node_mut(node)
                .increment(frame.kind, sample.weight, i == last);
            path.push(CachedFrame {
                node,
                kind: frame.kind,
                raw_index: frame.raw_index,
            });
            parent = node;
        }
        self.cache.entry(stack.id).or_default().push(CacheSlot {
            thread: thread_key.map(str::to_owned),
            path,
        });
        Ok(())
    }

    /// Samples dropped for missing stack data so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Finalize the root aggregates and hand the tree over. Consuming the
    /// builder is what closes the tree to further mutation.
    pub fn build(self) -> FrameTree {
        debug!(
            distinct_stacks = self.cache.len(),
            dropped = self.dropped,
            "finalizing frame tree"
        );

        let mut tree = self.tree;
        let children: Vec<NodeId> = tree.children(tree.root).collect();
        let mut root = FrameNode::new(tree.node(tree.root).name.clone());
        for child in children {
            root.add_totals(tree.node(child));
        }
        *tree.node_mut(tree.root) = root;
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calltree::testutil::snapshot;
    use crate::frame::FrameName;
    use crate::sample::{RawFrame, StackTrace, ThreadInfo};
    use std::sync::Arc;

    fn jit_stack(id: u64, labels: &[&str]) -> Arc<StackTrace> {
        // labels given root-first for readability, stored leaf-first
        let frames = labels
            .iter()
            .rev()
            .map(|l| RawFrame::new(*l, 1, 0, FrameKind::JitCompiled))
            .collect();
        Arc::new(StackTrace::new(id, frames))
    }

    fn build(samples: &[Sample]) -> FrameTree {
        let mut builder = FrameTreeBuilder::new(BuildOptions::default());
        for sample in samples {
            builder.add_sample(sample).unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_concrete_scenario() {
        // [a,b,c] w=10, [a,b,d] w=5, [a,b,c] w=3
        let samples = vec![
            Sample::execution(Some(jit_stack(1, &["a", "b", "c"])), 10, 0, None),
            Sample::execution(Some(jit_stack(2, &["a", "b", "d"])), 5, 0, None),
            Sample::execution(Some(jit_stack(3, &["a", "b", "c"])), 3, 0, None),
        ];
        let tree = build(&samples);

        assert_eq!(
            snapshot(&tree),
            vec![
                (0, "-".to_owned(), 18, 0),
                (1, "a".to_owned(), 18, 0),
                (2, "b".to_owned(), 18, 0),
                (3, "c".to_owned(), 13, 13),
                (3, "d".to_owned(), 5, 5),
            ]
        );
    }

    #[test]
    fn test_order_independent() {
        let mut samples = vec![
            Sample::execution(Some(jit_stack(1, &["a", "b", "c"])), 10, 0, None),
            Sample::execution(Some(jit_stack(2, &["a", "b", "d"])), 5, 0, None),
            Sample::execution(Some(jit_stack(3, &["x"])), 2, 0, None),
        ];
        let forward = build(&samples);
        samples.reverse();
        let backward = build(&samples);

        assert_eq!(snapshot(&forward), snapshot(&backward));
    }

    #[test]
    fn test_root_total_counts_accepted_samples_only() {
        let samples = vec![
            Sample::execution(Some(jit_stack(1, &["a"])), 7, 0, None),
            Sample::execution(None, 100, 0, Some(ThreadInfo::new("t"))),
            Sample::execution(None, 100, 0, None),
        ];
        let mut builder = FrameTreeBuilder::new(BuildOptions::default());
        for sample in &samples {
            builder.add_sample(sample).unwrap();
        }
        assert_eq!(builder.dropped(), 2);
        let tree = builder.build();
        assert_eq!(tree.total_weight(), 7);
    }

    #[test]
    fn test_cache_rederives_java_kind_per_sample() {
        // same stack id, same shape, different compilation tier
        let interpreted = Arc::new(StackTrace::new(
            9,
            vec![RawFrame::new("a", 1, 0, FrameKind::Interpreted)],
        ));
        let compiled = Arc::new(StackTrace::new(
            9,
            vec![RawFrame::new("a", 1, 0, FrameKind::JitCompiled)],
        ));

        let mut builder = FrameTreeBuilder::new(BuildOptions::default());
        builder
            .add_sample(&Sample::execution(Some(interpreted), 1, 0, None))
            .unwrap();
        builder
            .add_sample(&Sample::execution(Some(compiled), 1, 0, None))
            .unwrap();
        let tree = builder.build();

        let a = tree.child_by_name(tree.root, "a").unwrap();
        let node = tree.node(a);
        assert_eq!(node.total_samples, 2);
        assert_eq!(node.samples_of(FrameKind::Interpreted), 1);
        assert_eq!(node.samples_of(FrameKind::JitCompiled), 1);
    }

    #[test]
    fn test_cache_keeps_synthetic_kind() {
        let stack = jit_stack(4, &["a"]);
        let sample = Sample::execution(Some(stack), 1, 0, Some(ThreadInfo::new("t-1")));

        let mut builder = FrameTreeBuilder::new(BuildOptions::default().thread_mode(true));
        builder.add_sample(&sample).unwrap();
        builder.add_sample(&sample).unwrap();
        let tree = builder.build();

        let marker = tree.child_by_name(tree.root, "t-1").unwrap();
        assert_eq!(tree.node(marker).samples_of(FrameKind::ThreadSynthetic), 2);
    }

    #[test]
    fn test_pooled_stack_keeps_threads_apart() {
        // one pooled stack identity sampled from two threads must not
        // collapse into the first thread's subtree
        let stack = jit_stack(7, &["a"]);
        let samples = vec![
            Sample::execution(Some(stack.clone()), 1, 0, Some(ThreadInfo::new("t-1"))),
            Sample::execution(Some(stack.clone()), 1, 0, Some(ThreadInfo::new("t-2"))),
            Sample::execution(Some(stack), 1, 0, Some(ThreadInfo::new("t-1"))),
        ];
        let mut builder = FrameTreeBuilder::new(BuildOptions::default().thread_mode(true));
        for sample in &samples {
            builder.add_sample(sample).unwrap();
        }
        let tree = builder.build();

        assert_eq!(
            snapshot(&tree),
            vec![
                (0, "-".to_owned(), 3, 0),
                (1, "t-1".to_owned(), 2, 0),
                (2, "a".to_owned(), 2, 2),
                (1, "t-2".to_owned(), 1, 0),
                (2, "a".to_owned(), 1, 1),
            ]
        );
    }

    #[test]
    fn test_thread_mode_groups_by_thread() {
        let samples = vec![
            Sample::execution(Some(jit_stack(1, &["a"])), 1, 0, Some(ThreadInfo::new("t-1"))),
            Sample::execution(Some(jit_stack(2, &["a"])), 1, 0, Some(ThreadInfo::new("t-2"))),
        ];
        let mut builder = FrameTreeBuilder::new(BuildOptions::default().thread_mode(true));
        for sample in &samples {
            builder.add_sample(sample).unwrap();
        }
        let tree = builder.build();

        assert_eq!(
            snapshot(&tree),
            vec![
                (0, "-".to_owned(), 2, 0),
                (1, "t-1".to_owned(), 1, 0),
                (2, "a".to_owned(), 1, 1),
                (1, "t-2".to_owned(), 1, 0),
                (2, "a".to_owned(), 1, 1),
            ]
        );
    }

    #[test]
    fn test_empty_stream_builds_root_only() {
        let tree = build(&[]);
        assert!(tree.is_empty());
        assert_eq!(tree.total_weight(), 0);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.node(tree.root).name, FrameName::synthetic("-"));
    }

    #[test]
    fn test_allocation_tree_weights_bytes() {
        let samples = vec![
            Sample::allocation(Some(jit_stack(1, &["a"])), 64, 0, None, "byte[]"),
            Sample::allocation(Some(jit_stack(1, &["a"])), 32, 0, None, "byte[]"),
        ];
        let mut builder =
            FrameTreeBuilder::new(BuildOptions::new(crate::sample::EventKind::Allocation));
        for sample in &samples {
            builder.add_sample(sample).unwrap();
        }
        let tree = builder.build();

        let a = tree.child_by_name(tree.root, "a").unwrap();
        let top = tree.child_by_name(a, "byte[]").unwrap();
        let node = tree.node(top);
        assert_eq!(node.total_weight, 96);
        assert_eq!(node.self_weight, 96);
        assert_eq!(node.samples_of(FrameKind::AllocationSynthetic), 2);
        assert_eq!(tree.total_weight(), 96);
    }
}
