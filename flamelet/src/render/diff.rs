use indextree::NodeId;

use super::{layer, palette, Details, FlameCell, RenderedGraph};
use crate::calltree::{DiffMark, DiffTree};

/// Hard cap on rendered depth; bounds pathological recursion on
/// adversarially deep inputs.
const MAX_DEPTH: usize = 1000;

/// Render a diff tree. `min_samples_pct` is the fraction of the combined
/// baseline+comparison total below which subtrees are truncated.
pub fn render_diff(tree: &DiffTree, min_samples_pct: f64) -> RenderedGraph {
    let min_samples = (tree.grand_total() as f64 * min_samples_pct / 100.0) as u64;
    let mut levels = Vec::new();
    walk(tree, tree.root, "all", 0, 0, min_samples, &mut levels);
    RenderedGraph {
        depth: levels.len(),
        levels,
    }
}

fn walk(
    tree: &DiffTree,
    node: NodeId,
    title: &str,
    level: usize,
    mut x: u64,
    min_samples: u64,
    levels: &mut Vec<Vec<FlameCell>>,
) {
    let diff_node = tree.node(node);
    let (color, details) = match diff_node.mark {
        DiffMark::Shared {
            baseline,
            comparison,
        } => (
            shared_color(baseline, comparison),
            Details::Diff {
                samples: comparison as i64 - baseline as i64,
                percent: change_pct(baseline, comparison),
            },
        ),
        DiffMark::Added { total, .. } => (
            palette::ADDED,
            Details::Diff {
                samples: total as i64,
                percent: 100,
            },
        ),
        DiffMark::Removed { total, .. } => (
            palette::REMOVED,
            Details::Diff {
                samples: -(total as i64),
                percent: 100,
            },
        ),
    };

    layer(levels, level).push(FlameCell {
        left: x,
        width: diff_node.mark.total(),
        color,
        title: title.to_owned(),
        details,
    });

    for child in tree.children(node) {
        let child_node = tree.node(child);
        let width = child_node.mark.total();
        if width > min_samples && level < MAX_DEPTH {
            walk(
                tree,
                child,
                &child_node.name.method,
                level + 1,
                x,
                min_samples,
                levels,
            );
        }
        x += width;
    }
}

/// Rounded percentage change between the two sides.
fn change_pct(baseline: u64, comparison: u64) -> u32 {
    let total = baseline + comparison;
    if total == 0 {
        return 0;
    }
    let delta = baseline.abs_diff(comparison);
    ((delta as f64 / total as f64) * 100.0).round() as u32
}

/// Neutral under 2%, then a 5-step palette banded by change magnitude;
/// green when the baseline is heavier, red when the comparison is.
fn shared_color(baseline: u64, comparison: u64) -> &'static str {
    let pct = change_pct(baseline, comparison);
    if pct <= 2 {
        return palette::NEUTRAL;
    }
    let index = if pct <= 10 {
        0
    } else if pct <= 40 {
        1
    } else if pct <= 80 {
        2
    } else {
        3
    };
    if baseline > comparison {
        palette::GREEN[index]
    } else {
        palette::RED[index]
    }
}
