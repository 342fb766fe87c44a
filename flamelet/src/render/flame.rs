use std::fmt::Write;

use indextree::NodeId;

use super::{layer, palette, Details, FlameCell, RenderedGraph};
use crate::calltree::FrameTree;
use crate::frame::{FrameKind, FrameNode};

/// Render a single tree into width-positioned layers. `min_width_pct` is
/// the fraction of the root total below which subtrees are truncated.
pub fn render_single(tree: &FrameTree, min_width_pct: f64) -> RenderedGraph {
    render_single_with(tree, min_width_pct, None)
}

/// Same, with a custom weight suffix for trees whose weight is bytes or
/// nanoseconds rather than a sample count (see `render::suffix`).
pub fn render_single_with(
    tree: &FrameTree,
    min_width_pct: f64,
    weight_suffix: Option<&dyn Fn(u64) -> String>,
) -> RenderedGraph {
    let min_total = (tree.total_weight() as f64 * min_width_pct / 100.0) as u64;
    let mut levels = Vec::new();
    walk(tree, tree.root, "all", 0, 0, min_total, &mut levels, weight_suffix);
    RenderedGraph {
        depth: levels.len(),
        levels,
    }
}

#[allow(clippy::too_many_arguments)]
fn walk(
    tree: &FrameTree,
    node: NodeId,
    title: &str,
    level: usize,
    mut x: u64,
    min_total: u64,
    levels: &mut Vec<Vec<FlameCell>>,
    weight_suffix: Option<&dyn Fn(u64) -> String>,
) {
    let frame = tree.node(node);
    let kind = frame.dominant_kind();
    let title = if kind == FrameKind::Kernel {
        strip_kernel_suffix(title)
    } else {
        title
    };
    let details = match weight_suffix {
        Some(format) => Details::Text(format(frame.total_weight)),
        None => Details::Text(mode_detail(frame)),
    };

    layer(levels, level).push(FlameCell {
        left: x,
        width: frame.total_weight,
        color: palette::kind_color(kind),
        title: title.to_owned(),
        details,
    });

    for child in tree.children(node) {
        let child_frame = tree.node(child);
        if child_frame.total_weight >= min_total {
            walk(
                tree,
                child,
                &child_frame.name.method,
                level + 1,
                x,
                min_total,
                levels,
                weight_suffix,
            );
        }
        // truncated subtrees still occupy their width
        x += child_frame.total_weight;
    }
}

/// Execution-mode suffix, e.g. ", inl=3, int=1". Empty for frames that
/// only ran fully compiled.
fn mode_detail(frame: &FrameNode) -> String {
    let mut out = String::new();
    for (label, kind) in [
        ("inl", FrameKind::Inlined),
        ("c1", FrameKind::C1Compiled),
        ("int", FrameKind::Interpreted),
    ] {
        let samples = frame.samples_of(kind);
        if samples != 0 {
            let _ = write!(out, ", {label}={samples}");
        }
    }
    out
}

/// The capture layer tags kernel symbols with a `_[k]` suffix.
fn strip_kernel_suffix(title: &str) -> &str {
    title.strip_suffix("_[k]").unwrap_or(title)
}
