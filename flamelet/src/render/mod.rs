use serde::Serialize;

pub mod diff;
pub mod flame;

pub use diff::render_diff;
pub use flame::{render_single, render_single_with};

/// One renderable frame rectangle. Field names are the wire contract for
/// the front end and must not change.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FlameCell {
    pub left: u64,
    pub width: u64,
    pub color: &'static str,
    pub title: String,
    pub details: Details,
}

/// Free-text execution-mode suffix for single graphs, signed delta and
/// percent for diff graphs.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Details {
    Text(String),
    Diff { samples: i64, percent: u32 },
}

/// Layer-indexed output ready for the canvas: `levels[depth]` holds every
/// visible frame at that depth, left to right.
#[derive(Serialize, Debug)]
pub struct RenderedGraph {
    pub depth: usize,
    pub levels: Vec<Vec<FlameCell>>,
}

/// Layers grow lazily as deeper levels are first visited; this trades a
/// bounds check for a full depth pre-scan of the tree.
pub(crate) fn layer(levels: &mut Vec<Vec<FlameCell>>, level: usize) -> &mut Vec<FlameCell> {
    if levels.len() <= level {
        levels.push(Vec::new());
    }
    &mut levels[level]
}

pub mod palette {
    use crate::frame::FrameKind;

    pub const GREEN: [&str; 5] = ["#E5FFCC", "#CCFF99", "#B2FF66", "#99FF33", "#66CC00"];
    pub const RED: [&str; 5] = ["#FFEEEE", "#FFCCCC", "#FFAAAA", "#FF8888", "#FF3333"];
    pub const NEUTRAL: &str = "#E6E6E6";
    pub const REMOVED: &str = GREEN[4];
    pub const ADDED: &str = RED[4];

    pub fn kind_color(kind: FrameKind) -> &'static str {
        match kind {
            FrameKind::Interpreted => "#b2e1b2",
            FrameKind::C1Compiled => "#cce880",
            FrameKind::JitCompiled => "#50e150",
            FrameKind::Inlined => "#50cccc",
            FrameKind::Native => "#e15a5a",
            FrameKind::Kernel => "#e17d00",
            FrameKind::Cpp => "#c8c83c",
            FrameKind::ThreadSynthetic => "#b3b3ff",
            FrameKind::LambdaSynthetic => "#9ecccc",
            FrameKind::AllocationSynthetic => "#5ab2e1",
            FrameKind::BlockingSynthetic => "#e15ab2",
        }
    }
}

/// Human weight suffixes for event types whose weight is not a sample
/// count.
pub mod suffix {
    /// e.g. "1.5 MiB Allocated"
    pub fn allocated(weight: u64) -> String {
        format!("{} Allocated", bytes(weight))
    }

    /// e.g. "250 ms Blocked"
    pub fn blocked(weight: u64) -> String {
        format!("{} Blocked", duration(weight))
    }

    fn bytes(value: u64) -> String {
        const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
        let mut scaled = value as f64;
        let mut unit = 0;
        while scaled >= 1024.0 && unit < UNITS.len() - 1 {
            scaled /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{value} B")
        } else {
            format!("{scaled:.1} {}", UNITS[unit])
        }
    }

    fn duration(nanos: u64) -> String {
        if nanos >= 1_000_000_000 {
            format!("{:.2} s", nanos as f64 / 1e9)
        } else if nanos >= 1_000_000 {
            format!("{} ms", nanos / 1_000_000)
        } else if nanos >= 1_000 {
            format!("{} us", nanos / 1_000)
        } else {
            format!("{nanos} ns")
        }
    }

}
