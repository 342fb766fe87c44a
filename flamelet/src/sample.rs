use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::frame::FrameKind;

/// One raw frame as captured by the recording reader. The engine treats
/// `name` as opaque; the `Class#method` convention only matters to the
/// lambda matcher and the search filter.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct RawFrame {
    pub name: String,
    pub line: i32,
    pub bci: i32,
    pub kind: FrameKind,
}

impl RawFrame {
    pub fn new(name: impl Into<String>, line: i32, bci: i32, kind: FrameKind) -> Self {
        Self {
            name: name.into(),
            line,
            bci,
            kind,
        }
    }
}

/// How the capture layer ordered the frames of a stack.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum FrameOrder {
    /// Innermost frame first, the usual capture order.
    #[default]
    LeafFirst,
    RootFirst,
}

/// A captured stack. `id` is the stable identity the reader assigned at
/// ingestion; the stack cache keys on it, never on content.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct StackTrace {
    pub id: u64,
    pub frames: Vec<RawFrame>,
    #[serde(default)]
    pub order: FrameOrder,
}

impl StackTrace {
    pub fn new(id: u64, frames: Vec<RawFrame>) -> Self {
        Self {
            id,
            frames,
            order: FrameOrder::LeafFirst,
        }
    }

    pub fn root_first(id: u64, frames: Vec<RawFrame>) -> Self {
        Self {
            id,
            frames,
            order: FrameOrder::RootFirst,
        }
    }

    /// Frame at `pos` counting from the root end of the stack.
    pub fn rootward(&self, pos: usize) -> &RawFrame {
        &self.frames[self.raw_index(pos)]
    }

    /// Index into `frames` for a root-ordered position.
    pub fn raw_index(&self, pos: usize) -> usize {
        match self.order {
            FrameOrder::LeafFirst => self.frames.len() - 1 - pos,
            FrameOrder::RootFirst => pos,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct ThreadInfo {
    pub name: String,
}

impl ThreadInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Event-type specific payload, consumed only by the synthetic top-frame
/// classifiers.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq, Default)]
pub enum SampleExtra {
    #[default]
    None,
    Allocation {
        class_name: String,
    },
    Blocking {
        class_name: String,
    },
}

impl SampleExtra {
    pub fn class_name(&self) -> Option<&str> {
        match self {
            SampleExtra::None => None,
            SampleExtra::Allocation { class_name } | SampleExtra::Blocking { class_name } => {
                Some(class_name)
            }
        }
    }
}

/// One profiling event. `weight` is whatever quantity the event type
/// carries (sample count, bytes, nanoseconds); `timestamp` is epoch millis.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Sample {
    pub stack: Option<Arc<StackTrace>>,
    pub weight: u64,
    pub timestamp: i64,
    pub thread: Option<ThreadInfo>,
    pub extra: SampleExtra,
}

impl Sample {
    pub fn execution(
        stack: Option<Arc<StackTrace>>,
        weight: u64,
        timestamp: i64,
        thread: Option<ThreadInfo>,
    ) -> Self {
        Self {
            stack,
            weight,
            timestamp,
            thread,
            extra: SampleExtra::None,
        }
    }

    pub fn allocation(
        stack: Option<Arc<StackTrace>>,
        weight: u64,
        timestamp: i64,
        thread: Option<ThreadInfo>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            stack,
            weight,
            timestamp,
            thread,
            extra: SampleExtra::Allocation {
                class_name: class_name.into(),
            },
        }
    }

    pub fn blocking(
        stack: Option<Arc<StackTrace>>,
        weight: u64,
        timestamp: i64,
        thread: Option<ThreadInfo>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            stack,
            weight,
            timestamp,
            thread,
            extra: SampleExtra::Blocking {
                class_name: class_name.into(),
            },
        }
    }
}

/// Which event family a tree is built for; selects the synthetic
/// top-frame classifier.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum EventKind {
    #[default]
    Execution,
    Allocation,
    MonitorEnter,
    MonitorWait,
    ThreadPark,
}

impl EventKind {
    pub fn is_blocking(self) -> bool {
        matches!(
            self,
            EventKind::MonitorEnter | EventKind::MonitorWait | EventKind::ThreadPark
        )
    }
}
