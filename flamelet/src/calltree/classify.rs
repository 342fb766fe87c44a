use crate::config::BuildOptions;
use crate::error::TreeError;
use crate::frame::{FrameKind, FrameName};
use crate::sample::{EventKind, RawFrame, Sample, SampleExtra, StackTrace};

pub const LAMBDA_FORM_PREFIX: &str = "java.lang.invoke.LambdaForm$";
pub const DIRECT_METHOD_HANDLE_HOLDER: &str = "java.lang.invoke.DirectMethodHandle$Holder";
pub const LAMBDA_CLASS_INFIX: &str = "$$Lambda";
pub const LAMBDA_METHOD_PREFIX: &str = "lambda$";

pub const COLLAPSED_LAMBDA_LABEL: &str = "(lambda collapsed)";
pub const UNKNOWN_THREAD_LABEL: &str = "(unknown thread)";

/// One logical frame emitted by a classifier. `raw_index` points at the
/// raw frame the kind was derived from when the kind can legitimately be
/// re-derived per sample (compilation tier varies at runtime); synthetic
/// frames carry `None` and keep their kind forever.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NewFrame {
    pub name: FrameName,
    pub kind: FrameKind,
    pub raw_index: Option<usize>,
}

/// Outcome of one classifier firing: the emitted frame plus how many raw
/// frames it consumed. Zero consumption is legal (thread markers, top
/// frames synthesized from already-consumed context).
#[derive(Debug)]
pub struct Classified {
    pub frame: NewFrame,
    pub consumed: usize,
}

/// The closed set of classification strategies. The set is fixed at
/// compile time and dispatched by a single ordered scan, cheapest
/// predicate first.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Classifier {
    /// Synthetic root-level frame per distinct thread, ahead of any real
    /// frames.
    ThreadBoundary,
    /// Collapses a run of method-handle/lambda-form frames into a single
    /// synthetic frame.
    LambdaCollapse,
    /// One logical frame per raw frame, kind taken from the raw frame.
    Normal,
    /// Names the allocated class at the top of allocation stacks.
    AllocationTop,
    /// Names the monitor/parked class at the top of blocking stacks.
    BlockingTop,
}

pub(crate) fn is_lambda_frame(frame: &RawFrame) -> bool {
    let (class_part, method_part) = match frame.name.split_once('#') {
        Some((class, method)) => (class, method),
        None => (frame.name.as_str(), frame.name.as_str()),
    };
    class_part.starts_with(LAMBDA_FORM_PREFIX)
        || class_part.starts_with(DIRECT_METHOD_HANDLE_HOLDER)
        || class_part.contains(LAMBDA_CLASS_INFIX)
        || method_part.starts_with(LAMBDA_METHOD_PREFIX)
}

impl Classifier {
    /// Whether this classifier fires at the root-ordered position `pos`.
    /// Positions run 0..=len; only end-of-stack synthesizers match at len.
    pub fn matches(&self, sample: &Sample, stack: &StackTrace, pos: usize) -> bool {
        let end = stack.frames.len();
        match self {
            Classifier::ThreadBoundary => pos == 0,
            Classifier::LambdaCollapse => pos < end && is_lambda_frame(stack.rootward(pos)),
            Classifier::Normal => pos < end,
            Classifier::AllocationTop => {
                pos == end && matches!(sample.extra, SampleExtra::Allocation { .. })
            }
            Classifier::BlockingTop => {
                pos == end && matches!(sample.extra, SampleExtra::Blocking { .. })
            }
        }
    }

    /// Emit the logical frame at `pos` and report raw frames consumed.
    pub fn process(&self, sample: &Sample, stack: &StackTrace, pos: usize) -> Classified {
        match self {
            Classifier::ThreadBoundary => {
                let name = sample
                    .thread
                    .as_ref()
                    .map_or(UNKNOWN_THREAD_LABEL, |t| t.name.as_str());
                Classified {
                    frame: NewFrame {
                        name: FrameName::synthetic(name),
                        kind: FrameKind::ThreadSynthetic,
                        raw_index: None,
                    },
                    consumed: 0,
                }
            }
            Classifier::LambdaCollapse => {
                let end = stack.frames.len();
                let mut run = 1;
                while pos + run < end && is_lambda_frame(stack.rootward(pos + run)) {
                    run += 1;
                }
                Classified {
                    frame: NewFrame {
                        name: FrameName::synthetic(COLLAPSED_LAMBDA_LABEL),
                        kind: FrameKind::LambdaSynthetic,
                        raw_index: None,
                    },
                    consumed: run,
                }
            }
            Classifier::Normal => {
                let raw = stack.rootward(pos);
                let raw_index = raw.kind.is_java().then(|| stack.raw_index(pos));
                Classified {
                    frame: NewFrame {
                        name: FrameName::new(raw.name.clone(), raw.line, raw.bci),
                        kind: raw.kind,
                        raw_index,
                    },
                    consumed: 1,
                }
            }
            Classifier::AllocationTop | Classifier::BlockingTop => {
                let class_name = sample.extra.class_name().unwrap_or("?");
                let kind = if matches!(self, Classifier::AllocationTop) {
                    FrameKind::AllocationSynthetic
                } else {
                    FrameKind::BlockingSynthetic
                };
                // line/bci of the innermost raw frame, like any other
                // occurrence at that call site
                let (line, bci) = if stack.frames.is_empty() {
                    (0, 0)
                } else {
                    let innermost = stack.rootward(stack.frames.len() - 1);
                    (innermost.line, innermost.bci)
                };
                Classified {
                    frame: NewFrame {
                        name: FrameName::new(class_name, line, bci),
                        kind,
                        raw_index: None,
                    },
                    consumed: 0,
                }
            }
        }
    }
}

/// Ordered classifier chain. The first classifier matching the current
/// position wins; after a zero-consumption hit the scan resumes from the
/// classifiers behind it so a synthesizer can never re-fire in place.
pub struct Pipeline {
    pub(crate) classifiers: Vec<Classifier>,
}

impl Pipeline {
    pub fn for_options(options: &BuildOptions) -> Self {
        let mut classifiers = Vec::with_capacity(4);
        if options.thread_mode {
            classifiers.push(Classifier::ThreadBoundary);
        }
        if options.lambda_collapse {
            classifiers.push(Classifier::LambdaCollapse);
        }
        classifiers.push(Classifier::Normal);
        match options.event_kind {
            EventKind::Allocation => classifiers.push(Classifier::AllocationTop),
            kind if kind.is_blocking() => classifiers.push(Classifier::BlockingTop),
            _ => {}
        }
        Self { classifiers }
    }

    /// Resolve a raw stack into its logical frame path, root first.
    pub fn resolve(&self, sample: &Sample, stack: &StackTrace) -> Result<Vec<NewFrame>, TreeError> {
        let end = stack.frames.len();
        let mut out = Vec::with_capacity(end + 2);
        let mut pos = 0;
        let mut from = 0;
        while pos <= end {
            let hit = self.classifiers[from..]
                .iter()
                .position(|c| c.matches(sample, stack, pos));
            let Some(offset) = hit else {
                if pos == end {
                    break;
                }
                return Err(TreeError::ClassificationGap { position: pos });
            };

            let classified = self.classifiers[from + offset].process(sample, stack, pos);
            out.push(classified.frame);
            if classified.consumed == 0 {
                from += offset + 1;
            } else {
                from = 0;
                pos += classified.consumed;
            }
        }
        Ok(out)
    }
}
