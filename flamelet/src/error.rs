use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeError {
    /// The classifier chain guarantees total coverage of every stack
    /// position; a gap is an internal inconsistency, never skipped over.
    #[error("no classifier matched stack position {position}")]
    ClassificationGap { position: usize },

    #[error("invalid search pattern")]
    InvalidSearchPattern(#[from] regex::Error),
}
