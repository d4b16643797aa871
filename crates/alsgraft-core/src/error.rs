use thiserror::Error;

/// Errors surfaced while reading a set document or composing tracks.
///
/// Positional-ID mismatches inside the send matrix are deliberately not
/// represented here: a mismatch that survives load-time validation indicates
/// an engine defect and aborts via assertion instead of returning.
#[derive(Debug, Error)]
pub enum SetError {
    /// The container bytes or the wrapper shape are malformed.
    #[error("malformed set container: {0}")]
    Format(String),

    /// A node is present but has the wrong tag or shape for the requested
    /// typed view.
    #[error("unexpected document shape: {0}")]
    Schema(String),

    /// An index argument is outside the valid bounds.
    #[error("{what} index out of range: got {index}, but there are only {len}")]
    Range {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// A dangling or unrecognized ID reference.
    #[error("dangling reference: {0}")]
    Reference(String),

    /// The request would violate a structural rule of the document.
    #[error("structural invariant violated: {0}")]
    Invariant(String),

    /// The document uses a feature this engine does not support.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
}

pub type SetResult<T> = Result<T, SetError>;
