use thiserror::Error;

/// Failure classes surfaced by the editing core.
///
/// `Decode` and `OperationFailed` are user-visible and non-fatal; `EmptyInput`
/// indicates a broken "always at least one segment" invariant and is treated
/// as a programming error by callers. Out-of-range cut/resize requests are
/// clamped or no-op'd at the call site and never reach the user, so
/// `InvalidRange` only shows up when a caller bypasses the editor facade.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("no input buffers")]
    EmptyInput,

    #[error("range out of bounds")]
    InvalidRange,

    #[error("cannot delete the last remaining segment")]
    LastSegment,

    #[error("operation failed: {0}")]
    OperationFailed(String),
}
