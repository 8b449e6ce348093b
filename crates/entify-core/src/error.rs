// ── Core error types ──
//
// Failures never surface as return values of `refresh`/`put`/`reset`;
// they are logged, forwarded to the configured error hook, and the
// operation settles normally with its loading flag cleared.

use thiserror::Error;

use crate::source::SourceError;

/// Unified error type forwarded to the error hook.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A collaborator rejected a pull or put request.
    ///
    /// The two are intentionally not distinguished: the raw rejection
    /// value is carried as-is for the hook to inspect.
    #[error("source rejected the request: {0}")]
    Source(SourceError),

    /// A merged patch no longer fits the target type's shape.
    ///
    /// Can only happen with typed state/query: the structural merge is
    /// performed on `serde_json::Value` and the result failed to
    /// deserialize back. The target is left unchanged.
    #[error("patch does not fit the target shape: {0}")]
    Patch(#[from] serde_json::Error),
}
