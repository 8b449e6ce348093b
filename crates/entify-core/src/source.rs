// ── Collaborator seam ──
//
// The controller never performs I/O. Consumers inject a pull collaborator
// (required) and a put collaborator (optional); both are object-safe
// traits so the controller can hold them behind `Arc<dyn ...>` without
// leaking concrete transport types into its signature.

use std::future::Future;

use futures_core::future::BoxFuture;
use futures_util::FutureExt;

/// The raw rejection value of a collaborator call, forwarded verbatim to
/// the error hook.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type SourceResult<S> = Result<S, SourceError>;

/// Pull collaborator: given the effective query, produce the full new
/// entity state.
///
/// Implementations must not panic; failures are reported by resolving to
/// `Err`.
pub trait EntitySource<S, Q>: Send + Sync {
    fn pull(&self, query: Option<Q>) -> BoxFuture<'static, SourceResult<S>>;
}

/// Put collaborator: given the current entity state, perform the remote
/// mutation and return the (possibly transformed) resulting state.
pub trait EntitySink<S>: Send + Sync {
    fn put(&self, state: S) -> BoxFuture<'static, SourceResult<S>>;
}

// ── Function adapters ───────────────────────────────────────────────

/// Wrap an async closure as an [`EntitySource`].
///
/// ```
/// use entify_core::{SourceResult, pull_fn};
///
/// let source = pull_fn(|page: Option<u32>| async move {
///     SourceResult::Ok(format!("page {}", page.unwrap_or(0)))
/// });
/// # let _ = source;
/// ```
pub fn pull_fn<S, Q, F, Fut>(f: F) -> PullFn<F>
where
    F: Fn(Option<Q>) -> Fut + Send + Sync,
    Fut: Future<Output = SourceResult<S>> + Send + 'static,
{
    PullFn(f)
}

/// Wrap an async closure as an [`EntitySink`].
pub fn put_fn<S, F, Fut>(f: F) -> PutFn<F>
where
    F: Fn(S) -> Fut + Send + Sync,
    Fut: Future<Output = SourceResult<S>> + Send + 'static,
{
    PutFn(f)
}

pub struct PullFn<F>(F);

impl<S, Q, F, Fut> EntitySource<S, Q> for PullFn<F>
where
    F: Fn(Option<Q>) -> Fut + Send + Sync,
    Fut: Future<Output = SourceResult<S>> + Send + 'static,
{
    fn pull(&self, query: Option<Q>) -> BoxFuture<'static, SourceResult<S>> {
        (self.0)(query).boxed()
    }
}

pub struct PutFn<F>(F);

impl<S, F, Fut> EntitySink<S> for PutFn<F>
where
    F: Fn(S) -> Fut + Send + Sync,
    Fut: Future<Output = SourceResult<S>> + Send + 'static,
{
    fn put(&self, state: S) -> BoxFuture<'static, SourceResult<S>> {
        (self.0)(state).boxed()
    }
}
