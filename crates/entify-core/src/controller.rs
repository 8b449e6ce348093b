// ── Entity controller ──
//
// Full lifecycle management for one remote-backed entity: initial pull,
// manual and dependency-triggered refresh, remote put, local patches,
// and reset. A monotonic ticket counter makes overlapping collaborator
// calls safe: only the response belonging to the highest issued ticket
// may commit, later-resolving stale responses are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{ChangeOptions, DepList, EntityConfig, ErrorHook};
use crate::error::CoreError;
use crate::merge;
use crate::source::{EntitySink, EntitySource};
use crate::stream::ValueStream;

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`-shared internals. Owns the entity state,
/// the query that parametrizes pulls, and the two loading flags, all held
/// in `watch` cells so consumers can snapshot or subscribe.
///
/// Construction spawns the initial automatic refresh (and the dependency
/// watcher, when configured), so a Tokio runtime must be current. Call
/// [`close()`](Self::close) to stop background tasks when the owning
/// component goes away.
pub struct EntityController<S, Q> {
    inner: Arc<Inner<S, Q>>,
}

struct Inner<S, Q> {
    initial_state: S,
    initial_query: Option<Q>,
    source: Arc<dyn EntitySource<S, Q>>,
    sink: Option<Arc<dyn EntitySink<S>>>,
    on_error: Option<ErrorHook>,
    state: watch::Sender<S>,
    query: watch::Sender<Option<Q>>,
    loading: watch::Sender<bool>,
    put_loading: watch::Sender<bool>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
    /// Ticket counter. Bumped immediately before every collaborator call;
    /// a response may commit only while its ticket is still the newest.
    ticket: AtomicU64,
    cancel: CancellationToken,
    tasks: OnceLock<Vec<JoinHandle<()>>>,
}

impl<S, Q> Clone for EntityController<S, Q> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, Q> EntityController<S, Q>
where
    S: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    Q: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a controller and kick off the initial automatic refresh.
    pub fn new(config: EntityConfig<S, Q>) -> Self {
        let (state, _) = watch::channel(config.state.clone());
        let (query, _) = watch::channel(config.query.clone());
        let (loading, _) = watch::channel(false);
        let (put_loading, _) = watch::channel(false);
        let (last_refresh, _) = watch::channel(None);

        let controller = Self {
            inner: Arc::new(Inner {
                initial_state: config.state,
                initial_query: config.query,
                source: config.source,
                sink: config.sink,
                on_error: config.on_error,
                state,
                query,
                loading,
                put_loading,
                last_refresh,
                ticket: AtomicU64::new(0),
                cancel: CancellationToken::new(),
                tasks: OnceLock::new(),
            }),
        };

        let mut handles = Vec::new();

        // Initial automatic refresh.
        let this = controller.clone();
        handles.push(tokio::spawn(async move { this.refresh().await }));

        if let Some(deps) = config.refresh_deps {
            let this = controller.clone();
            let cancel = controller.inner.cancel.clone();
            handles.push(tokio::spawn(deps_watch_task(this, deps, cancel)));
        }

        let _ = controller.inner.tasks.set(handles);
        controller
    }

    // ── Pull track ───────────────────────────────────────────────

    /// Pull fresh entity state using the current query.
    ///
    /// Settles without an error even when the collaborator rejects; the
    /// failure goes to the error hook and the state stays as it was.
    pub async fn refresh(&self) {
        let (query, ticket) = self.begin_pull(None);
        self.run_pull(query, ticket).await;
    }

    /// Pull fresh entity state using an explicit query.
    ///
    /// The stored query is not replaced; use
    /// [`set_query_data`](Self::set_query_data) for that.
    pub async fn refresh_with(&self, query: Q) {
        let (query, ticket) = self.begin_pull(Some(query));
        self.run_pull(query, ticket).await;
    }

    /// Resolve the effective query, raise the loading flag, and issue the
    /// ticket for one pull. Synchronous so a caller can order the ticket
    /// ahead of its own commit check before the pull runs.
    fn begin_pull(&self, new_query: Option<Q>) -> (Option<Q>, u64) {
        let query = new_query.or_else(|| self.inner.query.borrow().clone());
        self.inner.loading.send_replace(true);
        (query, self.next_ticket())
    }

    async fn run_pull(&self, query: Option<Q>, ticket: u64) {
        match self.inner.source.pull(query).await {
            Ok(state) => {
                if self.current_ticket() == ticket {
                    self.inner.state.send_replace(state);
                    self.inner.last_refresh.send_replace(Some(Utc::now()));
                } else {
                    debug!(
                        ticket,
                        current = self.current_ticket(),
                        "discarding stale pull response"
                    );
                }
            }
            Err(source) => self.report(&CoreError::Source(source)),
        }
        self.inner.loading.send_replace(false);
    }

    /// Fire a pull without awaiting it. The ticket is issued before this
    /// returns, so any response already in flight is superseded
    /// immediately.
    fn spawn_refresh(&self, new_query: Option<Q>) {
        let (query, ticket) = self.begin_pull(new_query);
        let this = self.clone();
        tokio::spawn(async move { this.run_pull(query, ticket).await });
    }

    // ── Put track ────────────────────────────────────────────────

    /// Push the current entity state through the put collaborator.
    ///
    /// A safe no-op when no sink was configured. With
    /// `ChangeOptions::REFRESH`, a refresh is fired once the put settles
    /// successfully; its ticket supersedes the put's own, so the state
    /// observed afterwards is the refreshed pull result, not the put
    /// response.
    pub async fn put(&self, options: ChangeOptions) {
        let Some(sink) = self.inner.sink.clone() else {
            return;
        };

        self.inner.put_loading.send_replace(true);
        let ticket = self.next_ticket();
        let state = self.inner.state.borrow().clone();

        match sink.put(state).await {
            Ok(new_state) => {
                if options.refresh {
                    self.spawn_refresh(None);
                }
                if self.current_ticket() == ticket {
                    self.inner.state.send_replace(new_state);
                } else {
                    debug!(ticket, "discarding superseded put response");
                }
            }
            Err(source) => self.report(&CoreError::Source(source)),
        }
        self.inner.put_loading.send_replace(false);
    }

    // ── Local patches ────────────────────────────────────────────

    /// Merge a partial update into the query.
    ///
    /// With `ChangeOptions::REFRESH`, fires a pull with the newly merged
    /// query. A patch that breaks the query's shape goes to the error
    /// hook and leaves the query unchanged.
    pub fn set_query_data<P: Serialize>(&self, patch: &P, options: ChangeOptions) {
        let current = self.inner.query.borrow().clone();
        match merge::merge_patch(current.as_ref(), patch) {
            Ok(merged) => {
                self.inner.query.send_replace(Some(merged.clone()));
                if options.refresh {
                    self.spawn_refresh(Some(merged));
                }
            }
            Err(e) => self.report(&CoreError::Patch(e)),
        }
    }

    /// Replace the entity state wholesale, bypassing the ticket counter.
    pub fn set_state(&self, state: S) {
        self.inner.state.send_replace(state);
    }

    /// Build a handler that patches one query field.
    ///
    /// Invoking the returned closure with a value is equivalent to
    /// calling `set_query_data` with `{ field: value }`.
    pub fn query_change(
        &self,
        field: impl Into<String>,
        options: ChangeOptions,
    ) -> impl Fn(Value) + Send + Sync + 'static {
        let this = self.clone();
        let field = field.into();
        move |value| {
            let mut patch = serde_json::Map::new();
            patch.insert(field.clone(), value);
            this.set_query_data(&Value::Object(patch), options);
        }
    }

    /// Build a handler that patches one entity state field.
    ///
    /// With `ChangeOptions::REFRESH`, the patch is followed by a pull
    /// using the current query.
    pub fn state_change(
        &self,
        field: impl Into<String>,
        options: ChangeOptions,
    ) -> impl Fn(Value) + Send + Sync + 'static {
        let this = self.clone();
        let field = field.into();
        move |value| {
            let mut patch = serde_json::Map::new();
            patch.insert(field.clone(), value);
            this.patch_state(&Value::Object(patch), options);
        }
    }

    fn patch_state(&self, patch: &Value, options: ChangeOptions) {
        let current = self.inner.state.borrow().clone();
        match merge::merge_patch(Some(&current), patch) {
            Ok(merged) => {
                self.inner.state.send_replace(merged);
                if options.refresh {
                    self.spawn_refresh(None);
                }
            }
            Err(e) => self.report(&CoreError::Patch(e)),
        }
    }

    // ── Reset ────────────────────────────────────────────────────

    /// Restore entity state and query to their construction-time values,
    /// then fire one pull with the restored query.
    pub fn reset(&self) {
        debug!("resetting to initial values");
        self.inner
            .state
            .send_replace(self.inner.initial_state.clone());
        self.inner
            .query
            .send_replace(self.inner.initial_query.clone());
        self.spawn_refresh(self.inner.initial_query.clone());
    }

    // ── Snapshot accessors ───────────────────────────────────────

    pub fn state(&self) -> S {
        self.inner.state.borrow().clone()
    }

    pub fn query(&self) -> Option<Q> {
        self.inner.query.borrow().clone()
    }

    /// Whether a pull is in flight.
    pub fn loading(&self) -> bool {
        *self.inner.loading.borrow()
    }

    /// Whether a put is in flight.
    pub fn put_loading(&self) -> bool {
        *self.inner.put_loading.borrow()
    }

    /// When the last pull committed, or `None` if none has yet.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_refresh.borrow()
    }

    /// How long ago the last pull committed, or `None` if never.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_refresh().map(|t| Utc::now() - t)
    }

    // ── Subscriptions ────────────────────────────────────────────

    pub fn watch_state(&self) -> ValueStream<S> {
        ValueStream::new(self.inner.state.subscribe())
    }

    pub fn watch_query(&self) -> ValueStream<Option<Q>> {
        ValueStream::new(self.inner.query.subscribe())
    }

    pub fn watch_loading(&self) -> ValueStream<bool> {
        ValueStream::new(self.inner.loading.subscribe())
    }

    pub fn watch_put_loading(&self) -> ValueStream<bool> {
        ValueStream::new(self.inner.put_loading.subscribe())
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Stop the background tasks. In-flight collaborator calls are not
    /// interrupted; their effect on state is suppressed by the ticket
    /// check as usual.
    pub fn close(&self) {
        self.inner.cancel.cancel();
        if let Some(handles) = self.inner.tasks.get() {
            for handle in handles {
                handle.abort();
            }
        }
    }

    // ── Private helpers ──────────────────────────────────────────

    fn next_ticket(&self) -> u64 {
        self.inner.ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current_ticket(&self) -> u64 {
        self.inner.ticket.load(Ordering::SeqCst)
    }

    fn report(&self, error: &CoreError) {
        warn!(%error, "entity operation failed");
        if let Some(hook) = &self.inner.on_error {
            hook(error);
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Watch the dependency channel and refresh whenever a delivered list
/// differs by value equality from the last one seen.
async fn deps_watch_task<S, Q>(
    controller: EntityController<S, Q>,
    mut deps: watch::Receiver<DepList>,
    cancel: CancellationToken,
) where
    S: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    Q: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let mut last = deps.borrow().clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = deps.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = deps.borrow_and_update().clone();
                if current != last {
                    debug!("refresh dependencies changed");
                    last = current;
                    controller.refresh().await;
                }
            }
        }
    }
}
