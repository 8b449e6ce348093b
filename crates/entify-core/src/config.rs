// ── Construction-time configuration ──
//
// Describes *what* a controller manages and *who* it talks to. Built by
// the consumer and handed to `EntityController::new` -- the core never
// reads files or the environment.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::CoreError;
use crate::source::{EntitySink, EntitySource};

/// Hook invoked with every failure the controller swallows.
pub type ErrorHook = Arc<dyn Fn(&CoreError) + Send + Sync>;

/// An ordered list of arbitrary values; delivering a list that differs by
/// value equality from the last one seen triggers an automatic refresh.
pub type DepList = Vec<serde_json::Value>;

/// Options shared by the patch operations and [`put`].
///
/// [`put`]: crate::EntityController::put
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeOptions {
    /// Follow the change with a refresh.
    pub refresh: bool,
}

impl ChangeOptions {
    pub const REFRESH: Self = Self { refresh: true };
}

/// Configuration for a single entity controller.
///
/// The pull collaborator is required; everything else is opt-in.
pub struct EntityConfig<S, Q> {
    pub(crate) state: S,
    pub(crate) query: Option<Q>,
    pub(crate) source: Arc<dyn EntitySource<S, Q>>,
    pub(crate) sink: Option<Arc<dyn EntitySink<S>>>,
    pub(crate) on_error: Option<ErrorHook>,
    pub(crate) refresh_deps: Option<watch::Receiver<DepList>>,
}

impl<S, Q> EntityConfig<S, Q> {
    /// Start a configuration from the initial entity value and the pull
    /// collaborator.
    pub fn new(state: S, source: impl EntitySource<S, Q> + 'static) -> Self {
        Self {
            state,
            query: None,
            source: Arc::new(source),
            sink: None,
            on_error: None,
            refresh_deps: None,
        }
    }

    /// Initial query handed to the first automatic pull.
    pub fn query(mut self, query: Q) -> Self {
        self.query = Some(query);
        self
    }

    /// Put collaborator. Without one, [`put`] is a no-op.
    ///
    /// [`put`]: crate::EntityController::put
    pub fn sink(mut self, sink: impl EntitySink<S> + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Hook invoked with every swallowed failure.
    pub fn on_error(mut self, hook: impl Fn(&CoreError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Channel of refresh dependencies. Each delivered list is compared by
    /// value equality against the last one seen; a difference triggers a
    /// refresh with the current query.
    pub fn refresh_deps(mut self, deps: watch::Receiver<DepList>) -> Self {
        self.refresh_deps = Some(deps);
        self
    }
}
