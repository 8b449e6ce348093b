//! Reactive state layer for a single remote-backed entity.
//!
//! This crate owns one primitive: a controller that fetches, caches,
//! mutates, and re-fetches a piece of remote data alongside the query
//! object that parametrizes the fetch, while guarding against
//! out-of-order responses:
//!
//! - **[`EntityController`]** — Central facade managing the full
//!   lifecycle: construction kicks off the initial pull, patch operations
//!   merge partial updates into the query or entity state, and a monotonic
//!   ticket counter guarantees that of any set of overlapping pull/put
//!   calls only the most recently issued one commits.
//!
//! - **[`EntityConfig`]** — Construction-time wiring: the initial entity
//!   value, an optional initial query, the injected [`EntitySource`] /
//!   [`EntitySink`] collaborators, an optional error hook, and an optional
//!   refresh-dependency channel.
//!
//! - **[`ValueStream<T>`]** — Subscription handle vended for entity state,
//!   query, and loading flags. Exposes `current()` / `latest()` /
//!   `changed()` for reactive rendering.
//!
//! - **[`merge`]** — The structural merge shared by query and state
//!   patches: source keys overwrite, except where the target already holds
//!   an object, which is merged recursively.
//!
//! The controller performs no I/O of its own. Networking, rendering, and
//! persistence all live behind the injected collaborators.

pub mod config;
pub mod controller;
pub mod error;
pub mod merge;
pub mod source;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ChangeOptions, DepList, EntityConfig};
pub use controller::EntityController;
pub use error::CoreError;
pub use source::{EntitySink, EntitySource, SourceError, SourceResult, pull_fn, put_fn};
pub use stream::ValueStream;
