//! Demo consumer: a report "dashboard" driving an [`EntityController`]
//! against a fake backend with injected latency.
//!
//! Run with `cargo run --example dashboard`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::sleep;
use tracing::{info, warn};

use entify_core::{ChangeOptions, EntityConfig, EntityController, SourceResult, pull_fn, put_fn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Report {
    total: u64,
    flagged: u64,
    note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ReportQuery {
    date: String,
    kind: u32,
}

/// Fake remote read: the "server" derives the report from the query.
async fn fetch_report(query: Option<ReportQuery>) -> SourceResult<Report> {
    sleep(Duration::from_millis(120)).await;
    let query = query.unwrap_or_else(|| ReportQuery {
        date: "1970-01-01".into(),
        kind: 0,
    });
    Ok(Report {
        total: 100 + u64::from(query.kind),
        flagged: u64::from(query.kind) * 2,
        note: format!("report for {}", query.date),
    })
}

/// Fake remote write: the "server" acknowledges by stamping the note.
async fn submit_report(state: Report) -> SourceResult<Report> {
    sleep(Duration::from_millis(80)).await;
    Ok(Report {
        note: format!("{} (submitted)", state.note),
        ..state
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,entify_core=debug".into()),
        )
        .init();

    let controller = EntityController::new(
        EntityConfig::new(
            Report {
                total: 0,
                flagged: 0,
                note: "not loaded".into(),
            },
            pull_fn(fetch_report),
        )
        .query(ReportQuery {
            date: "2021-01-01".into(),
            kind: 2,
        })
        .sink(put_fn(submit_report))
        .on_error(|e| warn!(%e, "dashboard operation failed")),
    );

    // Mirror a rendering layer: log every committed state.
    let renderer = {
        let mut states = controller.watch_state();
        tokio::spawn(async move {
            while let Some(report) = states.changed().await {
                info!(?report, "render");
            }
        })
    };

    // Initial automatic pull.
    sleep(Duration::from_millis(200)).await;
    info!(state = ?controller.state(), query = ?controller.query(), "after initial pull");

    // Per-field input handler, refreshing on every change.
    let kind_change = controller.query_change("kind", ChangeOptions::REFRESH);
    kind_change(json!(7));
    sleep(Duration::from_millis(200)).await;

    // Partial query update without an automatic pull, then a manual one.
    controller.set_query_data(&json!({"date": "2021-06-15"}), ChangeOptions::default());
    controller.refresh().await;
    info!(state = ?controller.state(), "after manual refresh");

    // Remote mutation followed by a re-fetch.
    controller.put(ChangeOptions::REFRESH).await;
    sleep(Duration::from_millis(200)).await;

    // Back to square one.
    controller.reset();
    sleep(Duration::from_millis(200)).await;
    info!(state = ?controller.state(), query = ?controller.query(), "after reset");

    controller.close();
    renderer.abort();
}
