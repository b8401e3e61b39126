// metar_qam - METAR poller that keeps a change history and renders QAM weather bulletins
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::history::HistoryEntry;
use crate::render::Report;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

const OPENMETRICS_TEXT: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";
const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Number of observations served by `/history`.
pub const RECENT_HISTORY_ROWS: usize = 20;

/// Shared state for HTTP handlers: the metrics registry, the most recently
/// rendered report, and the recent observations, updated by the poll loop.
#[derive(Debug)]
pub struct RequestContext {
    registry: Registry,
    latest: RwLock<Option<Report>>,
    recent: RwLock<Vec<HistoryEntry>>,
}

impl RequestContext {
    pub fn new(registry: Registry) -> Self {
        RequestContext {
            registry,
            latest: RwLock::new(None),
            recent: RwLock::new(Vec::new()),
        }
    }

    pub async fn set_report(&self, report: Report) {
        *self.latest.write().await = Some(report);
    }

    /// Replace the observations served by `/history`, oldest first.
    pub async fn set_recent(&self, entries: Vec<HistoryEntry>) {
        *self.recent.write().await = entries;
    }
}

pub fn app(context: Arc<RequestContext>) -> Router {
    Router::new()
        .route("/metrics", get(text_metrics))
        .route("/report", get(latest_report))
        .route("/history", get(recent_history))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn text_metrics(State(context): State<Arc<RequestContext>>) -> Response {
    let mut buf = String::new();

    match encode(&mut buf, &context.registry) {
        Ok(_) => {
            tracing::debug!(message = "encoded prometheus metrics to text format", num_bytes = buf.len());
            ([(CONTENT_TYPE, OPENMETRICS_TEXT)], buf).into_response()
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics", error = %e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn latest_report(State(context): State<Arc<RequestContext>>) -> Response {
    match context.latest.read().await.as_ref() {
        Some(report) => {
            let body = format!("{}\n\n{}\n", report.bulletin, report.narrative);
            ([(CONTENT_TYPE, PLAIN_TEXT)], body).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn recent_history(State(context): State<Arc<RequestContext>>) -> Response {
    let recent = context.recent.read().await;
    if recent.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }

    let body: String = recent
        .iter()
        .map(|e| format!("{} {} {}\n", e.observed_time, e.station, e.raw_report))
        .collect();
    ([(CONTENT_TYPE, PLAIN_TEXT)], body).into_response()
}
