use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use std::sync::Arc;

use crate::api::metrics::render_metrics;
use crate::common::config::ExporterConfig;
use crate::device::{decode_snapshot, SmiSource};

/// Collaborators handed to every request. Nothing in here is mutated, so
/// concurrent scrapes never share sample data.
#[derive(Clone)]
pub struct ExporterState {
    pub source: Arc<dyn SmiSource>,
    pub telemetry_path: String,
}

impl ExporterState {
    pub fn new(source: Arc<dyn SmiSource>, telemetry_path: impl Into<String>) -> Self {
        Self {
            source,
            telemetry_path: telemetry_path.into(),
        }
    }
}

/// Query the source, decode, render. Always answers 200: a failed query
/// yields an empty body and a bad document yields degraded values.
pub async fn metrics_handler(State(state): State<ExporterState>) -> impl IntoResponse {
    tracing::info!("Serving {}", state.telemetry_path);

    let body = match state.source.query().await {
        Ok(bytes) => render_metrics(&decode_snapshot(&bytes)),
        Err(e) => {
            tracing::error!("Failed to query {}: {e}", state.source.describe());
            String::new()
        }
    };

    (
        [(header::CONTENT_TYPE, ExporterConfig::METRICS_CONTENT_TYPE)],
        body,
    )
}

pub async fn index_handler(State(state): State<ExporterState>) -> Html<String> {
    tracing::info!("Serving /");
    Html(format!(
        r#"<!doctype html>
<html>
    <head>
        <meta charset="utf-8">
        <title>Nvidia SMI Exporter</title>
    </head>
    <body>
        <h1>Nvidia SMI Exporter</h1>
        <p><a href="{path}">Metrics</a></p>
    </body>
</html>"#,
        path = state.telemetry_path
    ))
}
