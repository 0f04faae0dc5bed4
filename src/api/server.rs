// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::handlers::{index_handler, metrics_handler, ExporterState};
use crate::cli::Cli;
use crate::common::config::{listen_candidates, ExporterConfig};
use crate::device::{CommandSource, FileSource, SmiSource};
use crate::error::{Error, Result};

/// Install the fmt subscriber, filtered by `RUST_LOG` when set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| ExporterConfig::DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Pick the sample source the command line asks for.
pub fn build_source(args: &Cli) -> Arc<dyn SmiSource> {
    match &args.nvidia_smi_xml_file {
        Some(path) => Arc::new(FileSource::new(path)),
        None => Arc::new(
            CommandSource::new(args.nvidia_smi_command.clone()).with_timeout(args.smi_timeout()),
        ),
    }
}

/// Reject telemetry paths the router would read as captures or wildcards.
pub fn validate_telemetry_path(path: &str) -> Result<()> {
    let invalid = |reason: &'static str| -> Result<()> {
        Err(Error::InvalidTelemetryPath {
            path: path.to_string(),
            reason,
        })
    };
    if !path.starts_with('/') {
        return invalid("must start with '/'");
    }
    if path.contains(['{', '}']) {
        return invalid("braces are not allowed");
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with([':', '*']))
    {
        return invalid("segments must not start with ':' or '*'");
    }
    Ok(())
}

/// Routes: an index page at `/` and the metrics body at the telemetry path.
pub fn build_router(state: ExporterState) -> Result<Router> {
    validate_telemetry_path(&state.telemetry_path)?;

    let mut router = Router::new().route(&state.telemetry_path, get(metrics_handler));
    if state.telemetry_path != "/" {
        router = router.route("/", get(index_handler));
    }

    Ok(router
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http()))
}

/// Bind the first candidate address that accepts a listener.
pub async fn bind_listener(address: &str, candidates: &[String]) -> Result<TcpListener> {
    let mut last_error = None;
    for candidate in candidates {
        match TcpListener::bind(candidate.as_str()).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                tracing::debug!("Could not bind {candidate}: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(Error::Bind {
        address: address.to_string(),
        source: last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "no address to bind")
        }),
    })
}

/// Run the exporter until Ctrl+C or SIGTERM.
pub async fn run_api_mode(args: &Cli) -> Result<()> {
    let source = build_source(args);
    let state = ExporterState::new(source.clone(), args.normalized_telemetry_path());
    let app = build_router(state)?;

    let candidates = listen_candidates(&args.listen_address);
    let listener = bind_listener(&args.listen_address, &candidates).await?;

    tracing::info!(
        "Nvidia SMI exporter listening on {} (source: {})",
        listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| args.listen_address.clone()),
        source.describe()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_build_source_prefers_xml_file() {
        let args = Cli::parse_from([
            "nvidia-smi-exporter",
            "--nvidia-smi-xml-file",
            "/tmp/sample.xml",
        ]);
        assert_eq!(build_source(&args).describe(), "file /tmp/sample.xml");

        let args = Cli::parse_from(["nvidia-smi-exporter", "--nvidia-smi-command", "/opt/nvidia-smi"]);
        assert_eq!(build_source(&args).describe(), "/opt/nvidia-smi -q -x");
    }

    fn file_state(path: &str) -> ExporterState {
        ExporterState::new(Arc::new(FileSource::new("/tmp/sample.xml")), path)
    }

    #[test]
    fn test_router_rejects_capture_like_paths() {
        for path in ["/:metrics", "/gpu/*rest", "/{x}", "/metrics}", "metrics"] {
            match build_router(file_state(path)) {
                Err(Error::InvalidTelemetryPath { path: rejected, .. }) => {
                    assert_eq!(rejected, path)
                }
                Err(other) => panic!("Expected InvalidTelemetryPath for {path}, got {other:?}"),
                Ok(_) => panic!("Expected {path} to be rejected"),
            }
        }
    }

    #[test]
    fn test_router_accepts_literal_paths() {
        for path in ["/", "/metrics", "/gpu/metrics", "/a:b", "/metrics.txt"] {
            assert!(build_router(file_state(path)).is_ok(), "{path}");
        }
    }

    #[test]
    fn test_cli_path_with_colon_is_an_error() {
        let args = Cli::parse_from(["nvidia-smi-exporter", "--web.telemetry-path", ":metrics"]);
        let state = ExporterState::new(build_source(&args), args.normalized_telemetry_path());
        assert!(matches!(
            build_router(state),
            Err(Error::InvalidTelemetryPath { .. })
        ));
    }

    #[tokio::test]
    async fn test_bind_falls_back_to_next_candidate() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken_addr = taken.local_addr().unwrap().to_string();

        let candidates = vec![taken_addr.clone(), "127.0.0.1:0".to_string()];
        let listener = bind_listener(":0", &candidates).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().to_string(), taken_addr);
    }

    #[tokio::test]
    async fn test_bind_reports_last_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken_addr = taken.local_addr().unwrap().to_string();

        match bind_listener(&taken_addr, &[taken_addr.clone()]).await {
            Err(Error::Bind { address, .. }) => assert_eq!(address, taken_addr),
            Err(other) => panic!("Expected Bind error, got {other:?}"),
            Ok(_) => panic!("Expected the taken address to fail"),
        }
    }
}
