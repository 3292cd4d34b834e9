//! Push-update HTTP server.
//!
//! `GET /api/events` streams every snapshot as a Server-Sent Event named
//! `results-update`; `GET /api/results` returns the latest snapshot.

use super::cache::SnapshotCache;
use crate::models::AggregatedResult;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

/// Name of the event carrying a full snapshot.
pub const RESULTS_EVENT: &str = "results-update";

/// Shared server state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub cache: SnapshotCache,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    has_data: bool,
}

#[derive(Debug, Serialize)]
struct AwaitingResponse {
    status: &'static str,
}

/// Build the router.
pub fn router(cache: SnapshotCache) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/results", get(latest_results))
        .route("/api/events", get(event_stream))
        .with_state(AppState { cache })
}

/// Serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, cache: SnapshotCache) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Live feed listening on http://{}", addr);

    axum::serve(listener, router(cache))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down live feed");
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        has_data: state.cache.has_data(),
    })
}

async fn latest_results(State(state): State<AppState>) -> Response {
    match state.cache.get() {
        Some(result) => Json(AggregatedResult::clone(&result)).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(AwaitingResponse {
                status: "awaiting_data",
            }),
        )
            .into_response(),
    }
}

/// SSE endpoint. New subscribers receive the current snapshot first.
async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.cache.subscribe()).filter_map(|snapshot| {
        let result = snapshot?;
        match Event::default().event(RESULTS_EVENT).json_data(&*result) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!("Failed to encode snapshot: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{aggregate_str, AggregateOptions};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const SAMPLE: &str = include_str!("../../fixtures/sample_results.ndjson");

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_results_awaiting_data() {
        let response = router(SnapshotCache::new())
            .oneshot(get_request("/api/results"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["status"], "awaiting_data");
    }

    #[tokio::test]
    async fn test_results_returns_snapshot() {
        let cache = SnapshotCache::new();
        cache.set(aggregate_str(SAMPLE, AggregateOptions::default()));

        let response = router(cache)
            .oneshot(get_request("/api/results"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["rootInfo"]["maxVirtualUsers"], 5);
        assert_eq!(json["metrics"]["http_reqs"]["values"]["count"], 4.0);
        assert_eq!(json["erroredUrls"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(SnapshotCache::new())
            .oneshot(get_request("/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["has_data"], false);
    }

    #[tokio::test]
    async fn test_event_stream_sends_current_snapshot() {
        let cache = SnapshotCache::new();
        cache.set(aggregate_str(SAMPLE, AggregateOptions::default()));

        let response = router(cache)
            .oneshot(get_request("/api/events"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body().into_data_stream();
        let frame = body.next().await.unwrap().unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();

        assert!(text.starts_with("event: results-update\n"));
        assert!(text.contains("\"iterationCount\":2"));
    }
}
