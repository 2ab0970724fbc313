//! HTTP surface: `POST /api/chat` plus a health probe.

use std::convert::Infallible;

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::RelayError;
use crate::relay::{ChatRequest, Relay};

#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Relay the conversation upstream and stream the reply back as SSE.
///
/// An upstream rejection before streaming starts passes its status through
/// with `{"error": <upstream body>}`. Once streaming starts the response is
/// always a well-formed event stream terminated by `data: [DONE]`.
async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    match state.relay.stream(request).await {
        Ok(events) => {
            let frames = events
                .map(|event| {
                    Ok::<Event, Infallible>(Event::default().data(event.to_json().to_string()))
                })
                .chain(futures::stream::once(async {
                    Ok::<Event, Infallible>(Event::default().data("[DONE]"))
                }));

            let mut response = Sse::new(frames).into_response();
            let headers = response.headers_mut();
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
            response
        }
        Err(RelayError::Api { status, message }) => {
            let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (code, Json(serde_json::json!({ "error": message }))).into_response()
        }
        Err(err) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}
