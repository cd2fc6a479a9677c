//! Chat-completion HTTP endpoint.
//!
//! Accepts one user message, generates a reply through the injected
//! [`ResponseGenerator`], classifies its emotional tone, and returns
//! both. Internal failures are reported as HTTP 500 with a fixed error
//! body; the caller decides how to surface that to the user.
//!
//! ## Endpoints
//!
//! - `POST /api/chat` takes `{ "message": ... }` and returns
//!   `{ "response": ..., "emotion": neutral|happy|sad|surprised }`

use crate::error::Result;
use crate::llm::ResponseGenerator;
use crate::sentiment;
use crate::state::Emotion;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Chat request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
}

/// Chat success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The assistant reply.
    pub response: String,
    /// Emotional tone of the reply.
    pub emotion: Emotion,
}

/// Chat failure body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable failure description.
    pub error: String,
}

#[derive(Clone)]
struct ChatState {
    generator: Arc<dyn ResponseGenerator>,
}

/// Build the chat router around a generator.
#[must_use]
pub fn router(generator: Arc<dyn ResponseGenerator>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .with_state(ChatState { generator })
}

async fn chat(State(state): State<ChatState>, Json(request): Json<ChatRequest>) -> Response {
    match state.generator.generate(&request.message).await {
        Ok(text) => {
            let emotion = sentiment::classify(&text);
            Json(ChatResponse {
                response: text,
                emotion,
            })
            .into_response()
        }
        Err(e) => {
            error!("chat completion failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to generate response".to_owned(),
                }),
            )
                .into_response()
        }
    }
}

/// Bind `addr` and serve the chat endpoint.
///
/// Returns the bound address (useful with port 0) and the serving task.
///
/// # Errors
///
/// Returns an error if the listener cannot bind.
pub async fn serve(
    addr: &str,
    generator: Arc<dyn ResponseGenerator>,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("chat endpoint listening on {local_addr}");

    let app = router(generator);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("chat server terminated: {e}");
        }
    });
    Ok((local_addr, handle))
}
