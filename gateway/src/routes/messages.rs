use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::routes::rejection_status;
use crate::state::SharedState;

/// Request body for `POST /messages`.
///
/// The client submits the message in its canonical wire form, already
/// signed by the sender. The gateway never signs on behalf of clients.
#[derive(Debug, Deserialize)]
pub struct SubmitMessageRequest {
    /// Canonical wire encoding of the signed message.
    pub message: String,
}

/// Response body for `POST /messages`.
#[derive(Debug, Serialize)]
pub struct SubmitMessageResponse {
    pub status: &'static str,
    /// Content hash of the queued message, as 64 hex digits.
    pub id: String,
}

/// Response body for `GET /messages/pending`.
#[derive(Debug, Serialize)]
pub struct PendingMessagesResponse {
    pub pending: usize,
}

/// `POST /messages`
///
/// Verifies a signed message and queues it for inclusion in a future
/// block. Rejections carry the reason as plain text.
pub async fn submit_message(
    State(state): State<SharedState>,
    Json(body): Json<SubmitMessageRequest>,
) -> Result<(StatusCode, Json<SubmitMessageResponse>), (StatusCode, String)> {
    match state.engine.ingest_message(&body.message) {
        Ok(id) => {
            state.metrics.chain.messages_accepted.inc();
            Ok((
                StatusCode::ACCEPTED,
                Json(SubmitMessageResponse {
                    status: "queued",
                    id: id.to_hex(),
                }),
            ))
        }
        Err(e) => {
            state
                .metrics
                .chain
                .messages_rejected
                .with_label_values(&[e.as_str()])
                .inc();
            Err((rejection_status(e), e.to_string()))
        }
    }
}

/// `GET /messages/pending`
///
/// Returns the number of messages currently waiting in the queue.
pub async fn pending_messages(
    State(state): State<SharedState>,
) -> (StatusCode, Json<PendingMessagesResponse>) {
    (
        StatusCode::OK,
        Json(PendingMessagesResponse {
            pending: state.engine.pending_message_count(),
        }),
    )
}
