//! HTTP route handlers.

use axum::http::StatusCode;

use ledger::IngestError;

pub mod blocks;
pub mod health;
pub mod messages;

/// Maps a rejection to an HTTP status: duplicates conflict, a ledger write
/// failure is the node's fault, everything else is a bad request.
pub(crate) fn rejection_status(err: IngestError) -> StatusCode {
    match err {
        IngestError::DuplicateBlock | IngestError::DuplicateMessage => StatusCode::CONFLICT,
        IngestError::LedgerAppend => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}
