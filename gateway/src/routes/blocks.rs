use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::routes::rejection_status;
use crate::state::SharedState;

/// Request body for `POST /blocks`.
#[derive(Debug, Deserialize)]
pub struct SubmitBlockRequest {
    /// Canonical wire encoding of the block.
    pub block: String,
}

/// Response body for `POST /blocks`.
#[derive(Debug, Serialize)]
pub struct SubmitBlockResponse {
    pub status: &'static str,
    /// Content hash of the accepted block, as 64 hex digits.
    pub hash: String,
}

/// Query parameters for `GET /blocks`.
#[derive(Debug, Deserialize)]
pub struct BlocksQuery {
    /// Only return blocks with a timestamp strictly greater than this.
    #[serde(default)]
    pub since: u64,
}

/// Response body for `GET /blocks`.
#[derive(Debug, Serialize)]
pub struct BlocksResponse {
    pub blocks: Vec<String>,
}

/// Response body for `GET /blocks/mined`.
#[derive(Debug, Serialize)]
pub struct MinedBlockResponse {
    /// Wire encoding of the latest self-mined block, if one is waiting.
    pub block: Option<String>,
}

/// `POST /blocks`
///
/// Ingests a peer block in wire form: validated, linked into the tree,
/// and persisted on acceptance. Rejections carry the reason as plain text.
pub async fn submit_block(
    State(state): State<SharedState>,
    Json(body): Json<SubmitBlockRequest>,
) -> Result<(StatusCode, Json<SubmitBlockResponse>), (StatusCode, String)> {
    let start = std::time::Instant::now();
    match state.engine.ingest_block(&body.block) {
        Ok(hash) => {
            state.metrics.chain.blocks_accepted.inc();
            state
                .metrics
                .chain
                .block_ingest_seconds
                .observe(start.elapsed().as_secs_f64());
            Ok((
                StatusCode::ACCEPTED,
                Json(SubmitBlockResponse {
                    status: "accepted",
                    hash: hash.to_hex(),
                }),
            ))
        }
        Err(e) => {
            state
                .metrics
                .chain
                .blocks_rejected
                .with_label_values(&[e.as_str()])
                .inc();
            Err((rejection_status(e), e.to_string()))
        }
    }
}

/// `GET /blocks?since=<timestamp>`
///
/// Returns the wire form of every known block newer than `since`, across
/// all branches, shallowest first. Peers use this to catch up after
/// downtime.
pub async fn list_blocks(
    State(state): State<SharedState>,
    Query(query): Query<BlocksQuery>,
) -> (StatusCode, Json<BlocksResponse>) {
    (
        StatusCode::OK,
        Json(BlocksResponse {
            blocks: state.engine.all_blocks_since(query.since),
        }),
    )
}

/// `GET /blocks/mined`
///
/// Drains the latest self-mined block, if any. Each mined block is handed
/// out exactly once; the polling peer is expected to broadcast it onwards.
pub async fn mined_block(
    State(state): State<SharedState>,
) -> (StatusCode, Json<MinedBlockResponse>) {
    (
        StatusCode::OK,
        Json(MinedBlockResponse {
            block: state.engine.take_newly_mined_block(),
        }),
    )
}

/// `GET /blocks/tree.dot`
///
/// Graphviz rendering of the current block tree, for debugging.
pub async fn tree_dot(State(state): State<SharedState>) -> String {
    state.engine.tree_dot()
}
