use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json,
    body::to_bytes,
    extract::{ConnectInfo, Request, State},
};
use ballot::payloads::{Reply, Results};
use tracing::info;

use crate::{
    error::AppError,
    results::get_results,
    state::AppState,
    utils::{client_identity, get_option_id_from_body, is_json},
    vote::cast_vote,
};

pub const MAX_BODY_BYTES: usize = 16 * 1024;
pub const VOTE_REGISTERED: &str = "Voto registrado";

pub async fn results_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Results>, AppError> {
    let snapshot = get_results(&state.database)
        .await
        .map_err(AppError::Results)?;

    Ok(Json(snapshot.into()))
}

pub async fn vote_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Reply>, AppError> {
    let (parts, body) = request.into_parts();

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| *address);
    let identity = client_identity(&parts.headers, peer);

    if !is_json(&parts.headers) {
        return Err(AppError::MalformedPayload);
    }

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| AppError::MalformedPayload)?;
    let option_id = get_option_id_from_body(&body)?;

    let receipt = cast_vote(&state.database, state.option_count, option_id, identity).await?;
    info!("Vote for option {} at {}", receipt.option_id, receipt.voted_at);

    Ok(Json(Reply::accepted(VOTE_REGISTERED)))
}
