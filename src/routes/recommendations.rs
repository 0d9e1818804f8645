use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{AccountId, AccountRef, RecommendationParams, RecommendedAccount},
    routes::AppState,
};

/// Header carrying the authenticated account id, set by the auth proxy
pub const ACCOUNT_ID_HEADER: &str = "x-account-id";

/// Handler for `GET /users/recommendation?limit=&offset=`
pub async fn recommend_query(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Query(params): Query<RecommendationParams>,
) -> AppResult<Json<Vec<RecommendedAccount>>> {
    recommend(&state, &request_id, &headers, params).await
}

/// Handler for `POST /users/recommendation` with a JSON body
pub async fn recommend_body(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(params): Json<RecommendationParams>,
) -> AppResult<Json<Vec<RecommendedAccount>>> {
    recommend(&state, &request_id, &headers, params).await
}

async fn recommend(
    state: &AppState,
    request_id: &RequestId,
    headers: &HeaderMap,
    params: RecommendationParams,
) -> AppResult<Json<Vec<RecommendedAccount>>> {
    let requester = load_requester(state, headers).await?;
    let request = params.into_request(requester)?;

    tracing::info!(
        request_id = %request_id,
        signed_in = request.requester.is_some(),
        limit = request.limit,
        offset = request.offset,
        "Processing recommendation request"
    );

    let recommendations = state.recommender.recommend(&request).await?;
    Ok(Json(recommendations))
}

/// Resolves the `x-account-id` header; absent means anonymous
async fn load_requester(state: &AppState, headers: &HeaderMap) -> AppResult<Option<AccountRef>> {
    let Some(value) = headers.get(ACCOUNT_ID_HEADER) else {
        return Ok(None);
    };

    let id = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("malformed account header".to_string()))?;

    let account = state
        .directory
        .find_by_id(&AccountId::new(id))
        .await?
        .ok_or_else(|| AppError::Unauthorized(format!("unknown account {}", id)))?;

    Ok(Some(AccountRef::from(&account)))
}
