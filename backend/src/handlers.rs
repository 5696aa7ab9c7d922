// Handlers for the session API: thin JSON wrappers over `Session`.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::error::HalfwayError;
use crate::models::{
    ApiError, Coordinate, GeocodeOriginRequest, Origin, SessionSnapshot, SetOriginRequest,
    UpdateSearchRequest,
};
use crate::AppState;

type ApiResult = Result<Json<SessionSnapshot>, (StatusCode, Json<ApiError>)>;

/// GET /api/session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

/// PUT /api/origins/:slot
pub async fn set_origin(
    State(state): State<AppState>,
    Path(slot): Path<usize>,
    Json(req): Json<SetOriginRequest>,
) -> ApiResult {
    let origin = Origin::new(req.name, Coordinate::new(req.lat, req.lon), req.source);
    state
        .session
        .set_origin(slot, origin)
        .await
        .map(Json)
        .map_err(to_api_error)
}

/// POST /api/origins/:slot/geocode
pub async fn geocode_origin(
    State(state): State<AppState>,
    Path(slot): Path<usize>,
    Json(req): Json<GeocodeOriginRequest>,
) -> ApiResult {
    state
        .session
        .set_origin_from_address(slot, &req.address)
        .await
        .map(Json)
        .map_err(to_api_error)
}

/// DELETE /api/origins/:slot
pub async fn clear_origin(State(state): State<AppState>, Path(slot): Path<usize>) -> ApiResult {
    state
        .session
        .clear_origin(slot)
        .await
        .map(Json)
        .map_err(to_api_error)
}

/// PUT /api/search
pub async fn update_search(
    State(state): State<AppState>,
    Json(req): Json<UpdateSearchRequest>,
) -> ApiResult {
    state
        .session
        .update_search(req)
        .await
        .map(Json)
        .map_err(to_api_error)
}

/// POST /api/search/expand
pub async fn expand_radius(State(state): State<AppState>) -> ApiResult {
    state
        .session
        .expand_radius()
        .await
        .map(Json)
        .map_err(to_api_error)
}

/// GET /api/health
pub async fn health() -> &'static str {
    "ok"
}

fn to_api_error(err: HalfwayError) -> (StatusCode, Json<ApiError>) {
    let status = match err {
        HalfwayError::InvalidSlot { .. } | HalfwayError::InvalidParameter(_) => {
            StatusCode::BAD_REQUEST
        }
        HalfwayError::GeocodeFailed { .. } | HalfwayError::NoResultsFound { .. } => {
            StatusCode::NOT_FOUND
        }
        HalfwayError::SearchBackendUnavailable { .. }
        | HalfwayError::DirectionsUnavailable { .. }
        | HalfwayError::StaleResult { .. }
        | HalfwayError::Geodesy(_)
        | HalfwayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
