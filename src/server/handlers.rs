use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::geo::{CityEntry, Coordinate};
use crate::location::AddressSummary;

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

fn validate(lat: Option<f64>, lon: Option<f64>) -> Result<Coordinate, ApiError> {
    let (Some(lat), Some(lon)) = (lat, lon) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "Provide 'lat' and 'lon' parameters"));
    };
    let at = Coordinate::new(lat, lon);
    if !at.is_valid() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Invalid coordinates. Lat: -90..90, Lon: -180..180",
        ));
    }
    Ok(at)
}

// ─── GET /api/reverse ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ReverseQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub lang: Option<String>,
}

pub async fn reverse(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReverseQuery>,
) -> Result<Json<AddressSummary>, ApiError> {
    let start = Instant::now();
    let at = validate(params.lat, params.lon)?;
    let lang = params.lang.clone();

    // Geocoders block on the network; keep them off the async workers.
    let resolved = tokio::task::spawn_blocking(move || {
        state.resolver.resolve(at.lat, at.lon, lang.as_deref()).map(|a| a.summary())
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let summary = resolved.ok_or_else(|| api_error(StatusCode::NOT_FOUND, "No address found"))?;

    info!(
        "GET /api/reverse lat={} lon={} -> {} [{}] ({:.1}ms)",
        at.lat,
        at.lon,
        summary.formatted,
        summary.source,
        start.elapsed().as_secs_f64() * 1000.0,
    );
    Ok(Json(summary))
}

// ─── GET /api/elevation ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct ElevationQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Serialize)]
pub struct ElevationResponse {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
}

pub async fn elevation(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ElevationQuery>,
) -> Result<Json<ElevationResponse>, ApiError> {
    let at = validate(params.lat, params.lon)?;

    let elevation = tokio::task::spawn_blocking(move || {
        state.resolver.resolve_elevation(at.lat, at.lon)
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ElevationResponse { lat: at.lat, lon: at.lon, elevation }))
}

// ─── GET /api/cities ─────────────────────────────────────────────

pub async fn city_list(State(state): State<Arc<AppState>>) -> Json<Vec<CityEntry>> {
    Json(state.cities.entries())
}
