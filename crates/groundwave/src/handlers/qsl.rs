//! amateur radio logbook: adif import/export and qsl maps.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderName, StatusCode, header},
    response::IntoResponse,
};
use groundwave_adif::{Qso, parse_bytes, write_adif};
use groundwave_db::{Database, QsoImport};
use groundwave_gridmap::{GridMapError, MapOptions, locator_distance_km, render_png};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ApiError, ResultExt};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub parsed: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// POST /qsl/import
///
/// the body is an adif document. malformed records are skipped by the
/// parser, duplicates (same call and start time) by the database.
pub async fn import(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ImportResponse>, ApiError> {
    let qsos = parse_bytes(&body);
    let QsoImport { inserted, skipped } = state.db.import_qsos(&qsos).await?;
    info!(parsed = qsos.len(), inserted, skipped, "adif imported");
    Ok(Json(ImportResponse {
        parsed: qsos.len(),
        inserted,
        skipped,
    }))
}

/// GET /qsl
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Qso>>, ApiError> {
    Ok(Json(state.db.list_qsos().await?))
}

/// GET /qsl/export
pub async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let qsos = state.db.list_qsos().await?;
    let mut out = Vec::new();
    write_adif(&qsos, &mut out).map_internal()?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"groundwave.adi\"",
            ),
        ],
        out,
    ))
}

#[derive(Debug, Deserialize)]
pub struct MapQuery {
    pub my: String,
    pub their: String,
    #[serde(default)]
    pub zoom: u8,
}

/// GET /qsl/map?my=&their=
pub async fn map(
    State(state): State<AppState>,
    Query(query): Query<MapQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let options = MapOptions {
        width: state.config.gridmap.width,
        height: state.config.gridmap.height,
        zoom: query.zoom,
    };
    let distance = locator_distance_km(&query.my, &query.their).map_err(map_error)?;
    let png = render_png(&*state.tiles, &query.my, &query.their, options)
        .await
        .map_err(map_error)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (HeaderName::from_static("x-distance-km"), format!("{distance:.0}")),
        ],
        png,
    ))
}

fn map_error(e: GridMapError) -> ApiError {
    match e {
        GridMapError::MyLocator(_)
        | GridMapError::TheirLocator(_)
        | GridMapError::CanvasSize { .. } => ApiError::bad_request(e.to_string()),
        GridMapError::Tile { .. } => {
            warn!(error = %e, "tile fetch failed");
            ApiError::unavailable("map tiles unavailable")
        }
        other => ApiError::internal(other),
    }
}
