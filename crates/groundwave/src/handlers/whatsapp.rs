//! whatsapp link management.

use axum::{Json, extract::State};
use groundwave_whatsapp::{StatusSnapshot, WhatsAppClient, WhatsAppError};
use tracing::warn;

use super::ApiError;
use crate::AppState;

fn client(state: &AppState) -> Result<&WhatsAppClient, ApiError> {
    state
        .whatsapp
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("whatsapp is not enabled"))
}

fn link_error(e: WhatsAppError) -> ApiError {
    match e {
        WhatsAppError::NoSession => ApiError::conflict(e.to_string()),
        WhatsAppError::Transport(_) | WhatsAppError::WebSocket(_) => {
            warn!(error = %e, "whatsapp bridge unavailable");
            ApiError::unavailable("whatsapp bridge unavailable")
        }
        other => ApiError::internal(other),
    }
}

/// GET /whatsapp/status
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusSnapshot>, ApiError> {
    Ok(Json(client(&state)?.snapshot().await))
}

/// POST /whatsapp/connect
///
/// an unpaired device starts pairing; poll the status for the qr code.
pub async fn connect(State(state): State<AppState>) -> Result<Json<StatusSnapshot>, ApiError> {
    let client = client(&state)?;
    client.connect().await.map_err(link_error)?;
    Ok(Json(client.snapshot().await))
}

/// POST /whatsapp/disconnect
pub async fn disconnect(State(state): State<AppState>) -> Result<Json<StatusSnapshot>, ApiError> {
    let client = client(&state)?;
    client.disconnect().await;
    Ok(Json(client.snapshot().await))
}

/// POST /whatsapp/logout
pub async fn logout(State(state): State<AppState>) -> Result<Json<StatusSnapshot>, ApiError> {
    let client = client(&state)?;
    client.logout().await.map_err(link_error)?;
    Ok(Json(client.snapshot().await))
}
