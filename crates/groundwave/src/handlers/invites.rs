//! invite administration.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use groundwave_db::Database;
use groundwave_types::{Invite, InviteId, InviteToken, Role};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ApiError;
use crate::AppState;
use crate::session::CurrentUser;

/// an invite with its signup url.
#[derive(Debug, Serialize)]
pub struct InviteView {
    pub id: InviteId,
    pub token: String,
    pub url: String,
    pub target_role: Role,
    pub created_at: DateTime<Utc>,
    pub consumed: bool,
}

impl InviteView {
    fn new(invite: &Invite, base_url: &str) -> Self {
        Self {
            id: invite.id,
            token: invite.token.as_str().to_string(),
            url: invite_url(base_url, invite.token.as_str()),
            target_role: invite.target_role,
            created_at: invite.created_at,
            consumed: invite.is_consumed(),
        }
    }
}

/// the signup url for `token`.
pub fn invite_url(base_url: &str, token: &str) -> String {
    format!("{}/invite/{}", base_url.trim_end_matches('/'), token)
}

/// GET /admin/invites
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<InviteView>>, ApiError> {
    let invites = state.db.list_invites().await?;
    Ok(Json(
        invites
            .iter()
            .map(|i| InviteView::new(i, &state.config.base_url))
            .collect(),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateInviteRequest {
    pub role: Role,
}

/// POST /admin/invites
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateInviteRequest>,
) -> Result<(StatusCode, Json<InviteView>), ApiError> {
    let invite = Invite {
        id: InviteId(0),
        token: InviteToken::generate(),
        created_by: user.id,
        target_role: req.role,
        created_at: Utc::now(),
        consumed_at: None,
        consumed_by: None,
    };
    let invite = state.db.create_invite(&invite).await?;
    info!(invite_id = %invite.id, role = %invite.target_role, created_by = %user.id, "invite created");
    Ok((
        StatusCode::CREATED,
        Json(InviteView::new(&invite, &state.config.base_url)),
    ))
}

/// POST /admin/invites/{id}/regenerate
///
/// the old link stops working.
pub async fn regenerate(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<InviteView>, ApiError> {
    let invite = state
        .db
        .regenerate_invite(InviteId(id), &InviteToken::generate())
        .await?;
    info!(invite_id = %invite.id, "invite token regenerated");
    Ok(Json(InviteView::new(&invite, &state.config.base_url)))
}

/// POST /admin/invites/{id}/delete
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state.db.delete_invite(InviteId(id)).await?;
    info!(invite_id = id, "invite deleted");
    Ok(StatusCode::NO_CONTENT)
}
