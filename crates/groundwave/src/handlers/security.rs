//! the security page: sessions and sensitive access.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{Html, Redirect},
};
use chrono::{DateTime, Duration, Utc};
use groundwave_db::Database;
use serde::{Deserialize, Serialize};
use tracing::info;
use webauthn_rs::prelude::{PublicKeyCredential, RequestChallengeResponse};

use super::pages;
use super::webauthn::verify_assertion;
use super::{ApiError, ResultExt};
use crate::AppState;
use crate::auth::{Ceremony, sensitive_active};
use crate::session::{CurrentSession, CurrentUser};

#[derive(Debug, Default, Deserialize)]
pub struct SecurityQuery {
    #[serde(default)]
    pub unlock: Option<String>,
}

/// GET /security
pub async fn security_page(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    CurrentUser(user): CurrentUser,
    Query(query): Query<SecurityQuery>,
) -> Result<Html<String>, ApiError> {
    let now = Utc::now();
    let sessions = state.db.list_user_sessions(user.id, now).await?;
    let expires = session.sensitive_expires_at.filter(|at| *at > now);
    Ok(pages::security(
        &sessions,
        &session.id,
        expires,
        query.unlock.is_some(),
    ))
}

/// POST /security/sessions/{id}/revoke
///
/// sessions of other users look the same as missing ones.
pub async fn revoke_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Redirect, ApiError> {
    let target = state
        .db
        .get_session(&id)
        .await?
        .filter(|s| s.user_id == Some(user.id))
        .ok_or_else(|| ApiError::not_found("session not found"))?;
    state.db.delete_session(&target.id).await?;
    info!(user_id = %user.id, "session revoked");
    Ok(Redirect::to("/security"))
}

/// POST /security/sessions/revoke-others
pub async fn revoke_other_sessions(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    CurrentUser(user): CurrentUser,
) -> Result<Redirect, ApiError> {
    let removed = state
        .db
        .delete_user_sessions_except(user.id, &session.id)
        .await?;
    info!(user_id = %user.id, removed, "other sessions revoked");
    Ok(Redirect::to("/security"))
}

/// POST /sensitive/unlock/start
pub async fn unlock_start(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    CurrentUser(user): CurrentUser,
) -> Result<Json<RequestChallengeResponse>, ApiError> {
    let passkeys = state
        .db
        .list_passkeys(user.id)
        .await?
        .iter()
        .map(|r| serde_json::from_str(&r.credential).map_internal())
        .collect::<Result<Vec<_>, _>>()?;
    if passkeys.is_empty() {
        return Err(ApiError::conflict("no passkeys are registered"));
    }

    let (challenge, auth) = state
        .webauthn
        .start_passkey_authentication(&passkeys)
        .map_internal()?;
    session.ceremony = Some(Ceremony::Unlock { state: auth }.encode()?);
    state.db.save_session(&session).await?;
    Ok(Json(challenge))
}

#[derive(Debug, Serialize)]
pub struct SensitiveStatus {
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// POST /sensitive/unlock/finish
pub async fn unlock_finish(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    CurrentUser(user): CurrentUser,
    Json(credential): Json<PublicKeyCredential>,
) -> Result<Json<SensitiveStatus>, ApiError> {
    let raw = session
        .ceremony
        .take()
        .ok_or_else(|| ApiError::bad_request("no unlock in progress"))?;
    state.db.save_session(&session).await?;
    let Ceremony::Unlock { state: auth } = Ceremony::decode(&raw)? else {
        return Err(ApiError::bad_request("no unlock in progress"));
    };

    verify_assertion(&state, &credential, &auth, Some(user.id)).await?;

    let expires_at = Utc::now() + Duration::seconds(state.config.sensitive.duration_secs as i64);
    session.sensitive_expires_at = Some(expires_at);
    state.db.save_session(&session).await?;

    info!(user_id = %user.id, %expires_at, "sensitive access unlocked");
    Ok(Json(SensitiveStatus {
        active: true,
        expires_at: Some(expires_at),
    }))
}

/// POST /sensitive/lock
pub async fn lock(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    CurrentUser(user): CurrentUser,
) -> Result<Redirect, ApiError> {
    session.sensitive_expires_at = None;
    session.break_glass_profile_ids.clear();
    session.break_glass_expires_at = None;
    state.db.save_session(&session).await?;
    info!(user_id = %user.id, "sensitive access locked");
    Ok(Redirect::to("/security"))
}

/// GET /sensitive/status
pub async fn status(CurrentSession(session): CurrentSession) -> Json<SensitiveStatus> {
    let now = Utc::now();
    let active = sensitive_active(&session, now);
    Json(SensitiveStatus {
        active,
        expires_at: session.sensitive_expires_at.filter(|_| active),
    })
}
