//! health profile gate.
//!
//! only the access rules live here; profile data is not served yet.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Duration, Utc};
use groundwave_db::Database;
use serde::Serialize;
use tracing::info;

use super::ApiError;
use crate::AppState;
use crate::session::{CurrentSession, CurrentUser};

#[derive(Debug, Serialize)]
pub struct BreakGlassResponse {
    pub profile_ids: Vec<u64>,
    pub expires_at: DateTime<Utc>,
}

/// POST /health/break-glass/{profile_id}
///
/// adds the profile to the session's grant and restarts the window.
pub async fn break_glass(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    CurrentUser(user): CurrentUser,
    Path(profile_id): Path<u64>,
) -> Result<Json<BreakGlassResponse>, ApiError> {
    let now = Utc::now();
    if session.break_glass_expires_at.is_none_or(|at| at <= now) {
        // an expired grant does not carry over
        session.break_glass_profile_ids.clear();
    }
    session.break_glass_profile_ids.insert(profile_id);
    let expires_at = now + Duration::seconds(state.config.sensitive.break_glass_secs as i64);
    session.break_glass_expires_at = Some(expires_at);
    state.db.save_session(&session).await?;

    info!(user_id = %user.id, profile_id, %expires_at, "break-glass access granted");
    Ok(Json(BreakGlassResponse {
        profile_ids: session.break_glass_profile_ids.iter().copied().collect(),
        expires_at,
    }))
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile_id: u64,
}

/// GET /health/profiles/{profile_id}
pub async fn profile(Path(profile_id): Path<u64>) -> Json<ProfileResponse> {
    Json(ProfileResponse { profile_id })
}
