//! small unauthenticated endpoints.

use std::fmt::Write as _;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Redirect},
};
use chrono::{Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ApiError;
use crate::AppState;
use crate::pow::{self, PowError};
use crate::session::CurrentUser;

/// GET /
pub async fn root(CurrentUser(user): CurrentUser) -> Redirect {
    if user.is_admin {
        Redirect::to("/zk")
    } else {
        Redirect::to("/security")
    }
}

/// GET /connectivity
pub async fn connectivity() -> &'static str {
    "1"
}

/// GET /.well-known/security.txt
pub async fn security_txt() -> impl IntoResponse {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, "/security.txt")],
    )
}

/// GET /security.txt
///
/// rfc 9116 fields from config; 404 while no contact is configured.
pub async fn security_txt_file(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let cfg = &state.config.security_txt;
    if cfg.contact.is_empty() {
        return Err(ApiError::not_found("security.txt is not configured"));
    }

    let mut body = String::new();
    for contact in &cfg.contact {
        let _ = writeln!(body, "Contact: {contact}");
    }
    let expires = Utc::now() + Duration::days(i64::from(cfg.expires_days));
    let _ = writeln!(
        body,
        "Expires: {}",
        expires.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    if let Some(policy) = &cfg.policy {
        let _ = writeln!(body, "Policy: {policy}");
    }
    if let Some(languages) = &cfg.preferred_languages {
        let _ = writeln!(body, "Preferred-Languages: {languages}");
    }
    let _ = writeln!(
        body,
        "Canonical: {}/.well-known/security.txt",
        state.config.base_url.trim_end_matches('/')
    );

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    ))
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub challenge: String,
    pub difficulty_bits: u32,
}

/// GET /pow/challenge
pub async fn pow_challenge(State(state): State<AppState>) -> Json<ChallengeResponse> {
    Json(ChallengeResponse {
        challenge: pow::issue_challenge(state.csrf_secret(), Utc::now()),
        difficulty_bits: state.config.pow.difficulty_bits,
    })
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub challenge: String,
    pub nonce: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

/// POST /pow/verify
pub async fn pow_verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let ttl = Duration::seconds(state.config.pow.challenge_ttl_secs as i64);
    match pow::verify(
        state.csrf_secret(),
        &req.challenge,
        &req.nonce,
        state.config.pow.difficulty_bits,
        ttl,
        Utc::now(),
    ) {
        Ok(()) => Ok(Json(VerifyResponse { valid: true })),
        Err(PowError::Malformed) => Err(ApiError::bad_request("malformed challenge")),
        Err(e) => {
            debug!(error = %e, "proof of work rejected");
            Ok(Json(VerifyResponse { valid: false }))
        }
    }
}
