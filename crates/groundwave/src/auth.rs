//! passkey authentication and sensitive access.
//!
//! two independent axes gate a request: whether a user is signed in, and
//! whether the session currently holds sensitive access (a short window
//! opened by a fresh passkey assertion). health routes additionally accept
//! a break-glass grant scoped to specific profiles.

use axum::{
    extract::{Path, Request},
    http::Method,
    middleware::Next,
    response::Response,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use groundwave_db::SessionRecord;
use groundwave_types::Config;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use webauthn_rs::prelude::{
    CredentialID, PasskeyAuthentication, PasskeyRegistration, Webauthn, WebauthnBuilder,
    WebauthnError,
};

use crate::handlers::ApiError;
use crate::session::{CurrentSession, CurrentUser};

/// errors building the relying party.
#[derive(Debug, Error)]
pub enum RelyingPartyError {
    /// base url or overrides do not yield an id and origin
    #[error(transparent)]
    Config(#[from] groundwave_types::Error),

    #[error("relying party {rp_id} rejected for origin {origin}: {source}")]
    Rejected {
        rp_id: String,
        origin: String,
        source: WebauthnError,
    },
}

/// build the relying party from the configured base url.
pub fn build_webauthn(config: &Config) -> Result<Webauthn, RelyingPartyError> {
    let rp_id = config.rp_id()?;
    let rp_origin = config.rp_origin()?;
    let rejected = |source: WebauthnError| RelyingPartyError::Rejected {
        rp_id: rp_id.clone(),
        origin: rp_origin.to_string(),
        source,
    };
    WebauthnBuilder::new(&rp_id, &rp_origin)
        .map_err(rejected)?
        .rp_name(&config.webauthn.rp_name)
        .build()
        .map_err(rejected)
}

/// base64url form of a credential id, as stored.
pub fn credential_key(id: &CredentialID) -> String {
    let bytes: &[u8] = id.as_ref();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// whether an assertion's signature counter is acceptable.
///
/// authenticators that never count report zero forever; everything else
/// must strictly increase.
pub fn sign_count_ok(stored: u32, received: u32) -> bool {
    received > stored || (stored == 0 && received == 0)
}

/// a user that exists only until their first passkey is registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingUser {
    pub handle: Uuid,
    pub display_name: String,
}

/// webauthn state held in the session between start and finish.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ceremony {
    Setup {
        user: PendingUser,
        state: PasskeyRegistration,
    },
    Invite {
        invite_id: u64,
        user: PendingUser,
        state: PasskeyRegistration,
    },
    AddPasskey {
        name: String,
        state: PasskeyRegistration,
    },
    Login {
        state: PasskeyAuthentication,
    },
    Unlock {
        state: PasskeyAuthentication,
    },
}

impl Ceremony {
    pub fn encode(&self) -> Result<String, ApiError> {
        serde_json::to_string(self).map_err(ApiError::internal)
    }

    pub fn decode(raw: &str) -> Result<Self, ApiError> {
        serde_json::from_str(raw).map_err(|_| ApiError::bad_request("invalid ceremony state"))
    }
}

/// whether global sensitive access is open.
pub fn sensitive_active(session: &SessionRecord, now: DateTime<Utc>) -> bool {
    session.sensitive_expires_at.is_some_and(|at| at > now)
}

/// whether the session may read health profile `profile_id`.
pub fn health_access_allowed(session: &SessionRecord, profile_id: u64, now: DateTime<Utc>) -> bool {
    if sensitive_active(session, now) {
        return true;
    }
    session.break_glass_profile_ids.contains(&profile_id)
        && session.break_glass_expires_at.is_some_and(|at| at > now)
}

/// how a rejected request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// a page the browser navigates to: redirect
    Page,
    /// an api call or form post: status code
    Api,
}

impl RouteClass {
    pub fn of(req: &Request) -> Self {
        let navigates = matches!(*req.method(), Method::GET | Method::HEAD);
        let wants_json = req
            .headers()
            .get(axum::http::header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json") || v.contains("text/event-stream"));
        if navigates && !wants_json {
            RouteClass::Page
        } else {
            RouteClass::Api
        }
    }
}

fn unauthenticated(class: RouteClass) -> ApiError {
    match class {
        RouteClass::Page => ApiError::login(),
        RouteClass::Api => ApiError::unauthorized("authentication required"),
    }
}

fn locked(class: RouteClass) -> ApiError {
    match class {
        RouteClass::Page => ApiError::Redirect("/security?unlock=1".to_string()),
        RouteClass::Api => ApiError::forbidden("sensitive access required"),
    }
}

fn session_of(req: &Request) -> Result<&SessionRecord, ApiError> {
    req.extensions()
        .get::<CurrentSession>()
        .map(|CurrentSession(s)| s)
        .ok_or_else(|| ApiError::internal("session layer not installed"))
}

/// reject requests without a signed-in user.
pub async fn require_auth(req: Request, next: Next) -> Result<Response, ApiError> {
    if req.extensions().get::<CurrentUser>().is_none() {
        return Err(unauthenticated(RouteClass::of(&req)));
    }
    Ok(next.run(req).await)
}

/// reject requests whose user is not an admin.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    match req.extensions().get::<CurrentUser>() {
        None => Err(unauthenticated(RouteClass::of(&req))),
        Some(CurrentUser(user)) if !user.is_admin => {
            Err(ApiError::forbidden("administrator access required"))
        }
        Some(_) => Ok(next.run(req).await),
    }
}

/// reject requests while sensitive access is closed.
pub async fn require_sensitive_access(req: Request, next: Next) -> Result<Response, ApiError> {
    let class = RouteClass::of(&req);
    if req.extensions().get::<CurrentUser>().is_none() {
        return Err(unauthenticated(class));
    }
    if !sensitive_active(session_of(&req)?, Utc::now()) {
        return Err(locked(class));
    }
    Ok(next.run(req).await)
}

/// like [`require_sensitive_access`], also accepting a break-glass grant
/// for the requested profile.
pub async fn require_sensitive_access_for_health(
    Path(profile_id): Path<u64>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let class = RouteClass::of(&req);
    if req.extensions().get::<CurrentUser>().is_none() {
        return Err(unauthenticated(class));
    }
    if !health_access_allowed(session_of(&req)?, profile_id, Utc::now()) {
        return Err(locked(class));
    }
    Ok(next.run(req).await)
}
