//! passkey ceremonies: setup, login, adding passkeys and invite signup.
//!
//! every flow is a start/finish pair. start stores the ceremony state in
//! the session; finish takes it out again before verifying, so a finish
//! can never be replayed.

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use groundwave_db::{Database, PasskeyRecord, Registration, SessionRecord};
use groundwave_types::{Invite, InviteId, Role, User, UserId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use webauthn_rs::prelude::{
    CreationChallengeResponse, Passkey, PasskeyAuthentication, PublicKeyCredential,
    RegisterPublicKeyCredential, RequestChallengeResponse,
};

use super::pages;
use super::{ApiError, OptionExt, ResultExt};
use crate::AppState;
use crate::auth::{Ceremony, PendingUser, credential_key, sign_count_ok};
use crate::session::{CurrentSession, CurrentUser, clear_session_cookie, sign_in};

/// longest accepted display or passkey name.
const MAX_NAME_LEN: usize = 64;

fn clean_name(raw: &str, what: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request(format!("{what} is required")));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "{what} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// remove the pending ceremony from the session and persist that.
async fn take_ceremony(
    state: &AppState,
    session: &mut SessionRecord,
) -> Result<Ceremony, ApiError> {
    let raw = session
        .ceremony
        .take()
        .ok_or_else(|| ApiError::bad_request("no passkey ceremony in progress"))?;
    state.db.save_session(session).await?;
    Ceremony::decode(&raw)
}

async fn store_ceremony(
    state: &AppState,
    session: &mut SessionRecord,
    ceremony: Ceremony,
) -> Result<(), ApiError> {
    session.ceremony = Some(ceremony.encode()?);
    state.db.save_session(session).await?;
    Ok(())
}

/// sign the session in as `user_id` and answer with the rotated cookie.
async fn finish_sign_in(
    state: &AppState,
    session: &mut SessionRecord,
    user_id: UserId,
) -> Result<Response, ApiError> {
    let cookie = sign_in(state, session, user_id).await?;
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(FinishResponse {
            user_id,
            redirect: "/",
        }),
    )
        .into_response())
}

fn new_passkey_record(
    passkey: &Passkey,
    credential: &RegisterPublicKeyCredential,
    user_id: UserId,
    name: &str,
) -> Result<PasskeyRecord, ApiError> {
    let transports = credential
        .response
        .transports
        .iter()
        .flatten()
        .filter_map(|t| serde_json::to_value(t).ok())
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    Ok(PasskeyRecord {
        id: 0,
        user_id,
        credential_id: credential_key(passkey.cred_id()),
        credential: serde_json::to_string(passkey).map_internal()?,
        sign_count: 0,
        transports,
        name: name.to_string(),
        created_at: Utc::now(),
        last_used_at: None,
    })
}

fn decode_passkeys(records: &[PasskeyRecord]) -> Result<Vec<Passkey>, ApiError> {
    records
        .iter()
        .map(|r| serde_json::from_str(&r.credential).map_internal())
        .collect()
}

/// verify an assertion and record the use of the passkey.
///
/// with `owner` set, the passkey must belong to that user.
pub(crate) async fn verify_assertion(
    state: &AppState,
    credential: &PublicKeyCredential,
    auth: &PasskeyAuthentication,
    owner: Option<UserId>,
) -> Result<PasskeyRecord, ApiError> {
    let rejected = || ApiError::unauthorized("passkey verification failed");

    let result = state
        .webauthn
        .finish_passkey_authentication(credential, auth)
        .map_err(|e| {
            warn!(error = %e, "passkey assertion rejected");
            rejected()
        })?;

    let record = state
        .db
        .get_passkey_by_credential_id(&credential_key(result.cred_id()))
        .await?
        .ok_or_else(rejected)?;
    if owner.is_some_and(|owner| owner != record.user_id) {
        return Err(rejected());
    }
    if !sign_count_ok(record.sign_count, result.counter()) {
        warn!(
            passkey_id = record.id,
            stored = record.sign_count,
            received = result.counter(),
            "passkey sign count did not increase, possible cloned authenticator"
        );
        return Err(rejected());
    }

    let mut passkey: Passkey = serde_json::from_str(&record.credential).map_internal()?;
    passkey.update_credential(&result);
    let serialized = serde_json::to_string(&passkey).map_internal()?;
    state
        .db
        .record_passkey_use(record.id, &serialized, result.counter(), Utc::now())
        .await?;
    Ok(record)
}

/// where the browser goes after a finished flow.
#[derive(Debug, Serialize)]
pub struct FinishResponse {
    pub user_id: UserId,
    pub redirect: &'static str,
}

/// a passkey as shown to its owner.
#[derive(Debug, Serialize)]
pub struct PasskeyView {
    pub id: u64,
    pub name: String,
    pub transports: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<&PasskeyRecord> for PasskeyView {
    fn from(r: &PasskeyRecord) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            transports: r.transports.clone(),
            created_at: r.created_at,
            last_used_at: r.last_used_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StartRegistrationRequest {
    pub display_name: String,
}

// ─── setup ──────────────────────────────────────────────────────────────────

/// GET /setup
pub async fn setup_page(State(state): State<AppState>) -> Result<Response, ApiError> {
    if state.db.count_users().await? > 0 {
        return Ok(Redirect::to("/login").into_response());
    }
    Ok(pages::setup().into_response())
}

/// POST /setup/start
pub async fn setup_start(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    Json(req): Json<StartRegistrationRequest>,
) -> Result<Json<CreationChallengeResponse>, ApiError> {
    if state.db.count_users().await? > 0 {
        return Err(ApiError::conflict("setup has already been completed"));
    }
    let display_name = clean_name(&req.display_name, "display name")?;
    let user = PendingUser {
        handle: Uuid::new_v4(),
        display_name,
    };

    let (challenge, registration) = state
        .webauthn
        .start_passkey_registration(user.handle, &user.display_name, &user.display_name, None)
        .map_internal()?;
    store_ceremony(
        &state,
        &mut session,
        Ceremony::Setup {
            user,
            state: registration,
        },
    )
    .await?;
    Ok(Json(challenge))
}

/// POST /setup/finish
pub async fn setup_finish(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    Json(credential): Json<RegisterPublicKeyCredential>,
) -> Result<Response, ApiError> {
    let Ceremony::Setup {
        user: pending,
        state: registration,
    } = take_ceremony(&state, &mut session).await?
    else {
        return Err(ApiError::bad_request("no setup in progress"));
    };

    let passkey = state
        .webauthn
        .finish_passkey_registration(&credential, &registration)
        .map_err(|e| ApiError::bad_request(format!("passkey registration failed: {e}")))?;

    let mut user = User::new(UserId(0), pending.display_name, Role::Admin);
    user.webauthn_handle = pending.handle;
    let registration = Registration {
        user,
        passkey: new_passkey_record(&passkey, &credential, UserId(0), "Passkey")?,
        invite: None,
    };
    let (user, _) = state.db.register_user(&registration).await?;
    info!(user_id = %user.id, "setup completed, administrator created");
    finish_sign_in(&state, &mut session, user.id).await
}

// ─── login ──────────────────────────────────────────────────────────────────

/// GET /login
pub async fn login_page(State(state): State<AppState>) -> Result<Response, ApiError> {
    if state.db.count_users().await? == 0 {
        return Ok(Redirect::to("/setup").into_response());
    }
    Ok(pages::login().into_response())
}

/// POST /webauthn/login/start
pub async fn login_start(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
) -> Result<Json<RequestChallengeResponse>, ApiError> {
    let passkeys = decode_passkeys(&state.db.list_all_passkeys().await?)?;
    if passkeys.is_empty() {
        return Err(ApiError::conflict("no passkeys are registered"));
    }

    let (challenge, auth) = state
        .webauthn
        .start_passkey_authentication(&passkeys)
        .map_internal()?;
    store_ceremony(&state, &mut session, Ceremony::Login { state: auth }).await?;
    Ok(Json(challenge))
}

/// POST /webauthn/login/finish
pub async fn login_finish(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    Json(credential): Json<PublicKeyCredential>,
) -> Result<Response, ApiError> {
    let Ceremony::Login { state: auth } = take_ceremony(&state, &mut session).await? else {
        return Err(ApiError::bad_request("no login in progress"));
    };

    let passkey = verify_assertion(&state, &credential, &auth, None).await?;
    info!(user_id = %passkey.user_id, passkey_id = passkey.id, "user signed in");
    finish_sign_in(&state, &mut session, passkey.user_id).await
}

/// POST /logout
pub async fn logout(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Response, ApiError> {
    state.db.delete_session(&session.id).await?;
    if let Some(user_id) = session.user_id {
        info!(user_id = %user_id, "user signed out");
    }
    let cookie = clear_session_cookie(&state.config.session.cookie_name, state.config.env);
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to("/login"),
    )
        .into_response())
}

// ─── passkeys ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PasskeyNameRequest {
    pub name: String,
}

/// POST /webauthn/passkey/start
pub async fn passkey_start(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    CurrentUser(user): CurrentUser,
    Json(req): Json<PasskeyNameRequest>,
) -> Result<Json<CreationChallengeResponse>, ApiError> {
    let name = clean_name(&req.name, "passkey name")?;
    let existing = decode_passkeys(&state.db.list_passkeys(user.id).await?)?;
    let exclude = existing.iter().map(|k| k.cred_id().clone()).collect();

    let (challenge, registration) = state
        .webauthn
        .start_passkey_registration(
            user.webauthn_handle,
            &user.display_name,
            &user.display_name,
            Some(exclude),
        )
        .map_internal()?;
    store_ceremony(
        &state,
        &mut session,
        Ceremony::AddPasskey {
            name,
            state: registration,
        },
    )
    .await?;
    Ok(Json(challenge))
}

/// POST /webauthn/passkey/finish
pub async fn passkey_finish(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    CurrentUser(user): CurrentUser,
    Json(credential): Json<RegisterPublicKeyCredential>,
) -> Result<Json<PasskeyView>, ApiError> {
    let Ceremony::AddPasskey {
        name,
        state: registration,
    } = take_ceremony(&state, &mut session).await?
    else {
        return Err(ApiError::bad_request("no passkey registration in progress"));
    };

    let passkey = state
        .webauthn
        .finish_passkey_registration(&credential, &registration)
        .map_err(|e| ApiError::bad_request(format!("passkey registration failed: {e}")))?;
    let record = new_passkey_record(&passkey, &credential, user.id, &name)?;
    let record = state.db.create_passkey(&record).await?;

    info!(user_id = %user.id, passkey_id = record.id, "passkey added");
    Ok(Json(PasskeyView::from(&record)))
}

/// GET /passkeys
pub async fn list_passkeys(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PasskeyView>>, ApiError> {
    let passkeys = state.db.list_passkeys(user.id).await?;
    Ok(Json(passkeys.iter().map(PasskeyView::from).collect()))
}

/// POST /passkeys/{id}/rename
pub async fn rename_passkey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<u64>,
    Json(req): Json<PasskeyNameRequest>,
) -> Result<Redirect, ApiError> {
    let name = clean_name(&req.name, "passkey name")?;
    state.db.rename_passkey(user.id, id, &name).await?;
    Ok(Redirect::to("/security"))
}

/// POST /passkeys/{id}/delete
pub async fn delete_passkey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<u64>,
) -> Result<Redirect, ApiError> {
    state.db.delete_passkey(user.id, id).await?;
    info!(user_id = %user.id, passkey_id = id, "passkey deleted");
    Ok(Redirect::to("/security"))
}

// ─── invite signup ──────────────────────────────────────────────────────────

async fn open_invite(state: &AppState, token: &str) -> Result<Invite, ApiError> {
    let invite = state
        .db
        .get_invite_by_token(token)
        .await?
        .or_not_found("invite not found")?;
    if invite.is_consumed() {
        return Err(ApiError::conflict("invite is no longer valid"));
    }
    Ok(invite)
}

/// GET /invite/{token}
pub async fn invite_page(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    open_invite(&state, &token).await?;
    Ok(pages::invite(&token).into_response())
}

/// POST /invite/{token}/start
pub async fn invite_start(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    Path(token): Path<String>,
    Json(req): Json<StartRegistrationRequest>,
) -> Result<Json<CreationChallengeResponse>, ApiError> {
    let invite = open_invite(&state, &token).await?;
    let display_name = clean_name(&req.display_name, "display name")?;
    let user = PendingUser {
        handle: Uuid::new_v4(),
        display_name,
    };

    let (challenge, registration) = state
        .webauthn
        .start_passkey_registration(user.handle, &user.display_name, &user.display_name, None)
        .map_internal()?;
    store_ceremony(
        &state,
        &mut session,
        Ceremony::Invite {
            invite_id: invite.id.0,
            user,
            state: registration,
        },
    )
    .await?;
    Ok(Json(challenge))
}

/// POST /invite/{token}/finish
pub async fn invite_finish(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    Path(token): Path<String>,
    Json(credential): Json<RegisterPublicKeyCredential>,
) -> Result<Response, ApiError> {
    let Ceremony::Invite {
        invite_id,
        user: pending,
        state: registration,
    } = take_ceremony(&state, &mut session).await?
    else {
        return Err(ApiError::bad_request("no invite signup in progress"));
    };
    let invite = open_invite(&state, &token).await?;
    if invite.id != InviteId(invite_id) {
        return Err(ApiError::bad_request("invite does not match the signup"));
    }

    let passkey = state
        .webauthn
        .finish_passkey_registration(&credential, &registration)
        .map_err(|e| ApiError::bad_request(format!("passkey registration failed: {e}")))?;

    let mut user = User::new(UserId(0), pending.display_name, invite.target_role);
    user.webauthn_handle = pending.handle;
    let registration = Registration {
        user,
        passkey: new_passkey_record(&passkey, &credential, UserId(0), "Passkey")?,
        invite: Some(invite.id),
    };
    let (user, _) = state.db.register_user(&registration).await?;
    info!(user_id = %user.id, invite_id = %invite.id, "invite accepted");
    finish_sign_in(&state, &mut session, user.id).await
}
