//! browser sessions and per-request session metadata.
//!
//! every request loads (or starts) the session named by the cookie,
//! records the device family and client address on it, and makes it
//! available to handlers as [`CurrentSession`]. when the session belongs to
//! a user, [`CurrentUser`] is inserted too.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use groundwave_db::{Database, GroundwaveDb, SessionRecord};
use groundwave_types::{RuntimeEnv, User, UserId};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::handlers::ApiError;

/// length of a session id in hex characters.
pub const SESSION_ID_LEN: usize = 64;

/// the session of the current request.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub SessionRecord);

/// the signed-in user of the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or_else(|| ApiError::internal("session layer not installed"))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("authentication required"))
    }
}

/// a fresh random session id.
pub fn generate_session_id() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

fn is_valid_session_id(id: &str) -> bool {
    id.len() == SESSION_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// the value of cookie `name`, if the request carries it.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

/// `Set-Cookie` value for the session cookie.
pub fn session_cookie(name: &str, id: &str, max_age_secs: u64, env: RuntimeEnv) -> String {
    let mut cookie = format!("{name}={id}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax");
    if env.is_production() {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(name: &str, env: RuntimeEnv) -> String {
    session_cookie(name, "", 0, env)
}

/// sign `session` in as `user_id` under a fresh id and return the
/// `Set-Cookie` value for it. the previous id stops resolving.
pub async fn sign_in(
    state: &AppState,
    session: &mut SessionRecord,
    user_id: UserId,
) -> Result<String, ApiError> {
    let old_id = std::mem::replace(&mut session.id, generate_session_id());
    session.user_id = Some(user_id);
    session.sensitive_expires_at = None;
    session.break_glass_profile_ids.clear();
    session.break_glass_expires_at = None;
    state.db.replace_session(&old_id, session).await?;
    debug!(user_id = %user_id, "session id rotated on sign-in");

    let config = &state.config;
    Ok(session_cookie(
        &config.session.cookie_name,
        &session.id,
        config.session.lifetime_secs,
        config.env,
    ))
}

/// short device description from a user agent, e.g. "Firefox on Linux".
pub fn device_family(user_agent: &str) -> String {
    if user_agent.trim().is_empty() {
        return "Unknown device".to_string();
    }

    let browser = if user_agent.contains("Edg/") || user_agent.contains("EdgA/") {
        "Edge"
    } else if user_agent.contains("OPR/") || user_agent.contains("Opera") {
        "Opera"
    } else if user_agent.contains("Firefox/") || user_agent.contains("FxiOS/") {
        "Firefox"
    } else if user_agent.contains("Chrome/") || user_agent.contains("CriOS/") {
        "Chrome"
    } else if user_agent.contains("Safari/") {
        "Safari"
    } else if user_agent.starts_with("curl/") {
        "curl"
    } else {
        "Unknown browser"
    };

    let os = if user_agent.contains("iPhone") || user_agent.contains("iPad") {
        "iOS"
    } else if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("CrOS") {
        "ChromeOS"
    } else if user_agent.contains("Mac OS X") || user_agent.contains("Macintosh") {
        "macOS"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else {
        return browser.to_string();
    };

    format!("{browser} on {os}")
}

/// the client address. forwarded headers are only trusted in production,
/// where the app runs behind a reverse proxy.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, env: RuntimeEnv) -> String {
    if env.is_production() {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
        let real = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = real {
            return ip.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
}

/// load or create the session, capture its metadata and inject the user.
pub async fn session_layer(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let config = &state.config;
    let now = Utc::now();
    let lifetime = chrono::Duration::seconds(config.session.lifetime_secs as i64);

    let existing = match cookie_value(req.headers(), &config.session.cookie_name)
        .filter(|id| is_valid_session_id(id))
    {
        Some(id) => match state.db.get_session(id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "failed to load session");
                None
            }
        },
        None => None,
    };

    let (mut session, fresh) = match existing {
        Some(s) if !s.is_expired(now) => (s, false),
        stale => {
            if let Some(old) = stale
                && let Err(e) = state.db.delete_session(&old.id).await
            {
                warn!(error = %e, "failed to delete expired session");
            }
            (SessionRecord::new(generate_session_id(), now, lifetime), true)
        }
    };

    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    session.device = device_family(user_agent);
    session.ip = client_ip(req.headers(), peer, config.env);
    session.last_activity_at = now;

    let persisted = if fresh {
        state.db.create_session(&session).await
    } else {
        state
            .db
            .touch_session(&session.id, &session.device, &session.ip, now)
            .await
    };
    if let Err(e) = persisted {
        warn!(error = %e, "failed to record session");
    }

    if let Some(user_id) = session.user_id {
        match state.db.get_user(user_id).await {
            Ok(Some(user)) => {
                req.extensions_mut().insert(CurrentUser(user));
            }
            Ok(None) => session.user_id = None,
            Err(e) => warn!(error = %e, "failed to load session user"),
        }
    }

    let cookie = fresh.then(|| {
        session_cookie(
            &config.session.cookie_name,
            &session.id,
            config.session.lifetime_secs,
            config.env,
        )
    });
    req.extensions_mut().insert(CurrentSession(session));

    let mut response = next.run(req).await;
    if let Some(cookie) = cookie
        && !response.headers().contains_key(header::SET_COOKIE)
        && let Ok(value) = HeaderValue::from_str(&cookie)
    {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// mark every response uncacheable unless the handler chose otherwise.
pub async fn no_cache(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store"));
    response
}

/// delete expired sessions every `interval` until cancelled.
pub fn spawn_session_sweeper(
    db: GroundwaveDb,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            "starting expired session sweeper"
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match db.delete_expired_sessions(Utc::now()).await {
                Ok(0) => {}
                Ok(deleted) => debug!(deleted, "swept expired sessions"),
                Err(e) => warn!(error = %e, "session sweep failed"),
            }
        }
    })
}
