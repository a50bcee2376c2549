//! groundwave library - http handlers and application setup.
//!
//! this crate provides the web server of the single-tenant personal data
//! app:
//! - [`handlers`]: http request handlers
//! - [`cli`]: command-line interface implementation
//! - [`session`]: browser sessions and per-request metadata
//! - [`auth`]: passkey authentication and sensitive access
//! - [`zettel`]: the zettelkasten index and its rebuild worker
//! - [`whatsapp_ingest`]: whatsapp messages into contact history

#![warn(missing_docs)]

/// passkey authentication, sensitive access and route guards.
pub mod auth;
/// zettel question answering backends.
pub mod chat;
/// command-line interface.
pub mod cli;
/// http request handlers.
pub mod handlers;
/// proof-of-work challenges and request tokens.
pub mod pow;
/// browser sessions.
pub mod session;
/// whatsapp message ingest and device persistence.
pub mod whatsapp_ingest;
/// zettelkasten index.
pub mod zettel;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use groundwave_db::GroundwaveDb;
use groundwave_gridmap::HttpTileFetcher;
use groundwave_types::Config;
use groundwave_whatsapp::WhatsAppClient;
use secrecy::ExposeSecret;
use tower_http::{
    catch_panic::CatchPanicLayer,
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};
use webauthn_rs::prelude::Webauthn;

use crate::auth::{
    require_admin, require_auth, require_sensitive_access, require_sensitive_access_for_health,
};
use crate::chat::ChatBackend;
use crate::handlers::{ext, health, invites, misc, qsl, security, webauthn, whatsapp};
use crate::session::{no_cache, session_layer};
use crate::zettel::{RebuildHandle, ZettelIndex};

/// how long a request body may take to arrive.
pub const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// response deadline for everything except streams.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(300);

/// shared state of every request.
#[derive(Clone)]
pub struct AppState {
    /// database connection for persistent storage.
    pub db: GroundwaveDb,
    /// server configuration.
    pub config: Arc<Config>,
    /// webauthn relying party.
    pub webauthn: Arc<Webauthn>,
    /// zettelkasten index and snapshot cache.
    pub zettels: Arc<ZettelIndex>,
    /// queues zettel rebuilds.
    pub rebuild: RebuildHandle,
    /// answers zettel questions (none if chat is not configured).
    pub chat: Option<Arc<dyn ChatBackend>>,
    /// whatsapp link (none if whatsapp is disabled).
    pub whatsapp: Option<WhatsAppClient>,
    /// map tiles for qsl maps.
    pub tiles: Arc<HttpTileFetcher>,
}

impl AppState {
    /// state without the optional chat and whatsapp services.
    pub fn new(
        db: GroundwaveDb,
        config: Config,
        webauthn: Webauthn,
        zettels: Arc<ZettelIndex>,
        rebuild: RebuildHandle,
        tiles: HttpTileFetcher,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            webauthn: Arc::new(webauthn),
            zettels,
            rebuild,
            chat: None,
            whatsapp: None,
            tiles: Arc::new(tiles),
        }
    }

    /// attach a chat backend.
    pub fn with_chat(mut self, chat: Arc<dyn ChatBackend>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// attach the whatsapp client.
    pub fn with_whatsapp(mut self, client: WhatsAppClient) -> Self {
        self.whatsapp = Some(client);
        self
    }

    /// key for request tokens and proof-of-work challenges.
    pub fn csrf_secret(&self) -> &[u8] {
        self.config
            .csrf_secret
            .as_ref()
            .map(|s| s.expose_secret().as_bytes())
            .unwrap_or_default()
    }
}

/// create the axum application with all routes.
pub fn create_app(state: AppState) -> Router {
    let public = Router::new()
        .route("/connectivity", get(misc::connectivity))
        .route("/.well-known/security.txt", get(misc::security_txt))
        .route("/security.txt", get(misc::security_txt_file))
        .route("/pow/challenge", get(misc::pow_challenge))
        .route("/pow/verify", post(misc::pow_verify))
        .route("/note/{id}", get(handlers::zettel::public_note))
        .route("/setup", get(webauthn::setup_page))
        .route("/setup/start", post(webauthn::setup_start))
        .route("/setup/finish", post(webauthn::setup_finish))
        .route("/login", get(webauthn::login_page))
        .route("/webauthn/login/start", post(webauthn::login_start))
        .route("/webauthn/login/finish", post(webauthn::login_finish))
        .route("/logout", post(webauthn::logout))
        .route("/invite/{token}", get(webauthn::invite_page))
        .route("/invite/{token}/start", post(webauthn::invite_start))
        .route("/invite/{token}/finish", post(webauthn::invite_finish));

    let authed = Router::new()
        .route("/", get(misc::root))
        .route("/webauthn/passkey/start", post(webauthn::passkey_start))
        .route("/webauthn/passkey/finish", post(webauthn::passkey_finish))
        .route("/passkeys", get(webauthn::list_passkeys))
        .route("/passkeys/{id}/rename", post(webauthn::rename_passkey))
        .route("/passkeys/{id}/delete", post(webauthn::delete_passkey))
        .route("/security", get(security::security_page))
        .route(
            "/security/sessions/revoke-others",
            post(security::revoke_other_sessions),
        )
        .route(
            "/security/sessions/{id}/revoke",
            post(security::revoke_session),
        )
        .route("/sensitive/unlock/start", post(security::unlock_start))
        .route("/sensitive/unlock/finish", post(security::unlock_finish))
        .route("/sensitive/lock", post(security::lock))
        .route("/sensitive/status", get(security::status))
        .route("/home/{id}", get(handlers::zettel::home_note))
        .route(
            "/health/break-glass/{profile_id}",
            post(health::break_glass),
        )
        .route("/ext/token", get(ext::token))
        .route_layer(from_fn(require_auth));

    let health_profiles = Router::new()
        .route("/health/profiles/{profile_id}", get(health::profile))
        .route_layer(from_fn(require_sensitive_access_for_health));

    let extension = Router::new()
        .route("/ext/contacts/lookup", post(ext::lookup))
        .route_layer(from_fn_with_state(state.clone(), ext::require_csrf))
        .route_layer(from_fn(require_auth));

    let admin = Router::new()
        .route("/zk", get(handlers::zettel::index))
        .route("/zk/random", get(handlers::zettel::random))
        .route("/zk/rebuild-cache", post(handlers::zettel::rebuild_cache))
        .route("/zk/ingest", post(handlers::zettel::ingest))
        .route("/zk/{id}", get(handlers::zettel::admin_note))
        .route("/zk/{id}/links", get(handlers::zettel::links))
        .route("/zk/{id}/backlinks", get(handlers::zettel::backlinks))
        .route("/qsl", get(qsl::list))
        .route("/qsl/import", post(qsl::import))
        .route("/qsl/export", get(qsl::export))
        .route("/qsl/map", get(qsl::map))
        .route("/whatsapp/status", get(whatsapp::status))
        .route("/whatsapp/connect", post(whatsapp::connect))
        .route("/whatsapp/disconnect", post(whatsapp::disconnect))
        .route_layer(from_fn(require_admin));

    let admin_sensitive = Router::new()
        .route("/whatsapp/logout", post(whatsapp::logout))
        .route("/admin/invites", get(invites::list).post(invites::create))
        .route("/admin/invites/{id}/regenerate", post(invites::regenerate))
        .route("/admin/invites/{id}/delete", post(invites::delete))
        .route_layer(from_fn(require_sensitive_access))
        .route_layer(from_fn(require_admin));

    // streams run as long as the client listens
    let streaming = Router::new()
        .route("/zk/{id}/chat", get(handlers::zettel::chat))
        .route_layer(from_fn(require_admin));

    #[allow(deprecated)]
    let response_timeout = TimeoutLayer::new(RESPONSE_TIMEOUT);

    Router::new()
        .merge(public)
        .merge(authed)
        .merge(health_profiles)
        .merge(extension)
        .merge(admin)
        .merge(admin_sensitive)
        .layer(response_timeout)
        .merge(streaming)
        .layer(from_fn(no_cache))
        .layer(from_fn_with_state(state.clone(), session_layer))
        .layer(RequestBodyTimeoutLayer::new(REQUEST_READ_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
