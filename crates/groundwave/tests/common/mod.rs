//! shared fixture for http route tests

#![allow(dead_code)] // not every test file uses every helper

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use chrono::Utc;
use groundwave::auth::build_webauthn;
use groundwave::session::generate_session_id;
use groundwave::zettel::{ZettelIndex, spawn_rebuild_worker};
use groundwave::{AppState, create_app};
use groundwave_db::{Database, GroundwaveDb, PasskeyRecord, Registration, SessionRecord};
use groundwave_gridmap::{HttpTileFetcher, OSM_ATTRIBUTION, OSM_TILE_URL};
use groundwave_types::{Config, Invite, InviteId, InviteToken, Role, User, UserId};
use http_body_util::BodyExt;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const COOKIE: &str = "groundwave_session";

pub fn test_config() -> Config {
    Config {
        base_url: "https://gw.example.com".to_string(),
        csrf_secret: Some(SecretString::from("test-secret".to_string())),
        ..Config::default()
    }
}

/// an app over an in-memory database.
pub struct TestApp {
    pub db: GroundwaveDb,
    pub state: AppState,
    pub cancel: CancellationToken,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let db = GroundwaveDb::new_in_memory().await.unwrap();
        let webauthn = build_webauthn(&config).unwrap();
        let zettels = Arc::new(ZettelIndex::new(db.clone(), None));
        let cancel = CancellationToken::new();
        let (rebuild, _task) = spawn_rebuild_worker(zettels.clone(), cancel.clone());
        let tiles = HttpTileFetcher::new(OSM_TILE_URL, OSM_ATTRIBUTION, "groundwave-tests").unwrap();

        // wait out the boot rebuild so it cannot race the test's writes
        for _ in 0..200 {
            if zettels.completed_rebuilds() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let state = AppState::new(db.clone(), config, webauthn, zettels, rebuild, tiles);
        Self { db, state, cancel }
    }

    pub fn app(&self) -> Router {
        create_app(self.state.clone())
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        self.app().oneshot(req).await.unwrap()
    }

    fn passkey(user_id: UserId, n: u8) -> PasskeyRecord {
        PasskeyRecord {
            id: 0,
            user_id,
            credential_id: format!("cred-{n}"),
            credential: "{}".to_string(),
            sign_count: 0,
            transports: vec![],
            name: format!("Key {n}"),
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    /// the administrator created by setup.
    pub async fn admin(&self) -> User {
        if let Some(admin) = self
            .db
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .find(|u| u.is_admin)
        {
            return admin;
        }
        let mut user = User::new(UserId(0), "Ada", Role::Admin);
        user.webauthn_handle = Uuid::new_v4();
        let (user, _) = self
            .db
            .register_user(&Registration {
                user,
                passkey: Self::passkey(UserId(0), 1),
                invite: None,
            })
            .await
            .unwrap();
        user
    }

    /// a member who joined through an invite.
    pub async fn member(&self) -> User {
        let admin = self.admin().await;
        let invite = self
            .db
            .create_invite(&Invite {
                id: InviteId(0),
                token: InviteToken::generate(),
                created_by: admin.id,
                target_role: Role::Member,
                created_at: Utc::now(),
                consumed_at: None,
                consumed_by: None,
            })
            .await
            .unwrap();
        let mut user = User::new(UserId(0), "Bob", Role::Member);
        user.webauthn_handle = Uuid::new_v4();
        let (user, _) = self
            .db
            .register_user(&Registration {
                user,
                passkey: Self::passkey(UserId(0), 2),
                invite: Some(invite.id),
            })
            .await
            .unwrap();
        user
    }

    /// a signed-in session for `user`; returns its id.
    pub async fn login(&self, user: &User) -> String {
        let mut session =
            SessionRecord::new(generate_session_id(), Utc::now(), chrono::Duration::days(14));
        session.user_id = Some(user.id);
        self.db.create_session(&session).await.unwrap();
        session.id
    }

    /// a signed-in session with sensitive access open.
    pub async fn login_sensitive(&self, user: &User) -> String {
        let id = self.login(user).await;
        let mut session = self.db.get_session(&id).await.unwrap().unwrap();
        session.sensitive_expires_at = Some(Utc::now() + chrono::Duration::minutes(10));
        self.db.save_session(&session).await.unwrap();
        id
    }
}

pub fn cookie(session_id: &str) -> String {
    format!("{COOKIE}={session_id}")
}

pub fn get(uri: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(id) = session {
        builder = builder.header(header::COOKIE, cookie(id));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn get_json(uri: &str, session: Option<&str>) -> Request<Body> {
    let mut req = get(uri, session);
    req.headers_mut()
        .insert(header::ACCEPT, "application/json".parse().unwrap());
    req
}

pub fn post(uri: &str, session: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(id) = session {
        builder = builder.header(header::COOKIE, cookie(id));
    }
    builder.body(body.into()).unwrap()
}

pub fn post_json(uri: &str, session: Option<&str>, json: serde_json::Value) -> Request<Body> {
    let mut req = post(uri, session, json.to_string());
    req.headers_mut()
        .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
    req
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
