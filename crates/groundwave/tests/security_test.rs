//! integration tests for sessions, sensitive access and break-glass

mod common;

use axum::http::{StatusCode, header};
use common::*;
use groundwave::session::sign_in;
use groundwave_db::Database;

/// the session id a response's `Set-Cookie` assigns.
fn assigned_session(response: &axum::http::Response<axum::body::Body>) -> String {
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    let pair = cookie.split(';').next().unwrap();
    pair.strip_prefix(&format!("{COOKIE}=")).unwrap().to_string()
}

#[tokio::test]
async fn test_sign_in_rotates_planted_session_id() {
    let t = TestApp::new().await;
    let ada = t.admin().await;

    // an anonymous session whose id someone else already knows
    let response = t.send(get("/connectivity", None)).await;
    let planted = assigned_session(&response);
    let mut session = t.db.get_session(&planted).await.unwrap().unwrap();
    session.sensitive_expires_at = Some(chrono::Utc::now() + chrono::Duration::minutes(5));
    t.db.save_session(&session).await.unwrap();

    let cookie = sign_in(&t.state, &mut session, ada.id).await.unwrap();
    assert_ne!(session.id, planted);
    assert!(cookie.starts_with(&format!("{COOKIE}={}", session.id)), "{}", cookie);
    assert!(cookie.contains("HttpOnly"));

    assert!(t.db.get_session(&planted).await.unwrap().is_none());
    let stored = t.db.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.user_id, Some(ada.id));
    assert!(stored.sensitive_expires_at.is_none());

    let response = t.send(get("/security", Some(&planted))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login");

    let response = t.send(get("/security", Some(&session.id))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_security_page_lists_sessions() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;
    let response = t.send(get("/security", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("data-expires-at"));
}

#[tokio::test]
async fn test_revoke_own_session() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let current = t.login(&ada).await;
    let other = t.login(&ada).await;

    let response = t
        .send(post(
            &format!("/security/sessions/{other}/revoke"),
            Some(&current),
            "",
        ))
        .await;
    assert_eq!(location(&response), "/security");
    assert!(t.db.get_session(&other).await.unwrap().is_none());
    assert!(t.db.get_session(&current).await.unwrap().is_some());
}

#[tokio::test]
async fn test_cannot_revoke_someone_elses_session() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let bob = t.member().await;
    let ada_session = t.login(&ada).await;
    let bob_session = t.login(&bob).await;

    let response = t
        .send(post(
            &format!("/security/sessions/{ada_session}/revoke"),
            Some(&bob_session),
            "",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(t.db.get_session(&ada_session).await.unwrap().is_some());
}

#[tokio::test]
async fn test_revoke_other_sessions() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let bob = t.member().await;
    let current = t.login(&ada).await;
    let stale = t.login(&ada).await;
    let bobs = t.login(&bob).await;

    let response = t
        .send(post("/security/sessions/revoke-others", Some(&current), ""))
        .await;
    assert_eq!(location(&response), "/security");
    assert!(t.db.get_session(&current).await.unwrap().is_some());
    assert!(t.db.get_session(&stale).await.unwrap().is_none());
    assert!(t.db.get_session(&bobs).await.unwrap().is_some());
}

#[tokio::test]
async fn test_sensitive_status_and_lock() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login_sensitive(&ada).await;

    let response = t.send(get_json("/sensitive/status", Some(&session))).await;
    let status = body_json(response).await;
    assert_eq!(status["active"], true);
    assert!(status["expires_at"].is_string());

    let response = t.send(post("/sensitive/lock", Some(&session), "")).await;
    assert_eq!(location(&response), "/security");

    let response = t.send(get_json("/sensitive/status", Some(&session))).await;
    let status = body_json(response).await;
    assert_eq!(status["active"], false);
    assert!(status["expires_at"].is_null());
}

#[tokio::test]
async fn test_unlock_without_ceremony_is_rejected() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;
    let credential = serde_json::json!({
        "id": "AAAA",
        "rawId": "AAAA",
        "response": {
            "authenticatorData": "AAAA",
            "clientDataJSON": "AAAA",
            "signature": "AAAA",
            "userHandle": null
        },
        "extensions": {},
        "type": "public-key"
    });
    let response = t
        .send(post_json("/sensitive/unlock/finish", Some(&session), credential))
        .await;
    assert!(response.status().is_client_error());

    let response = t.send(get_json("/sensitive/status", Some(&session))).await;
    assert_eq!(body_json(response).await["active"], false);
}

#[tokio::test]
async fn test_break_glass_opens_one_profile() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;

    let response = t.send(get_json("/health/profiles/7", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = t.send(post("/health/break-glass/7", Some(&session), "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let grant = body_json(response).await;
    assert_eq!(grant["profile_ids"], serde_json::json!([7]));

    let response = t.send(get_json("/health/profiles/7", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["profile_id"], 7);

    let response = t.send(get_json("/health/profiles/8", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // locking drops the grant too
    t.send(post("/sensitive/lock", Some(&session), "")).await;
    let response = t.send(get_json("/health/profiles/7", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sensitive_access_opens_every_profile() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login_sensitive(&ada).await;
    let response = t.send(get_json("/health/profiles/42", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_root_redirects_by_role() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let bob = t.member().await;

    let session = t.login(&ada).await;
    let response = t.send(get("/", Some(&session))).await;
    assert_eq!(location(&response), "/zk");

    let session = t.login(&bob).await;
    let response = t.send(get("/", Some(&session))).await;
    assert_eq!(location(&response), "/security");
}
