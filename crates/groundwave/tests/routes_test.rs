//! integration tests for route guards and the public endpoints

mod common;

use axum::http::{StatusCode, header};
use common::*;

#[tokio::test]
async fn test_connectivity() {
    let t = TestApp::new().await;
    let response = t.send(get("/connectivity", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "1");
}

#[tokio::test]
async fn test_security_txt_moved_permanently() {
    let t = TestApp::new().await;
    let response = t.send(get("/.well-known/security.txt", None)).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "/security.txt");
}

#[tokio::test]
async fn test_security_txt_redirect_target_is_served() {
    let mut config = test_config();
    config.security_txt.contact = vec!["mailto:security@gw.example.com".to_string()];
    config.security_txt.policy = Some("https://gw.example.com/policy".to_string());
    let t = TestApp::with_config(config).await;

    let response = t.send(get("/.well-known/security.txt", None)).await;
    let response = t.send(get(&location(&response), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "text/plain; charset=utf-8"
    );

    let body = body_string(response).await;
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines[0], "Contact: mailto:security@gw.example.com");
    assert!(lines[1].starts_with("Expires: "), "{}", body);
    let expires = chrono::DateTime::parse_from_rfc3339(&lines[1]["Expires: ".len()..]).unwrap();
    assert!(expires > chrono::Utc::now() + chrono::Duration::days(300));
    assert!(lines.contains(&"Policy: https://gw.example.com/policy"));
    assert!(lines.contains(&"Canonical: https://gw.example.com/.well-known/security.txt"));
}

#[tokio::test]
async fn test_security_txt_without_contact_is_not_found() {
    let t = TestApp::new().await;
    let response = t.send(get("/security.txt", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unauthenticated_page_redirects_to_login() {
    let t = TestApp::new().await;
    let response = t.send(get("/security", None)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_unauthenticated_api_is_401() {
    let t = TestApp::new().await;
    let response = t.send(get_json("/sensitive/status", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = t.send(post("/sensitive/lock", None, "")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_members_cannot_reach_admin_routes() {
    let t = TestApp::new().await;
    let bob = t.member().await;
    let session = t.login(&bob).await;

    let response = t.send(get("/zk", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = t.send(get("/qsl", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sensitive_routes_need_unlock() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;

    // page navigation is sent to the unlock prompt
    let response = t.send(get("/admin/invites", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/security?unlock=1");

    // mutations are refused outright
    let response = t
        .send(post_json("/admin/invites", Some(&session), serde_json::json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let unlocked = t.login_sensitive(&ada).await;
    let response = t
        .send(post_json("/admin/invites", Some(&unlocked), serde_json::json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_fresh_visitor_gets_session_cookie() {
    let t = TestApp::new().await;
    let response = t.send(get("/connectivity", None)).await;
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with(&format!("{COOKIE}=")));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Max-Age=1209600"));
    // development environment
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn test_known_session_gets_no_new_cookie() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;
    let response = t.send(get("/connectivity", Some(&session))).await;
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_responses_are_not_cached() {
    let t = TestApp::new().await;
    let response = t.send(get("/connectivity", None)).await;
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
}

#[tokio::test]
async fn test_setup_mode() {
    let t = TestApp::new().await;

    let response = t.send(get("/login", None)).await;
    assert_eq!(location(&response), "/setup");

    let response = t.send(get("/setup", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = t
        .send(post_json(
            "/setup/start",
            None,
            serde_json::json!({ "display_name": "Ada" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let challenge = body_json(response).await;
    assert!(challenge.get("publicKey").is_some());
}

#[tokio::test]
async fn test_setup_is_closed_once_a_user_exists() {
    let t = TestApp::new().await;
    t.admin().await;

    let response = t.send(get("/setup", None)).await;
    assert_eq!(location(&response), "/login");

    let response = t
        .send(post_json(
            "/setup/start",
            None,
            serde_json::json!({ "display_name": "Mallory" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_finish_without_start_is_rejected() {
    let t = TestApp::new().await;
    let response = t
        .send(post_json("/webauthn/login/finish", None, serde_json::json!({})))
        .await;
    // the body does not even parse as a credential
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_unknown_invite_is_404() {
    let t = TestApp::new().await;
    let response = t.send(get("/invite/AAAAAAAAAAAAAAAAAAAAAA", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_logout_clears_session() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;

    let response = t.send(post("/logout", Some(&session), "")).await;
    assert_eq!(location(&response), "/login");
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.contains("Max-Age=0"));

    let response = t.send(get_json("/sensitive/status", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_whatsapp_disabled_is_503() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;
    let response = t.send(get_json("/whatsapp/status", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
