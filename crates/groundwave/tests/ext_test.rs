//! integration tests for the browser extension api

mod common;

use axum::http::StatusCode;
use common::*;
use groundwave_db::Database;
use groundwave_types::{Contact, ContactId};

async fn token(t: &TestApp, session: &str) -> String {
    let response = t.send(get_json("/ext/token", Some(session))).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_lookup_needs_request_token() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;

    let body = serde_json::json!({ "name": "Grace Hopper" });
    let response = t
        .send(post_json("/ext/contacts/lookup", Some(&session), body.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut req = post_json("/ext/contacts/lookup", Some(&session), body);
    req.headers_mut()
        .insert("x-csrf-token", "deadbeef".parse().unwrap());
    let response = t.send(req).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_is_bound_to_session() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let first = t.login(&ada).await;
    let second = t.login(&ada).await;
    let stolen = token(&t, &first).await;

    let mut req = post_json(
        "/ext/contacts/lookup",
        Some(&second),
        serde_json::json!({}),
    );
    req.headers_mut()
        .insert("x-csrf-token", stolen.parse().unwrap());
    let response = t.send(req).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_lookup_finds_contact() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;

    let mut grace = Contact::new(ContactId(0), "Grace Hopper");
    grace.urls = vec!["https://www.linkedin.com/in/grace/".to_string()];
    t.db.create_contact(&grace).await.unwrap();
    t.db.create_contact(&Contact::new(ContactId(0), "Alan Turing"))
        .await
        .unwrap();

    let token = token(&t, &session).await;
    let mut req = post_json(
        "/ext/contacts/lookup",
        Some(&session),
        serde_json::json!({ "url": "http://linkedin.com/in/grace" }),
    );
    req.headers_mut()
        .insert("x-csrf-token", token.parse().unwrap());
    let response = t.send(req).await;
    assert_eq!(response.status(), StatusCode::OK);
    let found = body_json(response).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["name"], "Grace Hopper");
}

#[tokio::test]
async fn test_lookup_needs_login() {
    let t = TestApp::new().await;
    let response = t
        .send(post_json(
            "/ext/contacts/lookup",
            None,
            serde_json::json!({}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
