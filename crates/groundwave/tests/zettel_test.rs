//! integration tests for the zettelkasten routes

mod common;

use std::sync::{Arc, Mutex};

use axum::http::{StatusCode, header};
use common::*;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, StreamExt};
use groundwave::chat::{ChatBackend, ChatError, ChatPrompt, ChatStream};

const ALPHA: &str = "0a1b2c3d-0000-4000-8000-000000000001";
const BETA: &str = "0a1b2c3d-0000-4000-8000-000000000002";
const GAMMA: &str = "0a1b2c3d-0000-4000-8000-000000000003";

fn note(id: &str, title: &str, access: Option<&str>, body: &str) -> String {
    let mut org = format!(":PROPERTIES:\n:ID: {id}\n:END:\n#+TITLE: {title}\n");
    if let Some(access) = access {
        org.push_str(&format!("#+access: {access}\n"));
    }
    org.push('\n');
    org.push_str(body);
    org
}

async fn ingest(t: &TestApp, session: &str, org: String) -> serde_json::Value {
    let response = t.send(post("/zk/ingest", Some(session), org)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_ingest_and_visibility_per_mount() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;

    let summary = ingest(&t, &session, note(ALPHA, "Alpha", Some("public"), "hello")).await;
    assert_eq!(summary["id"], ALPHA);
    assert_eq!(summary["access"], "public");
    ingest(&t, &session, note(BETA, "Beta", Some("home"), "kitchen")).await;
    ingest(&t, &session, note(GAMMA, "Gamma", None, "diary")).await;

    // anonymous visitors only see public notes
    let response = t.send(get(&format!("/note/{ALPHA}"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Alpha"));
    let response = t.send(get(&format!("/note/{BETA}"), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // signed-in users add home notes
    let response = t.send(get(&format!("/home/{BETA}"), Some(&session))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = t.send(get(&format!("/home/{GAMMA}"), Some(&session))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // the admin mount shows everything
    let response = t.send(get(&format!("/zk/{GAMMA}"), Some(&session))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("diary"));
}

#[tokio::test]
async fn test_home_mount_needs_login() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;
    ingest(&t, &session, note(BETA, "Beta", Some("home"), "kitchen")).await;

    let response = t.send(get(&format!("/home/{BETA}"), None)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_links_rewritten_for_mount() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;
    ingest(
        &t,
        &session,
        note(ALPHA, "Alpha", Some("public"), &format!("see [[id:{BETA}][Beta]]")),
    )
    .await;

    let response = t.send(get(&format!("/note/{ALPHA}"), None)).await;
    let html = body_string(response).await;
    assert!(html.contains(&format!("/note/{BETA}")));

    let response = t.send(get(&format!("/zk/{ALPHA}"), Some(&session))).await;
    let html = body_string(response).await;
    assert!(html.contains(&format!("/zk/{BETA}")));
}

#[tokio::test]
async fn test_links_and_backlinks() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;
    ingest(&t, &session, note(BETA, "Beta", None, "leaf")).await;
    ingest(&t, &session, note(GAMMA, "Gamma", None, "leaf")).await;
    ingest(
        &t,
        &session,
        note(
            ALPHA,
            "Alpha",
            None,
            &format!("[[id:{BETA}][b]] and [[id:{GAMMA}][g]] and [[id:{ALPHA}][me]]"),
        ),
    )
    .await;

    let response = t
        .send(get_json(&format!("/zk/{ALPHA}/links"), Some(&session)))
        .await;
    let links = body_json(response).await;
    let ids: Vec<&str> = links
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![BETA, GAMMA]);

    let response = t
        .send(get_json(&format!("/zk/{BETA}/backlinks"), Some(&session)))
        .await;
    let backlinks = body_json(response).await;
    assert_eq!(backlinks.as_array().unwrap().len(), 1);
    assert_eq!(backlinks[0]["id"], ALPHA);
    assert_eq!(backlinks[0]["title"], "Alpha");
}

#[tokio::test]
async fn test_ingest_rejects_note_without_id() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;
    let response = t
        .send(post("/zk/ingest", Some(&session), "#+TITLE: orphan\n"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_index_and_random() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;

    let response = t.send(get("/zk/random", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    ingest(&t, &session, note(ALPHA, "Alpha", None, "")).await;
    let response = t.send(get("/zk/random", Some(&session))).await;
    assert_eq!(location(&response), format!("/zk/{ALPHA}"));

    let response = t.send(get("/zk", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Alpha"));
}

#[tokio::test]
async fn test_rebuild_is_accepted() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;
    let response = t.send(post("/zk/rebuild-cache", Some(&session), "")).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(body_json(response).await.get("queued").is_some());
}

#[tokio::test]
async fn test_chat_without_backend() {
    let t = TestApp::new().await;
    let ada = t.admin().await;
    let session = t.login(&ada).await;
    ingest(&t, &session, note(ALPHA, "Alpha", None, "")).await;
    let response = t
        .send(get_json(&format!("/zk/{ALPHA}/chat?q=why"), Some(&session)))
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

/// answers every question with fixed chunks and records the prompts.
struct CannedChat {
    chunks: Vec<&'static str>,
    prompts: Mutex<Vec<ChatPrompt>>,
}

impl ChatBackend for CannedChat {
    fn stream(&self, prompt: ChatPrompt) -> BoxFuture<'_, Result<ChatStream, ChatError>> {
        self.prompts.lock().unwrap().push(prompt);
        let chunks: Vec<Result<String, ChatError>> =
            self.chunks.iter().map(|c| Ok(c.to_string())).collect();
        async move { Ok(stream::iter(chunks).boxed()) }.boxed()
    }
}

#[tokio::test]
async fn test_chat_streams_sse_frames() {
    let mut t = TestApp::new().await;
    let backend = Arc::new(CannedChat {
        chunks: vec!["Hello", " world", "line one\nline two", "crlf\r\nend"],
        prompts: Mutex::new(Vec::new()),
    });
    t.state = t.state.clone().with_chat(backend.clone());

    let ada = t.admin().await;
    let session = t.login(&ada).await;
    ingest(&t, &session, note(BETA, "Beta", None, "")).await;
    ingest(
        &t,
        &session,
        note(ALPHA, "Alpha", None, &format!("see [[id:{BETA}][beta]]\n")),
    )
    .await;

    let response = t
        .send(get(&format!("/zk/{ALPHA}/chat?q=what%20links"), Some(&session)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "text/event-stream"
    );
    assert_eq!(
        response.headers()[header::CACHE_CONTROL].to_str().unwrap(),
        "no-cache"
    );

    let body = body_string(response).await;
    assert_eq!(
        body,
        "data: Hello\n\n\
         data:  world\n\n\
         data: line one\ndata: line two\n\n\
         data: crlf\ndata: end\n\n"
    );

    let prompts = backend.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].question, "what links");
    assert_eq!(prompts[0].title, "Alpha");
    assert_eq!(prompts[0].links[0].id, BETA);
}

#[tokio::test]
async fn test_chat_requires_question() {
    let mut t = TestApp::new().await;
    t.state = t.state.clone().with_chat(Arc::new(CannedChat {
        chunks: vec![],
        prompts: Mutex::new(Vec::new()),
    }));
    let ada = t.admin().await;
    let session = t.login(&ada).await;
    ingest(&t, &session, note(ALPHA, "Alpha", None, "")).await;

    let response = t
        .send(get_json(&format!("/zk/{ALPHA}/chat?q=%20"), Some(&session)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
