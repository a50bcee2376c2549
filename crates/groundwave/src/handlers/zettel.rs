//! zettelkasten routes.
//!
//! the same note can be served from three mounts with different audiences.
//! `id:` links are rewritten to the mount that served the page, so a reader
//! never follows a link into a mount they cannot see.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        Html, IntoResponse, Redirect, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::{Stream, StreamExt};
use groundwave_org::{Access, annotate_external_links, parse_to_html};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::pages;
use super::{ApiError, OptionExt};
use crate::AppState;
use crate::chat::ChatPrompt;
use crate::zettel::{NoteSummary, ZettelError};

/// interval of sse keepalive comments.
const KEEPALIVE: Duration = Duration::from_secs(15);

impl From<ZettelError> for ApiError {
    fn from(e: ZettelError) -> Self {
        match e {
            ZettelError::Org(e) => ApiError::bad_request(e.to_string()),
            ZettelError::Db(e) => e.into(),
            other => ApiError::internal(other),
        }
    }
}

/// where a note is being served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mount {
    /// `/note`: anyone, public notes
    Public,
    /// `/home`: signed-in users, public and home notes
    Home,
    /// `/zk`: admins, everything
    Admin,
}

impl Mount {
    fn path(self) -> &'static str {
        match self {
            Mount::Public => "/note",
            Mount::Home => "/home",
            Mount::Admin => "/zk",
        }
    }

    fn shows(self, access: Access) -> bool {
        match self {
            Mount::Public => access == Access::Public,
            Mount::Home => matches!(access, Access::Public | Access::Home),
            Mount::Admin => true,
        }
    }
}

async fn render(state: &AppState, mount: Mount, id: &str) -> Result<Html<String>, ApiError> {
    // hidden notes are indistinguishable from missing ones
    let note = state
        .zettels
        .get(id)
        .await?
        .filter(|n| mount.shows(n.access))
        .or_not_found("note not found")?;

    let html = parse_to_html(&note.body, mount.path()).map_err(ApiError::internal)?;
    let html = annotate_external_links(&html, &state.config.base_url);
    Ok(pages::note(&note.title, &html))
}

/// GET /note/{id}
pub async fn public_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    render(&state, Mount::Public, &id).await
}

/// GET /home/{id}
pub async fn home_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    render(&state, Mount::Home, &id).await
}

/// GET /zk/{id}
pub async fn admin_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    render(&state, Mount::Admin, &id).await
}

/// GET /zk
pub async fn index(State(state): State<AppState>) -> Html<String> {
    pages::zettel_index(&state.zettels.list())
}

/// GET /zk/random
pub async fn random(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let note = state.zettels.random().or_not_found("no notes")?;
    Ok(Redirect::to(&format!("/zk/{}", note.id)))
}

/// GET /zk/{id}/links
pub async fn links(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<NoteSummary>> {
    Json(state.zettels.links(&id))
}

/// GET /zk/{id}/backlinks
pub async fn backlinks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<NoteSummary>> {
    Json(state.zettels.backlinks(&id))
}

#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    /// false when a rebuild was already queued
    pub queued: bool,
}

/// POST /zk/rebuild-cache
pub async fn rebuild_cache(State(state): State<AppState>) -> impl IntoResponse {
    let queued = state.rebuild.trigger();
    info!(queued, "zettel rebuild requested");
    (StatusCode::ACCEPTED, Json(RebuildResponse { queued }))
}

/// POST /zk/ingest
///
/// the body is the raw org document.
pub async fn ingest(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<NoteSummary>), ApiError> {
    let note = state.zettels.ingest(&body).await?;
    info!(id = %note.id, "note ingested");
    Ok((StatusCode::CREATED, Json(NoteSummary::from(&note))))
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub q: String,
}

/// one sse event per chunk; sse data cannot carry bare carriage returns.
fn chunk_event(chunk: &str) -> Event {
    Event::default().data(chunk.replace('\r', ""))
}

/// GET /zk/{id}/chat?q=
pub async fn chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ChatQuery>,
) -> Result<Response, ApiError> {
    let backend = state
        .chat
        .clone()
        .ok_or_else(|| ApiError::unavailable("chat is not configured"))?;
    let question = query.q.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("question is required"));
    }
    let note = state.zettels.get(&id).await?.or_not_found("note not found")?;

    let prompt = ChatPrompt {
        question: question.to_string(),
        title: note.title,
        body: note.body,
        links: state.zettels.links(&id),
        backlinks: state.zettels.backlinks(&id),
    };
    let chunks = backend.stream(prompt).await.map_err(|e| {
        warn!(error = %e, "chat backend failed");
        ApiError::unavailable("chat backend unavailable")
    })?;

    let events = chunks.filter_map(|chunk| async move {
        match chunk {
            Ok(text) => Some(Ok::<_, Infallible>(chunk_event(&text))),
            Err(e) => {
                warn!(error = %e, "chat stream failed");
                None
            }
        }
    });
    Ok(sse(events).into_response())
}

fn sse<S>(events: S) -> impl IntoResponse
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    (
        [(axum::http::header::CACHE_CONTROL, "no-cache")],
        Sse::new(events).keep_alive(KeepAlive::new().interval(KEEPALIVE)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_visibility() {
        assert!(Mount::Public.shows(Access::Public));
        assert!(!Mount::Public.shows(Access::Home));
        assert!(!Mount::Public.shows(Access::Private));

        assert!(Mount::Home.shows(Access::Public));
        assert!(Mount::Home.shows(Access::Home));
        assert!(!Mount::Home.shows(Access::Private));

        assert!(Mount::Admin.shows(Access::Private));
    }

    #[test]
    fn test_mount_paths() {
        assert_eq!(Mount::Public.path(), "/note");
        assert_eq!(Mount::Home.path(), "/home");
        assert_eq!(Mount::Admin.path(), "/zk");
    }
}
