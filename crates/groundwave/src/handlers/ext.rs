//! browser extension api.
//!
//! the extension runs on other origins, so every mutation-shaped call must
//! carry the session's request token in `X-CSRF-Token`.

use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use groundwave_db::Database;
use groundwave_types::{Contact, ContactId, LinkKind};
use groundwave_whatsapp::phone_matches;
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::AppState;
use crate::pow::{csrf_token, csrf_token_matches};
use crate::session::CurrentSession;

/// header carrying the request token.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// reject requests without a valid request token for their session.
pub async fn require_csrf(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let CurrentSession(session) = req
        .extensions()
        .get::<CurrentSession>()
        .ok_or_else(|| ApiError::internal("session layer not installed"))?;
    let presented = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !csrf_token_matches(state.csrf_secret(), &session.id, presented) {
        return Err(ApiError::forbidden("invalid request token"));
    }
    Ok(next.run(req).await)
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// GET /ext/token
pub async fn token(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Json<TokenResponse> {
    Json(TokenResponse {
        token: csrf_token(state.csrf_secret(), &session.id),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LookupRequest {
    pub url: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LinkView {
    pub kind: LinkKind,
    pub icon: &'static str,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ContactMatch {
    pub id: ContactId,
    pub name: String,
    pub links: Vec<LinkView>,
}

/// strip scheme, `www.` and trailing slashes so profile urls compare equal.
fn normalize_url(url: &str) -> String {
    let url = url.trim().to_ascii_lowercase();
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(&url);
    let url = url.strip_prefix("www.").unwrap_or(url);
    url.trim_end_matches('/').to_string()
}

fn matches(contact: &Contact, req: &LookupRequest) -> bool {
    if let Some(url) = req.url.as_deref().map(normalize_url).filter(|u| !u.is_empty())
        && contact.urls.iter().any(|u| normalize_url(u) == url)
    {
        return true;
    }
    if let Some(email) = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
        && contact.emails.iter().any(|e| e.eq_ignore_ascii_case(email))
    {
        return true;
    }
    if let Some(phone) = req.phone.as_deref().filter(|p| !p.trim().is_empty())
        && contact.phones.iter().any(|p| phone_matches(p, phone))
    {
        return true;
    }
    req.name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .is_some_and(|n| contact.name.eq_ignore_ascii_case(n))
}

/// POST /ext/contacts/lookup
pub async fn lookup(
    State(state): State<AppState>,
    Json(req): Json<LookupRequest>,
) -> Result<Json<Vec<ContactMatch>>, ApiError> {
    let contacts = state.db.list_contacts().await?;
    let found = contacts
        .iter()
        .filter(|c| matches(c, &req))
        .map(|c| ContactMatch {
            id: c.id,
            name: c.name.clone(),
            links: c
                .links()
                .into_iter()
                .map(|(kind, url)| LinkView {
                    kind,
                    icon: kind.icon(),
                    url: url.to_string(),
                })
                .collect(),
        })
        .collect();
    Ok(Json(found))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> Contact {
        let mut c = Contact::new(ContactId(1), "Grace Hopper");
        c.urls = vec!["https://www.linkedin.com/in/grace/".to_string()];
        c.emails = vec!["grace@example.com".to_string()];
        c.phones = vec!["+1 650 555 0100".to_string()];
        c
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("HTTPS://www.LinkedIn.com/in/grace/"),
            "linkedin.com/in/grace"
        );
        assert_eq!(normalize_url("github.com/x"), "github.com/x");
    }

    #[test]
    fn test_lookup_matching() {
        let c = contact();
        let by = |req: LookupRequest| matches(&c, &req);

        assert!(by(LookupRequest {
            url: Some("http://linkedin.com/in/grace".to_string()),
            ..Default::default()
        }));
        assert!(by(LookupRequest {
            email: Some("GRACE@example.com".to_string()),
            ..Default::default()
        }));
        assert!(by(LookupRequest {
            phone: Some("16505550100".to_string()),
            ..Default::default()
        }));
        assert!(by(LookupRequest {
            name: Some("grace hopper".to_string()),
            ..Default::default()
        }));
        assert!(!by(LookupRequest::default()));
        assert!(!by(LookupRequest {
            url: Some("https://github.com/grace".to_string()),
            ..Default::default()
        }));
    }
}
