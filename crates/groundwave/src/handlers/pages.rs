//! minimal html shells.
//!
//! the real templates live with the frontend; these pages carry just the
//! data the scripts need.

use axum::response::Html;
use chrono::{DateTime, Utc};
use groundwave_db::SessionRecord;
use groundwave_org::escape_html;

use crate::zettel::NoteSummary;

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{} · groundwave</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    ))
}

pub fn login() -> Html<String> {
    layout(
        "Sign in",
        "<main id=\"login\" data-start=\"/webauthn/login/start\" \
         data-finish=\"/webauthn/login/finish\">\n<h1>Sign in</h1>\n\
         <button type=\"button\" id=\"passkey-login\">Sign in with a passkey</button>\n</main>",
    )
}

pub fn setup() -> Html<String> {
    layout(
        "Setup",
        "<main id=\"setup\" data-start=\"/setup/start\" data-finish=\"/setup/finish\">\n\
         <h1>Welcome</h1>\n<p>Create the administrator account.</p>\n\
         <input name=\"display_name\" required>\n\
         <button type=\"button\" id=\"passkey-register\">Create passkey</button>\n</main>",
    )
}

pub fn invite(token: &str) -> Html<String> {
    let token = escape_html(token);
    layout(
        "Join",
        &format!(
            "<main id=\"invite\" data-start=\"/invite/{token}/start\" \
             data-finish=\"/invite/{token}/finish\">\n<h1>You have been invited</h1>\n\
             <input name=\"display_name\" required>\n\
             <button type=\"button\" id=\"passkey-register\">Create passkey</button>\n</main>"
        ),
    )
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// the security page: sessions plus the sensitive access countdown.
pub fn security(
    sessions: &[SessionRecord],
    current_id: &str,
    sensitive_expires_at: Option<DateTime<Utc>>,
    prompt_unlock: bool,
) -> Html<String> {
    let mut rows = String::new();
    for s in sessions {
        let current = if s.id == current_id {
            " <strong>(this device)</strong>"
        } else {
            ""
        };
        rows.push_str(&format!(
            "<li data-session=\"{id}\">{device} · {ip} · last active {last}{current}\n\
             <form method=\"post\" action=\"/security/sessions/{id}/revoke\">\
             <button>Revoke</button></form></li>\n",
            id = escape_html(&s.id),
            device = escape_html(&s.device),
            ip = escape_html(&s.ip),
            last = timestamp(s.last_activity_at),
        ));
    }

    let expires = sensitive_expires_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_default();
    let prompt = if prompt_unlock {
        "<p class=\"notice\">This action needs sensitive access. Unlock to continue.</p>\n"
    } else {
        ""
    };

    layout(
        "Security",
        &format!(
            "<main id=\"security\">\n<h1>Security</h1>\n{prompt}\
             <section id=\"sensitive\" data-expires-at=\"{expires}\">\n\
             <button type=\"button\" id=\"sensitive-unlock\">Unlock sensitive access</button>\n\
             <form method=\"post\" action=\"/sensitive/lock\"><button>Lock</button></form>\n\
             </section>\n<h2>Sessions</h2>\n<ul>\n{rows}</ul>\n\
             <form method=\"post\" action=\"/security/sessions/revoke-others\">\
             <button>Sign out all other sessions</button></form>\n</main>"
        ),
    )
}

/// a rendered note.
pub fn note(title: &str, html: &str) -> Html<String> {
    layout(
        title,
        &format!(
            "<article class=\"zettel\">\n<h1>{}</h1>\n{}\n</article>",
            escape_html(title),
            html
        ),
    )
}

/// the zettel index.
pub fn zettel_index(notes: &[NoteSummary]) -> Html<String> {
    let items: String = notes
        .iter()
        .map(|n| {
            format!(
                "<li><a href=\"/zk/{}\">{}</a></li>\n",
                escape_html(&n.id),
                escape_html(&n.title)
            )
        })
        .collect();
    layout(
        "Zettelkasten",
        &format!("<main id=\"zk\">\n<h1>Zettelkasten</h1>\n<ul>\n{items}</ul>\n</main>"),
    )
}
