//! external link annotation for rendered html.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// path prefixes served by groundwave itself.
pub const INTERNAL_PREFIXES: [&str; 4] = ["/zk", "/note", "/home", "/groundwave"];

/// marker placed before the content of external anchors.
const EXTERNAL_MARKER: &str = "↗";

const REL_TOKENS: [&str; 2] = ["noopener", "noreferrer"];

static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a(\s[^>]*)?>(.*?)</a\s*>").expect("valid anchor regex"));

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=/>"']+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+)))?"#)
        .expect("valid attribute regex")
});

/// whether an href leaves the site.
///
/// fragment links, internal mounts and urls on the `base_url` origin (under
/// its path) stay in-site. an empty or unparsable `base_url` disables the
/// last check.
pub fn is_external_href(href: &str, base_url: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return false;
    }
    if !href.starts_with("//") && INTERNAL_PREFIXES.iter().any(|p| href.starts_with(p)) {
        return false;
    }
    let Ok(base) = Url::parse(base_url.trim()) else {
        return true;
    };
    // protocol-relative hrefs take the base scheme
    let target = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) if href.starts_with("//") => {
            match base.join(href) {
                Ok(url) => url,
                Err(_) => return true,
            }
        }
        Err(_) => return true,
    };
    !(target.origin() == base.origin() && under_path(target.path(), base.path()))
}

/// segment-wise prefix check; `/app` covers `/app` and `/app/x`, not `/apps`.
fn under_path(path: &str, base: &str) -> bool {
    let base = base.trim_end_matches('/');
    base.is_empty()
        || path == base
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// attributes in source order; values keep their raw (escaped) text.
fn parse_attrs(raw: &str) -> Vec<(String, Option<String>)> {
    ATTR_RE
        .captures_iter(raw)
        .map(|c| {
            let name = c[1].to_string();
            let value = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map(|m| m.as_str().replace('"', "&quot;"));
            (name, value)
        })
        .collect()
}

/// merge the required rel tokens, keeping existing ones and their order.
fn merge_rel(existing: &str) -> String {
    let mut tokens: Vec<String> = Vec::new();
    for t in existing.split_ascii_whitespace() {
        if !tokens.iter().any(|k| k.eq_ignore_ascii_case(t)) {
            tokens.push(t.to_string());
        }
    }
    for t in REL_TOKENS {
        if !tokens.iter().any(|k| k.eq_ignore_ascii_case(t)) {
            tokens.push(t.to_string());
        }
    }
    tokens.join(" ")
}

fn set_attr(attrs: &mut Vec<(String, Option<String>)>, name: &str, value: String) {
    match attrs.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        Some((_, v)) => *v = Some(value),
        None => attrs.push((name.to_string(), Some(value))),
    }
}

/// mark external anchors in rendered html.
///
/// external anchors get `target="_blank"`, `rel` extended with
/// `noopener noreferrer` and a `↗ ` prefix before their content. running it
/// again over its own output changes nothing.
pub fn annotate_external_links(html: &str, base_url: &str) -> String {
    if !html.contains("<a") && !html.contains("<A") {
        return html.to_string();
    }

    ANCHOR_RE
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let raw_attrs = caps.get(1).map_or("", |m| m.as_str());
            let content = &caps[2];
            let mut attrs = parse_attrs(raw_attrs);

            let href = attrs
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case("href"))
                .and_then(|(_, v)| v.clone())
                .unwrap_or_default();
            if !is_external_href(&href, base_url) {
                return caps[0].to_string();
            }

            let rel = attrs
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case("rel"))
                .and_then(|(_, v)| v.clone())
                .unwrap_or_default();
            set_attr(&mut attrs, "target", "_blank".to_string());
            set_attr(&mut attrs, "rel", merge_rel(&rel));

            let mut out = String::from("<a");
            for (name, value) in &attrs {
                match value {
                    Some(v) => {
                        let _ = write!(out, " {}=\"{}\"", name, v);
                    }
                    None => {
                        let _ = write!(out, " {}", name);
                    }
                }
            }
            out.push('>');
            if !content.trim_start().starts_with(EXTERNAL_MARKER) {
                out.push_str(EXTERNAL_MARKER);
                out.push(' ');
            }
            out.push_str(content);
            out.push_str("</a>");
            out
        })
        .into_owned()
}
