//! org to html rendering.
//!
//! covers the subset of org that shows up in zettels: headings, paragraphs,
//! plain lists, src/example/quote blocks, rules and inline markup. there is
//! no syntax highlighting; code is escaped and wrapped as-is.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use crate::OrgError;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"\]\[]+"#).expect("valid url regex"));

static ORDERED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)][ \t]+(.*)$").expect("valid list regex"));

/// characters allowed directly before an emphasis marker.
const PRE_MARKUP: &str = " \t-({'\"";
/// characters allowed directly after a closing emphasis marker.
const POST_MARKUP: &str = " \t-.,:!?;'\")}[";

/// escape text for use in html element content and attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            ListKind::Unordered => "ul",
            ListKind::Ordered => "ol",
        }
    }
}

/// block-level state while walking lines.
struct Renderer<'a> {
    base_path: &'a str,
    out: String,
    paragraph: Vec<String>,
    list: Option<(ListKind, Vec<String>)>,
}

impl<'a> Renderer<'a> {
    fn new(base_path: &'a str) -> Self {
        Self {
            base_path,
            out: String::new(),
            paragraph: Vec::new(),
            list: None,
        }
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let text = self.paragraph.join(" ");
        self.paragraph.clear();
        let _ = writeln!(
            self.out,
            "<p>{}</p>",
            render_inline(&text, self.base_path)
        );
    }

    fn flush_list(&mut self) {
        let Some((kind, items)) = self.list.take() else {
            return;
        };
        let _ = write!(self.out, "<{}>", kind.tag());
        for item in items {
            let _ = write!(self.out, "<li>{}</li>", render_inline(&item, self.base_path));
        }
        let _ = writeln!(self.out, "</{}>", kind.tag());
    }

    fn flush(&mut self) {
        self.flush_paragraph();
        self.flush_list();
    }

    fn push_item(&mut self, kind: ListKind, text: &str) {
        self.flush_paragraph();
        match &mut self.list {
            Some((current, items)) if *current == kind => items.push(text.to_string()),
            _ => {
                self.flush_list();
                self.list = Some((kind, vec![text.to_string()]));
            }
        }
    }

    fn continue_item(&mut self, text: &str) -> bool {
        match &mut self.list {
            Some((_, items)) => {
                if let Some(last) = items.last_mut() {
                    last.push(' ');
                    last.push_str(text);
                }
                true
            }
            None => false,
        }
    }
}

/// render an org document to html.
///
/// `id:` links are rewritten to `<base_path>/<id>`. whitespace-only input is
/// returned unchanged.
pub fn parse_to_html(body: &str, base_path: &str) -> Result<String, OrgError> {
    if body.trim().is_empty() {
        return Ok(body.to_string());
    }

    let lines: Vec<&str> = body.lines().collect();
    let mut r = Renderer::new(base_path);
    let mut i = 0;

    while i < lines.len() {
        let raw = lines[i];
        let line = raw.trim();

        if line.is_empty() {
            r.flush();
            i += 1;
            continue;
        }

        // property drawers carry metadata only
        if line.eq_ignore_ascii_case(":PROPERTIES:") {
            r.flush();
            while i < lines.len() && !lines[i].trim().eq_ignore_ascii_case(":END:") {
                i += 1;
            }
            i += 1;
            continue;
        }

        if let Some(kind) = block_kind(line) {
            r.flush();
            let start = i;
            let end_marker = format!("#+end_{}", kind);
            let mut content = Vec::new();
            i += 1;
            loop {
                let Some(l) = lines.get(i) else {
                    return Err(OrgError::UnterminatedBlock {
                        kind,
                        line: start + 1,
                    });
                };
                if l.trim().to_ascii_lowercase().starts_with(&end_marker) {
                    break;
                }
                content.push(*l);
                i += 1;
            }
            i += 1;
            render_block(&mut r, &kind, &content);
            continue;
        }

        // other #+KEYWORD lines and comments are not rendered
        if line.starts_with("#+") || line == "#" || line.starts_with("# ") {
            i += 1;
            continue;
        }

        if let Some(level) = heading_level(raw) {
            r.flush();
            let text = raw[level..].trim();
            let tag = level.min(6);
            let _ = writeln!(
                r.out,
                "<h{tag}>{}</h{tag}>",
                render_inline(text, base_path)
            );
            i += 1;
            continue;
        }

        if line.len() >= 5 && line.chars().all(|c| c == '-') {
            r.flush();
            r.out.push_str("<hr>\n");
            i += 1;
            continue;
        }

        if let Some(rest) = line.strip_prefix(": ").or_else(|| (line == ":").then_some("")) {
            r.flush();
            let mut fixed = vec![rest];
            i += 1;
            while let Some(next) = lines.get(i).map(|l| l.trim()) {
                match next.strip_prefix(": ").or_else(|| (next == ":").then_some("")) {
                    Some(more) => fixed.push(more),
                    None => break,
                }
                i += 1;
            }
            let _ = writeln!(
                r.out,
                "<pre class=\"example\">{}</pre>",
                escape_html(&fixed.join("\n"))
            );
            continue;
        }

        if let Some(item) = unordered_item(line) {
            r.push_item(ListKind::Unordered, item);
            i += 1;
            continue;
        }

        if let Some(caps) = ORDERED_ITEM_RE.captures(line) {
            let text = caps.get(1).map_or("", |m| m.as_str());
            r.push_item(ListKind::Ordered, text);
            i += 1;
            continue;
        }

        // indented text directly after an item continues that item
        if raw.starts_with([' ', '\t']) && r.paragraph.is_empty() && r.continue_item(line) {
            i += 1;
            continue;
        }

        r.flush_list();
        r.paragraph.push(line.to_string());
        i += 1;
    }

    r.flush();
    Ok(r.out)
}

/// lowercased block kind for `#+BEGIN_<kind>` lines.
fn block_kind(line: &str) -> Option<String> {
    let lower = line.to_ascii_lowercase();
    let rest = lower.strip_prefix("#+begin_")?;
    let kind: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect();
    if kind.is_empty() { None } else { Some(kind) }
}

fn render_block(r: &mut Renderer<'_>, kind: &str, content: &[&str]) {
    match kind {
        "quote" => {
            let mut inner = Renderer::new(r.base_path);
            for line in content {
                let line = line.trim();
                if line.is_empty() {
                    inner.flush_paragraph();
                } else {
                    inner.paragraph.push(line.to_string());
                }
            }
            inner.flush_paragraph();
            let _ = writeln!(r.out, "<blockquote>\n{}</blockquote>", inner.out);
        }
        // src, example, verse, export and anything unknown keep their text verbatim
        _ => {
            let _ = writeln!(
                r.out,
                "<pre><code class=\"code-block\">{}</code></pre>",
                escape_html(&content.join("\n"))
            );
        }
    }
}

/// number of leading stars when the line is a heading (`** text`).
fn heading_level(line: &str) -> Option<usize> {
    let stars = line.bytes().take_while(|&b| b == b'*').count();
    if stars == 0 {
        return None;
    }
    match line.as_bytes().get(stars) {
        Some(b' ') | Some(b'\t') => Some(stars),
        _ => None,
    }
}

fn unordered_item(line: &str) -> Option<&str> {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("+ "))
        .map(str::trim_start)
}

/// join a mount path and note id without doubling slashes.
fn join_base(base_path: &str, id: &str) -> String {
    format!("{}/{}", base_path.trim_end_matches('/'), id)
}

/// schemes a rendered link may point at; anything else renders as text.
const SAFE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// the href for a link target, or none when its scheme is not allowed.
/// relative paths and fragments pass through.
fn resolve_href(target: &str, base_path: &str) -> Option<String> {
    if let Some(id) = target.strip_prefix("id:") {
        return Some(join_base(base_path, id.trim()));
    }
    // browsers skip whitespace and control characters when reading a scheme
    let squashed: String = target
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect();
    let scheme_end = squashed.find(|c: char| matches!(c, ':' | '/' | '?' | '#'));
    match scheme_end {
        Some(i) if squashed.as_bytes()[i] == b':' => {
            let scheme = squashed[..i].to_ascii_lowercase();
            SAFE_SCHEMES
                .contains(&scheme.as_str())
                .then(|| target.trim().to_string())
        }
        _ => Some(target.trim().to_string()),
    }
}

/// render inline content: links first, then emphasis inside the gaps.
fn render_inline(text: &str, base_path: &str) -> String {
    let mut out = String::new();
    let mut rest = text;

    while let Some(start) = rest.find("[[") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("]]") else {
            break;
        };
        out.push_str(&render_text(&rest[..start]));

        let inner = &after[..end];
        let (target, desc) = match inner.split_once("][") {
            Some((t, d)) => (t, d),
            None => (inner, inner),
        };
        match resolve_href(target, base_path) {
            Some(href) => {
                let _ = write!(
                    out,
                    "<a href=\"{}\">{}</a>",
                    escape_html(&href),
                    render_markup(desc)
                );
            }
            None => out.push_str(&render_markup(desc)),
        }
        rest = &after[end + 2..];
    }

    out.push_str(&render_text(rest));
    out
}

/// plain text with bare urls turned into anchors.
fn render_text(text: &str) -> String {
    let mut out = String::new();
    let mut last = 0;
    for m in URL_RE.find_iter(text) {
        out.push_str(&render_markup(&text[last..m.start()]));
        let url = m.as_str();
        let _ = write!(
            out,
            "<a href=\"{}\">{}</a>",
            escape_html(url),
            escape_html(url)
        );
        last = m.end();
    }
    out.push_str(&render_markup(&text[last..]));
    out
}

fn markup_tag(marker: char) -> Option<(&'static str, &'static str)> {
    match marker {
        '*' => Some(("<b>", "</b>")),
        '/' => Some(("<i>", "</i>")),
        '_' => Some(("<span style=\"text-decoration: underline;\">", "</span>")),
        '+' => Some(("<del>", "</del>")),
        '=' => Some(("<code class=\"verbatim\">", "</code>")),
        '~' => Some(("<code class=\"inline-code\">", "</code>")),
        _ => None,
    }
}

/// emphasis markup. verbatim and code spans are escaped but not nested.
fn render_markup(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some((open, close)) = markup_tag(c)
            && let Some(end) = find_closing(&chars, i)
        {
            let inner: String = chars[i + 1..end].iter().collect();
            out.push_str(open);
            if c == '=' || c == '~' {
                out.push_str(&escape_html(&inner));
            } else {
                out.push_str(&render_markup(&inner));
            }
            out.push_str(close);
            i = end + 1;
            continue;
        }
        out.push_str(&escape_html(&c.to_string()));
        i += 1;
    }
    out
}

/// index of the marker closing the span opened at `open`, if the org
/// boundary rules allow one.
fn find_closing(chars: &[char], open: usize) -> Option<usize> {
    let marker = chars[open];
    if open > 0 && !PRE_MARKUP.contains(chars[open - 1]) {
        return None;
    }
    let first = *chars.get(open + 1)?;
    if first.is_whitespace() {
        return None;
    }
    (open + 2..chars.len()).find(|&j| {
        chars[j] == marker
            && !chars[j - 1].is_whitespace()
            && chars.get(j + 1).is_none_or(|n| POST_MARKUP.contains(*n))
    })
}
