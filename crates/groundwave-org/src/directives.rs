//! directive and property extraction.
//!
//! these work on the raw org source and never render anything.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::OrgError;

static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":ID:\s+([a-f0-9-]+)").expect("valid id regex"));

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^#\+TITLE:[ \t]*(.+?)[ \t]*$").expect("valid title regex"));

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\*+[ \t]+(.+?)[ \t]*$").expect("valid heading regex"));

static PUBLIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^#\+access:[ \t]*public[ \t]*$").expect("valid access regex")
});

static HOME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^#\+access:[ \t]*home[ \t]*$").expect("valid access regex"));

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^#\+DATE:[ \t]*[<\[]?(\d{4}-\d{2}-\d{2})").expect("valid date regex")
});

static ID_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[id:([a-f0-9-]+)\]").expect("valid id link regex"));

/// title used when a note has neither `#+TITLE:` nor a heading.
pub const UNTITLED: &str = "Untitled Note";

/// visibility of a zettel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Access {
    /// admin only
    #[default]
    Private,
    /// any authenticated user
    Home,
    /// anyone, no login
    Public,
}

impl Access {
    /// stable lowercase name, used for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Private => "private",
            Access::Home => "home",
            Access::Public => "public",
        }
    }

    /// parse the storage name back; unknown values are private.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "public" => Access::Public,
            "home" => Access::Home,
            _ => Access::Private,
        }
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// find the first `:ID:` property value.
pub fn extract_id(body: &str) -> Result<String, OrgError> {
    ID_RE
        .captures(body)
        .map(|c| c[1].to_string())
        .ok_or(OrgError::MissingId)
}

/// the note title: `#+TITLE:`, else the first heading, else [`UNTITLED`].
pub fn extract_title(body: &str) -> String {
    if let Some(c) = TITLE_RE.captures(body) {
        return c[1].to_string();
    }
    if let Some(c) = HEADING_RE.captures(body) {
        return c[1].to_string();
    }
    UNTITLED.to_string()
}

/// true when the note carries `#+access: public`.
pub fn is_public_access(body: &str) -> bool {
    PUBLIC_RE.is_match(body)
}

/// true when the note carries `#+access: home`.
pub fn is_home_access(body: &str) -> bool {
    HOME_RE.is_match(body)
}

/// access level of a note; public wins over home when both are present.
pub fn extract_access(body: &str) -> Access {
    if is_public_access(body) {
        Access::Public
    } else if is_home_access(body) {
        Access::Home
    } else {
        Access::Private
    }
}

/// parse the first `#+DATE:` directive as utc midnight.
pub fn extract_date_directive(body: &str) -> Option<DateTime<Utc>> {
    let caps = DATE_RE.captures(body)?;
    let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// validate a note id: 10..=100 chars of lowercase hex and hyphens.
pub fn validate_uuid(s: &str) -> Result<(), OrgError> {
    let len_ok = (10..=100).contains(&s.len());
    let chars_ok = !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b) || b == b'-');
    if len_ok && chars_ok {
        Ok(())
    } else {
        Err(OrgError::InvalidUuid(s.to_string()))
    }
}

/// every `[[id:...]]` target in document order, without duplicates.
pub fn extract_id_links(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ID_LINK_RE
        .captures_iter(body)
        .map(|c| c[1].to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const NOTE: &str = "\
:PROPERTIES:
:ID:       075915aa-f7b9-499c-9858-8167d6b1e11b
:END:
#+TITLE: Antenna notes
#+DATE: <2024-03-09 Sat>
#+access: Public

* First heading
See [[id:11111111-2222-3333-4444-555555555555][dipole]] and
[[id:aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee]] and again
[[id:11111111-2222-3333-4444-555555555555][dipole]].
";

    #[test]
    fn test_extract_id() {
        assert_eq!(
            extract_id(NOTE).unwrap(),
            "075915aa-f7b9-499c-9858-8167d6b1e11b"
        );
        assert_eq!(extract_id("* no id here"), Err(OrgError::MissingId));
    }

    #[test]
    fn test_extract_id_stops_at_uppercase() {
        // only lowercase hex is part of the id
        assert_eq!(extract_id(":ID: abc123XYZ").unwrap(), "abc123");
    }

    #[test]
    fn test_extract_title_prefers_directive() {
        assert_eq!(extract_title(NOTE), "Antenna notes");
    }

    #[test]
    fn test_extract_title_falls_back_to_heading() {
        assert_eq!(extract_title("text\n** Deep heading  \nmore"), "Deep heading");
    }

    #[test]
    fn test_extract_title_untitled() {
        assert_eq!(extract_title("just a paragraph"), UNTITLED);
        // bold text at line start is not a heading
        assert_eq!(extract_title("*bold* words"), UNTITLED);
    }

    #[test]
    fn test_access_directives() {
        assert!(is_public_access(NOTE));
        assert!(!is_home_access(NOTE));
        assert!(is_home_access("#+ACCESS: home\n"));
        assert!(!is_public_access("text #+access: public"));
        assert_eq!(extract_access("#+access: home"), Access::Home);
        assert_eq!(extract_access("nothing"), Access::Private);
    }

    #[test]
    fn test_access_round_trip_names() {
        for access in [Access::Private, Access::Home, Access::Public] {
            assert_eq!(Access::from_str_lossy(access.as_str()), access);
        }
        assert_eq!(Access::from_str_lossy("bogus"), Access::Private);
    }

    #[test]
    fn test_extract_date_directive() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
        assert_eq!(extract_date_directive(NOTE), Some(expected));
        assert_eq!(
            extract_date_directive("#+date: 2023-12-31"),
            Some(Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap())
        );
        assert_eq!(extract_date_directive("#+DATE: someday"), None);
        assert_eq!(extract_date_directive("#+DATE: 2023-02-30"), None);
    }

    #[test]
    fn test_validate_uuid_examples() {
        assert!(validate_uuid("075915aa-f7b9-499c-9858-8167d6b1e11b").is_ok());
        assert!(validate_uuid("TOO-SHORT").is_err());
        assert!(validate_uuid(&"a".repeat(101)).is_err());
        assert!(validate_uuid(&"a".repeat(100)).is_ok());
        assert!(validate_uuid(&"a".repeat(10)).is_ok());
        assert!(validate_uuid(&"a".repeat(9)).is_err());
        assert!(validate_uuid("075915aa-F7B9-499c-9858").is_err());
        assert!(validate_uuid("075915aa f7b9 499c").is_err());
    }

    #[test]
    fn test_validate_uuid_matches_definition() {
        let alphabet = ['a', 'f', '0', '9', '-', 'g', 'A', ' ', 'é'];
        for len in [0usize, 9, 10, 11, 50, 100, 101] {
            for &c in &alphabet {
                let s: String = std::iter::repeat_n(c, len).collect();
                let expected = (10..=100).contains(&s.len())
                    && !s.is_empty()
                    && s.chars().all(|c| matches!(c, 'a'..='f' | '0'..='9' | '-'));
                assert_eq!(validate_uuid(&s).is_ok(), expected, "input {:?}", s);
            }
        }
    }

    #[test]
    fn test_extract_id_links_dedups_in_order() {
        assert_eq!(
            extract_id_links(NOTE),
            vec![
                "11111111-2222-3333-4444-555555555555".to_string(),
                "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee".to_string(),
            ]
        );
    }
}
