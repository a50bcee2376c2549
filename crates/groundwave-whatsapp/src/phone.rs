//! phone number matching between whatsapp users and stored contacts.

/// shortest normalised length for which suffix matching is allowed.
pub const MIN_SUFFIX_MATCH_DIGITS: usize = 7;

/// keep only ascii digits.
pub fn normalize_phone(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// whether two phone numbers refer to the same line.
///
/// equal digit strings always match. otherwise one may end with the other,
/// which covers an optional country code, as long as the shorter one has at
/// least [`MIN_SUFFIX_MATCH_DIGITS`] digits.
pub fn phone_matches(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_phone(a), normalize_phone(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    short.len() >= MIN_SUFFIX_MATCH_DIGITS && long.ends_with(short.as_str())
}
