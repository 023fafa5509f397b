//! Internal helpers for input normalization.
//!
//! These utilities are **not** part of the public API. They centralize
//! the cleanup applied to names, slugs and passwords before they reach the
//! store.

use chrono::Utc;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{EngineError, ResultEngine};

/// Trim a required display name, rejecting blank input.
pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidCategory(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Passwords are compared and stored without surrounding whitespace.
pub(crate) fn normalize_password(value: &str) -> String {
    value.trim().to_string()
}

/// URL-safe slug for `input`.
///
/// Accents are stripped through NFKD decomposition, letters are lower-cased,
/// whitespace runs become a single `-`. Anything that is not alphanumeric,
/// `-` or `_` is dropped. If nothing survives the current Unix time in
/// milliseconds is used so the slug is never empty.
pub(crate) fn slugify(input: &str) -> String {
    let mut out = String::new();
    let mut pending_dash = false;
    for ch in input.trim().nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_whitespace() {
            pending_dash = !out.is_empty();
            continue;
        }
        if !(ch.is_alphanumeric() || ch == '-' || ch == '_') {
            continue;
        }
        if pending_dash {
            out.push('-');
            pending_dash = false;
        }
        out.extend(ch.to_lowercase());
    }

    if out.is_empty() {
        return Utc::now().timestamp_millis().to_string();
    }
    out
}

/// Slug from an explicit value, or derived from the name when blank.
pub(crate) fn slug_or_name(slug: &str, name: &str) -> String {
    if slug.trim().is_empty() {
        slugify(name)
    } else {
        slugify(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_basics() {
        assert_eq!(slugify("Travel Notes"), "travel-notes");
        assert_eq!(slugify("  Diary   2024 "), "diary-2024");
        assert_eq!(slugify("Café crème"), "cafe-creme");
        assert_eq!(slugify("a/b?c*d"), "abcd");
        assert_eq!(slugify("already-a_slug"), "already-a_slug");
    }

    #[test]
    fn slug_never_empty() {
        let slug = slugify("?!*");
        assert!(!slug.is_empty());
        assert!(slug.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn slug_prefers_explicit_value() {
        assert_eq!(slug_or_name("", "My Trips"), "my-trips");
        assert_eq!(slug_or_name("trips", "My Trips"), "trips");
    }

    #[test]
    fn names_and_passwords() {
        assert_eq!(normalize_required_name(" Diary ", "category").unwrap(), "Diary");
        assert!(normalize_required_name("   ", "category").is_err());
        assert_eq!(normalize_password("  secret "), "secret");
        assert_eq!(normalize_password("   "), "");
    }
}
