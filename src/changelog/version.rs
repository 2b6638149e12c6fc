//! Version token detection in heading text.

use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

/// `major.minor.patch` with optional pre-release and build metadata,
/// optionally prefixed by `v`.
static VERSION_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[vV]?(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?(?:\+[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?",
    )
    .expect("version token pattern compiles")
});

/// All version tokens in `text`, in order of appearance.
///
/// A match only counts when it stands on its own: the character before it
/// may not be alphanumeric or a dot and the text after it may not continue
/// the number (`1.2.3.4`, `1.2.34a`). Brackets, parentheses, `@` and other
/// punctuation around the token are fine, so `[1.2.3]`, `(v2.0.0)` and
/// `pkg@3.1.0` are all detected.
pub fn version_tokens(text: &str) -> Vec<Version> {
    VERSION_TOKEN_RE
        .find_iter(text)
        .filter(|m| {
            let before = text[..m.start()].chars().next_back();
            let mut after = text[m.end()..].chars();
            let next = after.next();
            let clean_before = before.is_none_or(|c| !(c.is_alphanumeric() || c == '.'));
            let clean_after = match next {
                None => true,
                Some('.') => !after.next().is_some_and(|c| c.is_ascii_alphanumeric()),
                Some(c) => !(c.is_alphanumeric() || c == '_'),
            };
            clean_before && clean_after
        })
        .filter_map(|m| {
            let token = m.as_str().trim_start_matches(['v', 'V']);
            Version::parse(token).ok()
        })
        .collect()
}

/// The version a heading announces, if it names exactly one.
///
/// Headings such as "Upgrading from 1.2.3 to 2.0.0" are ambiguous and
/// yield `None`.
pub fn heading_version(text: &str) -> Option<Version> {
    let mut tokens = version_tokens(text);
    if tokens.len() == 1 { tokens.pop() } else { None }
}
