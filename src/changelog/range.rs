//! npm-style semver range expressions.
//!
//! Supported syntax:
//! - comparators `=`, `<`, `<=`, `>`, `>=`, `~`, `^` (operator and version
//!   may be separated by spaces)
//! - bare versions, which mean "exactly" (or "any patch/minor" when partial)
//! - `x`, `X` and `*` wildcards and partial versions (`1`, `1.2`, `1.2.x`)
//! - hyphen ranges `1.2.3 - 2.3.4`
//! - whitespace (or commas) between comparators for AND, `||` for OR
//!
//! Each comparator is handed to [`semver::Comparator`] once normalized, so
//! precedence and pre-release rules are the `semver` crate's.

use std::fmt;

use semver::{Comparator, Version, VersionReq};
use thiserror::Error;

/// Why a range expression could not be parsed.
#[derive(Debug, Error)]
pub enum RangeError {
    #[error("range expression is empty")]
    Empty,
    #[error("invalid comparator `{token}`: {source}")]
    Comparator {
        token: String,
        #[source]
        source: semver::Error,
    },
    #[error("operator `{0}` is not followed by a version")]
    DanglingOperator(String),
    #[error("hyphen range `{0}` is missing a bound")]
    DanglingHyphen(String),
    #[error("wildcard in `{0}` cannot carry a pre-release or build suffix")]
    WildcardSuffix(String),
}

/// A parsed range: any of several AND-groups must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    groups: Vec<VersionReq>,
    raw: String,
}

impl VersionRange {
    /// Parse an npm-style range expression.
    ///
    /// # Errors
    ///
    /// Returns a [`RangeError`] when the expression is blank or any
    /// comparator in it is malformed.
    ///
    /// # Example
    ///
    /// ```
    /// use changelogs::changelog::VersionRange;
    /// use semver::Version;
    ///
    /// let range = VersionRange::parse(">1.0.6 <=3.0.2 || ^5").unwrap();
    /// assert!(range.matches(&Version::new(2, 0, 0)));
    /// assert!(range.matches(&Version::new(5, 4, 0)));
    /// assert!(!range.matches(&Version::new(4, 0, 0)));
    /// ```
    pub fn parse(expr: &str) -> Result<Self, RangeError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(RangeError::Empty);
        }
        let groups = trimmed
            .split("||")
            .map(parse_group)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            groups,
            raw: trimmed.to_string(),
        })
    }

    /// Whether `version` satisfies the range.
    ///
    /// Pre-release versions only match a group that names a pre-release of
    /// the same `major.minor.patch`.
    pub fn matches(&self, version: &Version) -> bool {
        self.groups.iter().any(|group| group.matches(version))
    }

    /// The comparator groups, one per `||` alternative.
    pub fn groups(&self) -> &[VersionReq] {
        &self.groups
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for VersionRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

const OPERATORS: &[&str] = &["<=", ">=", "~>", "==", "<", ">", "=", "~", "^"];

fn is_operator_only(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^'))
}

fn parse_group(group: &str) -> Result<VersionReq, RangeError> {
    let tokens = join_operators(group)?;
    let mut comparators = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        if token == "-" {
            return Err(RangeError::DanglingHyphen(group.trim().to_string()));
        }
        if tokens.get(i + 1).is_some_and(|t| t == "-") {
            let upper = tokens
                .get(i + 2)
                .ok_or_else(|| RangeError::DanglingHyphen(group.trim().to_string()))?;
            comparators.extend(parse_comparator(&format!(">={token}"))?);
            comparators.extend(parse_comparator(&format!("<={upper}"))?);
            i += 3;
            continue;
        }
        comparators.extend(parse_comparator(token)?);
        i += 1;
    }
    Ok(VersionReq { comparators })
}

/// Split a group into comparator tokens, gluing a lone operator to the
/// version that follows it (`>= 1.2.3` -> `>=1.2.3`).
fn join_operators(group: &str) -> Result<Vec<String>, RangeError> {
    let mut tokens = Vec::new();
    let mut pending: Option<&str> = None;
    for token in group
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
    {
        if let Some(op) = pending.take() {
            tokens.push(format!("{op}{token}"));
        } else if is_operator_only(token) {
            pending = Some(token);
        } else {
            tokens.push(token.to_string());
        }
    }
    if let Some(op) = pending {
        return Err(RangeError::DanglingOperator(op.to_string()));
    }
    Ok(tokens)
}

/// Parse one npm comparator into zero or one `semver` comparators.
///
/// Zero means "any version" (`*`, `x`, `>=*`).
fn parse_comparator(token: &str) -> Result<Option<Comparator>, RangeError> {
    let (op, rest) = OPERATORS
        .iter()
        .find_map(|op| token.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("", token));
    let op = match op {
        "" | "==" => "=",
        "~>" => "~",
        other => other,
    };
    let rest = rest.trim_start_matches(['v', 'V', '=']);

    // Build metadata never affects matching.
    let rest = rest.split_once('+').map_or(rest, |(core, _)| core);
    let (core, pre) = rest
        .split_once('-')
        .map_or((rest, None), |(core, pre)| (core, Some(pre)));

    let mut parts = Vec::new();
    let mut wildcard = false;
    for part in core.split('.') {
        if matches!(part, "x" | "X" | "*") {
            wildcard = true;
            break;
        }
        parts.push(part);
    }
    if wildcard && pre.is_some() {
        return Err(RangeError::WildcardSuffix(token.to_string()));
    }

    if parts.is_empty() || parts == [""] {
        return match op {
            // Nothing is below or above "any version".
            "<" | ">" => Ok(Some(semver_comparator(token, "<0.0.0")?)),
            _ => Ok(None),
        };
    }

    let mut normalized = format!("{op}{}", parts.join("."));
    if let Some(pre) = pre {
        normalized.push('-');
        normalized.push_str(pre);
    }
    semver_comparator(token, &normalized).map(Some)
}

fn semver_comparator(token: &str, normalized: &str) -> Result<Comparator, RangeError> {
    Comparator::parse(normalized).map_err(|source| RangeError::Comparator {
        token: token.to_string(),
        source,
    })
}
