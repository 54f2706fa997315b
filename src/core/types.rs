//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ProjectName`] - Validated project identifier (also its directory name)
//! - [`BranchName`] - Validated Git branch name
//! - [`RemoteName`] - Validated remote name
//! - [`UserId`] - Opaque caller identity
//! - [`Oid`] - Git object identifier (SHA)
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, so the engine never hands an unchecked string
//! to the filesystem or to git.
//!
//! # Examples
//!
//! ```
//! use gitdeck::core::types::{BranchName, Oid, ProjectName};
//!
//! let project = ProjectName::new("demo").unwrap();
//! let branch = BranchName::new("feature/my-branch").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! assert_eq!(oid.short(7), "abc123d");
//!
//! assert!(ProjectName::new("../escape").is_err());
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! # let _ = (project, branch);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid project name: {0}")]
    InvalidProjectName(String),

    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid remote name: {0}")]
    InvalidRemoteName(String),

    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),
}

/// Implements the string-newtype boilerplate shared by all validated names.
macro_rules! string_newtype {
    ($ty:ident) => {
        impl $ty {
            /// Get the value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $ty {
            type Error = TypeError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $ty {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

/// A validated project name.
///
/// The name is the project's identity and the name of its working-tree
/// directory, so it is restricted to a filesystem-safe alphabet:
/// - 1 to 100 characters of `[A-Za-z0-9._-]`
/// - Cannot start with `.` or `-`
///
/// # Example
///
/// ```
/// use gitdeck::core::types::ProjectName;
///
/// assert!(ProjectName::new("my-project_2").is_ok());
/// assert!(ProjectName::new("").is_err());
/// assert!(ProjectName::new(".hidden").is_err());
/// assert!(ProjectName::new("a/b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectName(String);

impl ProjectName {
    /// Maximum length of a project name.
    pub const MAX_LEN: usize = 100;

    /// Create a new validated project name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypeError::InvalidProjectName(
                "project name cannot be empty".into(),
            ));
        }
        if name.len() > Self::MAX_LEN {
            return Err(TypeError::InvalidProjectName(format!(
                "project name cannot exceed {} characters",
                Self::MAX_LEN
            )));
        }
        if name.starts_with('.') || name.starts_with('-') {
            return Err(TypeError::InvalidProjectName(
                "project name cannot start with '.' or '-'".into(),
            ));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(TypeError::InvalidProjectName(format!(
                "project name cannot contain '{}'",
                c.escape_default()
            )));
        }
        Ok(Self(name))
    }
}

string_newtype!(ProjectName);

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
/// - Cannot be exactly `@`
///
/// Remote-tracking branches are represented with their short name,
/// e.g. `origin/main`.
///
/// # Example
///
/// ```
/// use gitdeck::core::types::BranchName;
///
/// let name = BranchName::new("feature/my-branch").unwrap();
/// assert_eq!(name.as_str(), "feature/my-branch");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("branch.lock").is_err());
/// assert!(BranchName::new("has space").is_err());
/// assert!(BranchName::new("@").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        validate_refname_component(&name).map_err(TypeError::InvalidBranchName)?;
        Ok(Self(name))
    }
}

string_newtype!(BranchName);

/// A validated remote name.
///
/// Same rules as branch names, with `/` additionally forbidden so that
/// `<remote>/<branch>` stays unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteName(String);

impl RemoteName {
    /// Create a new validated remote name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.contains('/') {
            return Err(TypeError::InvalidRemoteName(
                "remote name cannot contain '/'".into(),
            ));
        }
        validate_refname_component(&name).map_err(TypeError::InvalidRemoteName)?;
        Ok(Self(name))
    }
}

string_newtype!(RemoteName);

/// An opaque caller identity.
///
/// The engine never interprets user ids beyond keying per-user state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a new user id. Must be non-empty and free of control characters.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TypeError::InvalidUserId("user id cannot be empty".into()));
        }
        if id.chars().any(|c| c.is_control()) {
            return Err(TypeError::InvalidUserId(
                "user id cannot contain control characters".into(),
            ));
        }
        Ok(Self(id))
    }
}

string_newtype!(UserId);

/// Validate against Git's refname component rules.
fn validate_refname_component(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name cannot be empty".into());
    }
    if name == "@" {
        return Err("name cannot be '@' (reserved)".into());
    }
    if name.starts_with('.') || name.starts_with('-') {
        return Err("name cannot start with '.' or '-'".into());
    }
    if name.ends_with(".lock") || name.ends_with('/') {
        return Err("name cannot end with '.lock' or '/'".into());
    }
    for pattern in ["..", "@{", "//"] {
        if name.contains(pattern) {
            return Err(format!("name cannot contain '{pattern}'"));
        }
    }

    const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
    for c in INVALID_CHARS {
        if name.contains(c) {
            return Err(format!("name cannot contain '{c}'"));
        }
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Err("name cannot contain control characters".into());
    }

    for component in name.split('/') {
        if component.starts_with('.') {
            return Err("path component cannot start with '.'".into());
        }
        if component.ends_with(".lock") {
            return Err("path component cannot end with '.lock'".into());
        }
    }

    Ok(())
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use gitdeck::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// The OID is normalized to lowercase.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        // SHA-1 is 40 hex chars, SHA-256 is 64
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    ///
    /// Returns the first `len` characters. If `len` exceeds the OID length,
    /// returns the full OID.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }
}

string_newtype!(Oid);

/// A UTC timestamp, serialized as RFC3339.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Current time.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Build from seconds since the Unix epoch (git's native time format).
    ///
    /// Out-of-range values clamp to the epoch.
    pub fn from_unix(seconds: i64) -> Self {
        Self(chrono::DateTime::from_timestamp(seconds, 0).unwrap_or_default())
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod project_name {
        use super::*;

        #[test]
        fn accepts_safe_names() {
            for name in ["demo", "Demo-2", "a.b_c", "x"] {
                assert!(ProjectName::new(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn rejects_path_like_names() {
            for name in ["", ".", "..", "../x", "a/b", "a\\b", "-flag", ".git", "a b"] {
                assert!(ProjectName::new(name).is_err(), "{name} should be invalid");
            }
        }

        #[test]
        fn rejects_overlong_names() {
            let name = "a".repeat(ProjectName::MAX_LEN + 1);
            assert!(ProjectName::new(name).is_err());
        }

        #[test]
        fn serde_rejects_invalid() {
            let result: Result<ProjectName, _> = serde_json::from_str("\"../x\"");
            assert!(result.is_err());
        }
    }

    mod branch_name {
        use super::*;

        #[test]
        fn valid_names() {
            for name in ["main", "feature/x", "user@feature", "v1.0", "origin/main"] {
                assert!(BranchName::new(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn invalid_names() {
            for name in [
                "", "@", ".x", "-x", "x.lock", "x/", "a..b", "a@{b", "a//b", "a b", "a~b",
                "a^b", "a:b", "a?b", "a*b", "a[b", "a/.b", "a/b.lock",
            ] {
                assert!(BranchName::new(name).is_err(), "{name} should be invalid");
            }
        }

        #[test]
        fn error_names_the_kind() {
            let err = BranchName::new("").unwrap_err();
            assert!(matches!(err, TypeError::InvalidBranchName(_)));
        }
    }

    mod remote_name {
        use super::*;

        #[test]
        fn rejects_slash() {
            assert!(RemoteName::new("origin").is_ok());
            assert!(matches!(
                RemoteName::new("a/b"),
                Err(TypeError::InvalidRemoteName(_))
            ));
        }
    }

    mod user_id {
        use super::*;

        #[test]
        fn rejects_blank_and_control() {
            assert!(UserId::new("alice").is_ok());
            assert!(UserId::new("   ").is_err());
            assert!(UserId::new("a\nb").is_err());
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn normalizes_case() {
            let oid = Oid::new("ABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
            assert_eq!(oid.as_str(), "abcdef0123456789abcdef0123456789abcdef01");
        }

        #[test]
        fn rejects_wrong_length_and_non_hex() {
            assert!(Oid::new("abc").is_err());
            assert!(Oid::new("g".repeat(40)).is_err());
            assert!(Oid::new("a".repeat(64)).is_ok());
        }

        #[test]
        fn short_clamps() {
            let oid = Oid::new("a".repeat(40)).unwrap();
            assert_eq!(oid.short(100).len(), 40);
        }
    }

    #[test]
    fn timestamp_from_unix() {
        let ts = UtcTimestamp::from_unix(0);
        assert_eq!(ts.to_string(), "1970-01-01T00:00:00+00:00");
    }
}
