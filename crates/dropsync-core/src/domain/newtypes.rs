//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for the two user-supplied
//! path values that frame a pass: the source root inside the drive and the
//! destination key prefix inside the bucket. Each newtype normalizes its
//! input at construction time so the rest of the code never re-checks it.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// KeyPrefix
// ============================================================================

/// Destination key namespace owned by dropsync
///
/// Normalized to have no leading slash and, when non-empty, exactly one
/// trailing slash. The empty prefix is valid and means keys are the bare
/// relative paths.
///
/// Everything under the prefix is subject to deletion when it has no source
/// counterpart, so the prefix is also the safety boundary of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct KeyPrefix(String);

impl KeyPrefix {
    /// Normalizes a raw prefix. Never fails.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim().trim_start_matches('/').trim_end_matches('/');
        if trimmed.is_empty() {
            Self(String::new())
        } else {
            Self(format!("{trimmed}/"))
        }
    }

    /// The empty prefix (whole bucket)
    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if `key` falls inside this prefix
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        key.starts_with(&self.0)
    }
}

impl Display for KeyPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for KeyPrefix {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&str> for KeyPrefix {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<KeyPrefix> for String {
    fn from(prefix: KeyPrefix) -> Self {
        prefix.0
    }
}

// ============================================================================
// SourceRoot
// ============================================================================

/// Root folder of the mirrored drive subtree (must start with /)
///
/// Stored without a trailing slash, except for the drive root itself which
/// is `/`. Paths in the drive are case-insensitive, so matching against the
/// root ignores case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceRoot(String);

impl SourceRoot {
    /// Create a new SourceRoot
    ///
    /// A missing leading slash is added; trailing slashes are removed.
    ///
    /// # Errors
    /// Returns error if the path is empty, contains `//` or a `..` component
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidSourcePath(
                "Source path must not be empty".to_string(),
            ));
        }

        let mut normalized = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        while normalized.len() > 1 && normalized.ends_with('/') {
            normalized.pop();
        }

        if normalized.contains("//") {
            return Err(DomainError::InvalidSourcePath(format!(
                "Source path contains invalid double slashes: {path}"
            )));
        }

        if normalized.split('/').any(|c| c == "..") {
            return Err(DomainError::InvalidSourcePath(format!(
                "Source path contains invalid traversal: {path}"
            )));
        }

        Ok(Self(normalized))
    }

    /// The drive root "/"
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path as expected by list APIs where the drive root is the empty string
    #[must_use]
    pub fn as_api_path(&self) -> &str {
        if self.is_root() {
            ""
        } else {
            &self.0
        }
    }

    /// Returns `absolute` relative to this root, forward-slash separated and
    /// without a leading slash.
    ///
    /// Component comparison ignores case. A path outside the root is
    /// returned whole, minus its leading slash. The root itself yields an
    /// empty string.
    #[must_use]
    pub fn relative_path(&self, absolute: &str) -> String {
        let path_parts: Vec<&str> = absolute.split('/').filter(|c| !c.is_empty()).collect();
        let root_parts: Vec<&str> = self.0.split('/').filter(|c| !c.is_empty()).collect();

        let under_root = path_parts.len() >= root_parts.len()
            && root_parts
                .iter()
                .zip(&path_parts)
                .all(|(r, p)| r.to_lowercase() == p.to_lowercase());

        if under_root {
            path_parts[root_parts.len()..].join("/")
        } else {
            absolute.trim_start_matches('/').to_string()
        }
    }
}

impl Display for SourceRoot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SourceRoot {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SourceRoot> for String {
    fn from(root: SourceRoot) -> Self {
        root.0
    }
}
