//! Key mapper: source-relative path to destination key

use super::newtypes::KeyPrefix;

/// Maps a source-relative path to its destination key
///
/// Backslashes become forward slashes, then the prefix is prepended.
/// Pure and infallible.
#[must_use]
pub fn key_for(prefix: &KeyPrefix, relative_path: &str) -> String {
    let normalized = relative_path.replace('\\', "/");
    format!("{}{}", prefix.as_str(), normalized)
}
