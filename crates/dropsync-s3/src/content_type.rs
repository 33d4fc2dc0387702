//! Content-Type inference for uploaded objects

/// Used when the key has no recognized extension
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Guesses the MIME type of `key` from its filename extension
pub fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .to_string()
}
