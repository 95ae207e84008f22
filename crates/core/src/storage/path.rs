//! Object path conventions.
//!
//! Objects are addressed externally as `/objects/<key>`. The prefix carries no
//! meaning for any backend; it is stripped before a key reaches an adapter.

use super::error::StorageError;

/// Prefix of every externally visible object path.
pub const OBJECTS_PREFIX: &str = "/objects/";

/// Namespace for keys generated by uploads.
pub const UPLOADS_NAMESPACE: &str = "uploads";

/// Canonicalize a raw object reference.
///
/// Already-prefixed paths and absolute `http(s)` URLs pass through unchanged;
/// bare backend keys gain the `/objects/` prefix. Applying this twice yields
/// the same result as applying it once.
#[must_use]
pub fn normalize_object_entity_path(raw: &str) -> String {
    if raw.starts_with(OBJECTS_PREFIX) || is_absolute_url(raw) {
        return raw.to_string();
    }
    format!("{OBJECTS_PREFIX}{}", raw.trim_start_matches('/'))
}

/// Build the external path for a backend key.
#[must_use]
pub fn object_path(key: &str) -> String {
    format!("{OBJECTS_PREFIX}{key}")
}

/// Strip the `/objects/` prefix and validate the remaining backend key.
///
/// Paths without the prefix are treated as bare keys.
pub fn object_key(path: &str) -> Result<&str, StorageError> {
    let key = path.strip_prefix(OBJECTS_PREFIX).unwrap_or(path);
    validate_key(key)?;
    Ok(key)
}

/// Reject keys that could escape a backend namespace or address a directory.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::invalid_key("key is empty"));
    }
    if key.starts_with('/') || key.ends_with('/') {
        return Err(StorageError::invalid_key(format!(
            "key must not start or end with '/': {key}"
        )));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(StorageError::invalid_key(format!(
            "key contains a forbidden character: {key}"
        )));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::invalid_key(format!(
            "key contains an empty or relative segment: {key}"
        )));
    }
    Ok(())
}

/// Content type for a key, inferred from its file extension.
#[must_use]
pub fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key).first_or_octet_stream().to_string()
}

/// Directory-style listing root for a prefix (`""` lists everything).
pub(crate) fn listing_root(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("{trimmed}/")
    }
}

fn is_absolute_url(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/objects/uploads/abc", "/objects/uploads/abc")]
    #[case("uploads/abc", "/objects/uploads/abc")]
    #[case("/uploads/abc", "/objects/uploads/abc")]
    #[case("https://cdn.example.com/a.png", "https://cdn.example.com/a.png")]
    #[case("http://localhost/a.png", "http://localhost/a.png")]
    fn test_normalize_object_entity_path(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_object_entity_path(raw), expected);
    }

    #[test]
    fn test_object_key_strips_prefix() {
        assert_eq!(object_key("/objects/uploads/abc").ok(), Some("uploads/abc"));
        assert_eq!(object_key("uploads/abc").ok(), Some("uploads/abc"));
    }

    #[rstest]
    #[case("")]
    #[case("/objects/")]
    #[case("/objects/../etc/passwd")]
    #[case("uploads/./abc")]
    #[case("uploads//abc")]
    #[case("uploads/")]
    #[case("uploads\\abc")]
    fn test_object_key_rejects_invalid(#[case] path: &str) {
        assert!(matches!(
            object_key(path),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[rstest]
    #[case("photos/cat.jpg", "image/jpeg")]
    #[case("photos/cat.JPEG", "image/jpeg")]
    #[case("icons/logo.svg", "image/svg+xml")]
    #[case("notes/readme.txt", "text/plain")]
    #[case("uploads/550e8400-e29b-41d4-a716-446655440000", "application/octet-stream")]
    fn test_content_type_for(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(content_type_for(key), expected);
    }

    #[test]
    fn test_listing_root() {
        assert_eq!(listing_root(""), "/");
        assert_eq!(listing_root("/"), "/");
        assert_eq!(listing_root("uploads"), "uploads/");
        assert_eq!(listing_root("/uploads/"), "uploads/");
    }
}
