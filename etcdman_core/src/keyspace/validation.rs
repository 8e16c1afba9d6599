use crate::errors::{Error, Result};

/// Maximum key length, counted in characters.
pub const MAX_KEY_LENGTH: usize = 1024;
/// Maximum value size in bytes (1 MiB).
pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Keys are non-empty absolute paths of at most [`MAX_KEY_LENGTH`] chars.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::Validation("key cannot be empty".into()));
    }
    if !key.starts_with('/') {
        return Err(Error::Validation("key must start with '/'".into()));
    }
    if key.chars().count() > MAX_KEY_LENGTH {
        return Err(Error::Validation(format!(
            "key exceeds maximum length of {MAX_KEY_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_value(value: &str) -> Result<()> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(Error::Validation(format!(
            "value size {} bytes exceeds maximum of {MAX_VALUE_SIZE} bytes (1MB)",
            value.len()
        )));
    }
    Ok(())
}

/// Turn a user supplied listing prefix into `/…/` form.
///
/// An empty prefix lists the root.
pub fn normalize_prefix(prefix: &str) -> Result<String> {
    if prefix.is_empty() {
        return Ok("/".to_owned());
    }
    validate_key(prefix)?;
    let mut normalized = prefix.to_owned();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys() {
        assert!(validate_key("/a").is_ok());
        assert!(validate_key("/").is_ok());
        assert!(matches!(validate_key(""), Err(Error::Validation(_))));
        assert!(validate_key("a/b")
            .unwrap_err()
            .to_string()
            .contains("must start with '/'"));

        let at_limit = format!("/{}", "é".repeat(MAX_KEY_LENGTH - 1));
        assert!(validate_key(&at_limit).is_ok(), "length is counted in chars");
        let over = format!("/{}", "x".repeat(MAX_KEY_LENGTH));
        assert!(validate_key(&over).is_err());
    }

    #[test]
    fn values() {
        assert!(validate_value("").is_ok());
        assert!(validate_value(&"x".repeat(MAX_VALUE_SIZE)).is_ok());
        assert!(validate_value(&"x".repeat(MAX_VALUE_SIZE + 1))
            .unwrap_err()
            .to_string()
            .contains("exceeds maximum"));
    }

    #[test]
    fn prefixes_always_end_with_slash() {
        assert_eq!(normalize_prefix("").unwrap(), "/");
        assert_eq!(normalize_prefix("/").unwrap(), "/");
        assert_eq!(normalize_prefix("/app").unwrap(), "/app/");
        assert_eq!(normalize_prefix("/app/").unwrap(), "/app/");
        assert!(normalize_prefix("app").is_err());
    }
}
