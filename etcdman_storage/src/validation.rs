//! Input checks applied before a profile ever reaches memory or disk.

use url::Url;

use crate::errors::VaultError;

pub const MAX_NAME_LENGTH: usize = 50;

/// Names are 1..=50 characters of `[A-Za-z0-9_-]`.
pub fn validate_name(name: &str) -> Result<(), VaultError> {
    if name.is_empty() {
        return Err(VaultError::Validation(
            "connection name cannot be empty".into(),
        ));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(VaultError::Validation(format!(
            "connection name exceeds maximum length of {MAX_NAME_LENGTH} characters"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(VaultError::Validation(format!(
            "connection name contains invalid character '{bad}', only alphanumeric, '-', and '_' allowed"
        )));
    }
    Ok(())
}

/// An endpoint is an absolute `http`/`https` URL with a host.
pub fn validate_endpoint(endpoint: &str) -> Result<(), VaultError> {
    if endpoint.is_empty() {
        return Err(VaultError::Validation("endpoint cannot be empty".into()));
    }
    let parsed = Url::parse(endpoint).map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase => VaultError::Validation(format!(
            "endpoint must use http or https scheme, got: {endpoint}"
        )),
        url::ParseError::EmptyHost => {
            VaultError::Validation("endpoint must include a host".into())
        }
        other => VaultError::Validation(format!("invalid endpoint URL format: {other}")),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(VaultError::Validation(format!(
            "endpoint must use http or https scheme, got: {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(VaultError::Validation("endpoint must include a host".into()));
    }
    Ok(())
}

pub fn validate_endpoints(endpoints: &[String]) -> Result<(), VaultError> {
    if endpoints.is_empty() {
        return Err(VaultError::Validation(
            "at least one endpoint is required".into(),
        ));
    }
    endpoints.iter().try_for_each(|e| validate_endpoint(e))
}
