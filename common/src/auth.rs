//! Bearer token gate shared by the HTTP router and the serverless handler.
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing authentication token")]
    MissingToken,
    #[error("Invalid authentication token")]
    InvalidToken,
}

/// Extracts the token from an `Authorization` header value.
///
/// Both `Bearer <token>` and a bare `<token>` are accepted. Returns `None` for an absent,
/// blank, or scheme-only header.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let token = match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    };

    (!token.is_empty()).then_some(token)
}

/// Checks an `Authorization` header value against the configured token.
pub fn authorize(header: Option<&str>, expected: &str) -> Result<(), AuthError> {
    let token = bearer_token(header).ok_or(AuthError::MissingToken)?;

    if token == expected {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}
