//! HTTP status handling for the tag store.

use affinity_core::Error;

/// Classes of failed store responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// Missing or invalid token.
    Unauthorized,
    /// Token valid but not allowed to act for this user.
    Forbidden,
    /// User or endpoint does not exist.
    NotFound,
    /// Request rejected as malformed.
    BadRequest,
    /// Too many requests.
    RateLimited,
    /// Server-side failure.
    ServerError,
    /// Anything else.
    Unknown,
}

impl StoreErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 422 => Self::BadRequest,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

/// Convert a failed store response into an affinity Error.
pub fn to_affinity_error(code: StoreErrorCode, endpoint: &str, body: &str) -> Error {
    let detail = if body.trim().is_empty() {
        endpoint.to_string()
    } else {
        format!("{}: {}", endpoint, body.trim())
    };
    match code {
        StoreErrorCode::Unauthorized => Error::Unauthorized(detail),
        StoreErrorCode::Forbidden => Error::Forbidden(detail),
        StoreErrorCode::NotFound => Error::NotFound(detail),
        StoreErrorCode::BadRequest => Error::InvalidInput(detail),
        StoreErrorCode::RateLimited => Error::Store(format!("Rate limited: {}", detail)),
        StoreErrorCode::ServerError => Error::Store(format!("Server error: {}", detail)),
        StoreErrorCode::Unknown => Error::Store(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_from_status() {
        assert_eq!(StoreErrorCode::from_status(401), StoreErrorCode::Unauthorized);
        assert_eq!(StoreErrorCode::from_status(403), StoreErrorCode::Forbidden);
        assert_eq!(StoreErrorCode::from_status(404), StoreErrorCode::NotFound);
        assert_eq!(StoreErrorCode::from_status(422), StoreErrorCode::BadRequest);
        assert_eq!(StoreErrorCode::from_status(429), StoreErrorCode::RateLimited);
        assert_eq!(StoreErrorCode::from_status(503), StoreErrorCode::ServerError);
        assert_eq!(StoreErrorCode::from_status(418), StoreErrorCode::Unknown);
    }

    #[test]
    fn test_to_error_auth() {
        let err = to_affinity_error(StoreErrorCode::Unauthorized, "user_tags/", "bad token");
        assert!(matches!(err, Error::Unauthorized(_)));
        assert!(err.to_string().contains("bad token"));
    }

    #[test]
    fn test_to_error_server_with_empty_body() {
        let err = to_affinity_error(StoreErrorCode::ServerError, "toggle_tag/", "  ");
        assert_eq!(err.to_string(), "Store error: Server error: toggle_tag/");
    }

    #[test]
    fn test_to_error_not_found() {
        let err = to_affinity_error(StoreErrorCode::NotFound, "by_tag/", "");
        assert!(matches!(err, Error::NotFound(_)));
    }
}
