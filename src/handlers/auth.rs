use axum::http::HeaderMap;

use crate::errors::{AppError, AppResult};

pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity as set by the upstream auth layer.
pub fn user_id(headers: &HeaderMap) -> AppResult<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)
}

pub fn check_admin(headers: &HeaderMap, expected_token: &str) -> AppResult<()> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_user_id_requires_header() {
        let mut headers = HeaderMap::new();
        assert!(matches!(user_id(&headers), Err(AppError::Unauthorized)));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert!(user_id(&headers).is_err());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("driver-7"));
        assert_eq!(user_id(&headers).unwrap(), "driver-7");
    }

    #[test]
    fn test_check_admin() {
        let mut headers = HeaderMap::new();
        assert!(check_admin(&headers, "secret").is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer wrong"));
        assert!(check_admin(&headers, "secret").is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer secret"));
        assert!(check_admin(&headers, "secret").is_ok());
    }
}
