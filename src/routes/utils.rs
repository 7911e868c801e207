use axum::http::{HeaderMap, StatusCode};

use super::auth::AuthService;

#[inline]
pub fn validate_auth_token(headers: HeaderMap, service: &AuthService) -> Result<i64, StatusCode> {
    let jwt_header_token = match headers.get("Authorization").map(|token| token.to_str()) {
        Some(Ok(token)) => token,
        _ => {
            return Err(StatusCode::UNAUTHORIZED);
        }
    };
    //validate our token
    match service.verify_token(jwt_header_token) {
        Ok(user) => Ok(user),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

#[inline]
pub fn check_username(username: &str) -> Result<(), Box<dyn std::error::Error>> {
    if username.len() < 3 {
        return Err("Username must be at least 3 characters".into());
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("Username can only contain letters, numbers, and underscore".into());
    }
    Ok(())
}

#[inline]
pub fn check_password(password: &str) -> Result<(), Box<dyn std::error::Error>> {
    if password.len() < 6 {
        return Err("Password must be at least 6 characters".into());
    }
    Ok(())
}

#[inline]
pub fn check_phone(phone: &str) -> Result<(), Box<dyn std::error::Error>> {
    if phone.len() != 10 || !phone.bytes().all(|b| b.is_ascii_digit()) {
        return Err("Enter a valid 10-digit phone number".into());
    }
    Ok(())
}
