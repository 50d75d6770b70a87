//! Header helpers shared by the request filters.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderMap;
use http::header::AUTHORIZATION;

/// Returns a header as a trimmed string, or `None` if it is missing, not
/// visible ASCII, empty, or longer than `max_len`.
pub fn normalized_header_value(headers: &HeaderMap, name: &str, max_len: usize) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    if value.is_empty() || value.len() > max_len {
        return None;
    }
    Some(value.to_string())
}

/// Extracts the username from an HTTP Basic `Authorization` header.
pub fn basic_auth_username(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credentials) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(credentials.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let username = decoded.split(':').next()?;

    if username.is_empty() {
        None
    } else {
        Some(username.to_string())
    }
}
