//! Utility functions

use http::HeaderMap;
use uuid::Uuid;

/// Generate a unique request ID
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string().replace("-", "").to_uppercase()
}

/// Split a comma separated address list, dropping blanks
pub fn parse_address_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render a request for the log: request line, headers, blank line, body
pub fn format_request(method: &str, uri: &str, headers: &HeaderMap, body: &[u8]) -> String {
    let headers = headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k, String::from_utf8_lossy(v.as_bytes())))
        .collect::<Vec<_>>()
        .join("\r\n");

    format!(
        "{} {}\r\n{}\r\n\r\n{}",
        method,
        uri,
        headers,
        String::from_utf8_lossy(body)
    )
}
