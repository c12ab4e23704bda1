//! Request framing and response extraction.
//!
//! Every instrument operation is a single ASCII line of the form
//! `GET <resource-path>[?<value>]` terminated by a blank line; "set"
//! operations pass the new value as a query-style suffix rather than a
//! body. Responses carry an HTTP-like status line and, for status 200, a
//! JSON payload.

use crate::error::{RgaError, RgaResult};

/// Literal token that anchors the response status line.
const STATUS_TOKEN: &[u8] = b"HTTP/1.1";
/// Status code of a successful exchange.
pub const STATUS_OK: u16 = 200;

/// Build the request for a resource, e.g. `/mmsp/scanInfo/get` or
/// `/mmsp/scanSetup/scanCount/set?-1`.
pub fn request(resource: &str) -> String {
    format!("GET {resource}\r\n\r\n")
}

/// Extract the 3-digit status code from a raw response.
pub fn status_code(response: &[u8]) -> RgaResult<u16> {
    let pos = find_subslice(response, STATUS_TOKEN)
        .ok_or_else(|| RgaError::Frame("status line not found in response".to_string()))?;

    let rest = &response[pos + STATUS_TOKEN.len()..];
    let digits: Vec<u8> = rest
        .iter()
        .copied()
        .skip_while(|b| *b == b' ')
        .take(3)
        .collect();
    if digits.len() != 3 || !digits.iter().all(u8::is_ascii_digit) {
        return Err(RgaError::Frame("malformed status code".to_string()));
    }

    Ok(digits
        .iter()
        .fold(0u16, |code, d| code * 10 + u16::from(d - b'0')))
}

/// Extract the JSON payload of a 200 response.
///
/// The payload is defined as the substring from the first `{` to the last
/// `}`. Brace characters inside string values would break this; the
/// instrument's documents are not known to produce any.
pub fn json_payload(response: &[u8]) -> RgaResult<String> {
    let code = status_code(response)?;
    if code != STATUS_OK {
        return Err(RgaError::HttpStatus(code));
    }

    let start = response
        .iter()
        .position(|b| *b == b'{')
        .ok_or_else(|| RgaError::Frame("no opening brace in payload".to_string()))?;
    let end = response
        .iter()
        .rposition(|b| *b == b'}')
        .ok_or_else(|| RgaError::Frame("no closing brace in payload".to_string()))?;
    if end < start {
        return Err(RgaError::Frame("unbalanced braces in payload".to_string()));
    }

    Ok(String::from_utf8_lossy(&response[start..=end]).into_owned())
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_framing() {
        assert_eq!(
            request("/mmsp/scanInfo/get"),
            "GET /mmsp/scanInfo/get\r\n\r\n"
        );
        assert_eq!(
            request("/mmsp/scanSetup/scanCount/set?-1"),
            "GET /mmsp/scanSetup/scanCount/set?-1\r\n\r\n"
        );
    }

    #[test]
    fn test_payload_extraction() {
        let response = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"data\":{\"x\":1}}";
        assert_eq!(json_payload(response).unwrap(), "{\"data\":{\"x\":1}}");
    }

    #[test]
    fn test_status_code_parsed_after_token() {
        assert_eq!(status_code(b"HTTP/1.1 200 OK\r\n\r\n{}").unwrap(), 200);
        assert_eq!(
            status_code(b"garbage HTTP/1.1 503 Unavailable").unwrap(),
            503
        );
    }

    #[test]
    fn test_missing_status_line() {
        let err = json_payload(b"{\"data\":{}}").unwrap_err();
        assert!(matches!(err, RgaError::Frame(_)));
    }

    #[test]
    fn test_non_200_discards_payload() {
        let err = json_payload(b"HTTP/1.1 404 Not Found\r\n\r\n{\"data\":{}}").unwrap_err();
        assert!(matches!(err, RgaError::HttpStatus(404)));
    }

    #[test]
    fn test_missing_braces() {
        let err = json_payload(b"HTTP/1.1 200 OK\r\n\r\nno json here").unwrap_err();
        assert!(matches!(err, RgaError::Frame(_)));
    }

    #[test]
    fn test_closing_brace_before_opening() {
        let err = json_payload(b"HTTP/1.1 200 OK\r\n}...{").unwrap_err();
        assert!(matches!(err, RgaError::Frame(_)));
    }
}
