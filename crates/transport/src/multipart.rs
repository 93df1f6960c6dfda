//! Multipart framing
//!
//! Each fragment is
//! `--frame\r\nContent-Type: <ct>\r\nContent-Length: <n>\r\n\r\n<bytes>\r\n`
//! and the body ends with `--frame--\r\n`.

/// Boundary token shared by every fragment
pub const BOUNDARY: &str = "frame";

/// Content type of error fragments
pub const ERROR_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Response `Content-Type` header value
pub fn content_type() -> String {
    format!("multipart/mixed; boundary={}", BOUNDARY)
}

/// Frame one payload
pub fn encode_fragment(content_type: &str, payload: &[u8]) -> Vec<u8> {
    let header = format!(
        "--{}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        content_type,
        payload.len()
    );

    let mut out = Vec::with_capacity(header.len() + payload.len() + 2);
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(b"\r\n");
    out
}

/// Closing delimiter
pub fn encode_terminator() -> Vec<u8> {
    format!("--{}--\r\n", BOUNDARY).into_bytes()
}

/// Plain-text fragment carrying `Error: <message>`
pub fn encode_error(message: &str) -> Vec<u8> {
    encode_fragment(ERROR_CONTENT_TYPE, format!("Error: {}", message).as_bytes())
}
