//! Minimal HTTP/1.1 request/response handling for the connection slot (C8).
//!
//! The original parser this one's modeled after borrows straight out of the
//! read buffer with a lifetime tied to a single `parse` call. That doesn't
//! work here: a request can arrive split across several `read()`s, and the
//! buffer compacts and reallocates between them. So this parser copies the
//! handful of fields the dispatcher actually needs (method, path, body) out
//! into owned storage and forgets the rest. Headers beyond `Content-Length`
//! and `Connection` are parsed for their values and then discarded.

use std::fmt;

/// Request method. Only `GET` and `POST` are meaningful to this server;
/// anything else is accepted by the parser and rejected by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Other => "OTHER",
        })
    }
}

/// A fully parsed request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub keep_alive: bool,
    pub body: Vec<u8>,
}

/// Why a request buffer could not be parsed as HTTP/1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The request line isn't `METHOD SP TARGET SP HTTP/1.x CRLF`.
    MalformedRequestLine,
    /// A header line has no `:` separator.
    MalformedHeader,
    /// `Content-Length` isn't a valid non-negative integer.
    BadContentLength,
}

/// Attempts to parse one HTTP/1.1 request out of the front of `buf`.
///
/// Returns `Ok(None)` when the headers, or the body (per `Content-Length`),
/// aren't fully present yet; the caller should read more and retry. Only
/// ever inspects `buf` from the start; callers own draining consumed bytes
/// once parsing succeeds.
pub fn parse_request(buf: &[u8]) -> Result<Option<Request>, ParseError> {
    let header_end = match find_subslice(buf, b"\r\n\r\n") {
        Some(pos) => pos,
        None => return Ok(None),
    };

    let head = &buf[..header_end];
    let mut lines = head.split(|&b| b == b'\n').map(strip_cr);

    let request_line = lines.next().ok_or(ParseError::MalformedRequestLine)?;
    let (method, path) = parse_request_line(request_line)?;

    let mut content_length: usize = 0;
    let mut keep_alive = true; // HTTP/1.1 default

    for line in lines {
        if line.is_empty() {
            continue;
        }
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(ParseError::MalformedHeader)?;
        let name = trim_ascii(&line[..colon]);
        let value = trim_ascii(&line[colon + 1..]);

        if name.eq_ignore_ascii_case(b"content-length") {
            content_length = std::str::from_utf8(value)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or(ParseError::BadContentLength)?;
        } else if name.eq_ignore_ascii_case(b"connection") {
            keep_alive = !value.eq_ignore_ascii_case(b"close");
        }
    }

    let body_start = header_end + 4;
    let body_end = body_start + content_length;
    if buf.len() < body_end {
        return Ok(None);
    }

    Ok(Some(Request {
        method,
        path,
        keep_alive,
        body: buf[body_start..body_end].to_vec(),
    }))
}

/// Total byte length of the request that [`parse_request`] just consumed,
/// so the caller can drain exactly that many bytes from the read buffer.
pub fn consumed_len(buf: &[u8], request: &Request) -> usize {
    let header_end = find_subslice(buf, b"\r\n\r\n").expect("already parsed once");
    header_end + 4 + request.body.len()
}

fn parse_request_line(line: &[u8]) -> Result<(Method, String), ParseError> {
    let mut parts = line.split(|&b| b == b' ').filter(|p| !p.is_empty());
    let method_bytes = parts.next().ok_or(ParseError::MalformedRequestLine)?;
    let target = parts.next().ok_or(ParseError::MalformedRequestLine)?;
    let version = parts.next().ok_or(ParseError::MalformedRequestLine)?;

    if !version.starts_with(b"HTTP/1.") {
        return Err(ParseError::MalformedRequestLine);
    }

    let method = match method_bytes {
        b"GET" => Method::Get,
        b"POST" => Method::Post,
        _ => Method::Other,
    };

    let path = std::str::from_utf8(target)
        .map_err(|_| ParseError::MalformedRequestLine)?
        .to_string();

    Ok((method, path))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn strip_cr(line: &[u8]) -> &[u8] {
    match line.split_last() {
        Some((&b'\r', rest)) => rest,
        _ => line,
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |p| p + 1);
    &bytes[start..end]
}

/// Builds a complete `HTTP/1.1` response with CORS headers and the right
/// `Connection` directive, ready to hand to the connection's write buffer.
pub fn build_response(status_line: &str, content_type: &str, body: &[u8], keep_alive: bool) -> Vec<u8> {
    let connection = if keep_alive { "keep-alive" } else { "close" };
    let mut response = format!(
        "HTTP/1.1 {status_line}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {len}\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Connection: {connection}\r\n\r\n",
        len = body.len(),
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

/// Shorthand for `build_response` with the `application/json` content type
/// every reply in this protocol uses.
pub fn json_response(status_line: &str, body: &[u8], keep_alive: bool) -> Vec<u8> {
    build_response(status_line, "application/json", body, keep_alive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_post_with_body() {
        let raw = b"POST /api/kv HTTP/1.1\r\nContent-Length: 5\r\nConnection: keep-alive\r\n\r\nhello";
        let req = parse_request(raw).unwrap().unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.path, "/api/kv");
        assert!(req.keep_alive);
        assert_eq!(req.body, b"hello");
        assert_eq!(consumed_len(raw, &req), raw.len());
    }

    #[test]
    fn incomplete_body_returns_none() {
        let raw = b"POST /api/kv HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
        assert!(parse_request(raw).unwrap().is_none());
    }

    #[test]
    fn incomplete_headers_returns_none() {
        let raw = b"GET /api/stats HTTP/1.1\r\nHost: x";
        assert!(parse_request(raw).unwrap().is_none());
    }

    #[test]
    fn get_has_no_body_and_defaults_keep_alive() {
        let raw = b"GET /api/stats HTTP/1.1\r\n\r\n";
        let req = parse_request(raw).unwrap().unwrap();
        assert_eq!(req.method, Method::Get);
        assert!(req.body.is_empty());
        assert!(req.keep_alive);
    }

    #[test]
    fn connection_close_is_honored() {
        let raw = b"GET /api/stats HTTP/1.1\r\nConnection: close\r\n\r\n";
        let req = parse_request(raw).unwrap().unwrap();
        assert!(!req.keep_alive);
    }

    #[test]
    fn malformed_request_line_is_error() {
        let raw = b"GARBAGE\r\n\r\n";
        assert_eq!(parse_request(raw), Err(ParseError::MalformedRequestLine));
    }

    #[test]
    fn response_carries_cors_and_connection_headers() {
        let resp = json_response("200 OK", b"{}", true);
        let text = String::from_utf8(resp).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Access-Control-Allow-Origin: *"));
        assert!(text.contains("Connection: keep-alive"));
        assert!(text.ends_with("{}"));
    }
}
