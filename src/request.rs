use crate::error::ParseError;
use crate::utils::{HttpHeaders, HttpMethod};

/// Fully-assembled inbound request. Handlers receive this by shared
/// reference only; nothing the parser produced is dropped on the way in.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Raw request-target as received, query string included. Route matching
    /// is an exact comparison against this string.
    pub path: String,
    pub version: String,
    pub headers: HttpHeaders,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Connection disposition, derived from the request alone: an explicit
    /// `Connection` header wins, otherwise HTTP/1.1 defaults to keep-alive.
    pub fn keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(value) if value.eq_ignore_ascii_case("close") => false,
            Some(value) if value.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version == "HTTP/1.1",
        }
    }

    pub fn expects_continue(&self) -> bool {
        self.headers
            .get("expect")
            .is_some_and(|value| value.eq_ignore_ascii_case("100-continue"))
    }

    pub fn query_string(&self) -> Option<&str> {
        self.path.split_once('?').map(|(_, query)| query)
    }

    /// Percent-decoded `key=value` pairs from the query string.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let Some(query) = self.query_string() else {
            return Vec::new();
        };
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(key, value)| {
                (
                    urlencoding::decode(key).map_or_else(|_| key.to_string(), |k| k.into_owned()),
                    urlencoding::decode(value)
                        .map_or_else(|_| value.to_string(), |v| v.into_owned()),
                )
            })
            .collect()
    }
}

#[derive(Debug)]
enum ParserState {
    ParsingHeaders,
    ParsingBody { body_start: usize, body_type: BodyType },
    Complete,
}

#[derive(Debug)]
enum BodyType {
    ContentLength(usize),
    Chunked,
    None,
}

/// Incremental request assembler. Socket reads are appended as they arrive;
/// `get` yields the request only once the message is complete.
#[derive(Debug)]
pub struct HttpRequestBuilder {
    buffer: Vec<u8>,
    state: ParserState,
    request: Option<HttpRequest>,
    max_size: usize,
}

impl HttpRequestBuilder {
    pub fn new(max_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            state: ParserState::ParsingHeaders,
            request: None,
            max_size,
        }
    }

    pub fn append(&mut self, data: &[u8]) -> Result<(), ParseError> {
        if self.buffer.len() + data.len() > self.max_size {
            return Err(ParseError::TooLarge(self.max_size));
        }
        self.buffer.extend_from_slice(data);

        match &self.state {
            ParserState::ParsingHeaders => {
                if let Some((headers_end, delimiter_len)) = self.find_headers_end() {
                    self.parse_headers(headers_end, delimiter_len)?;
                }
            }
            ParserState::ParsingBody { .. } => {
                self.parse_body()?;
            }
            ParserState::Complete => {}
        }

        Ok(())
    }

    fn find_headers_end(&self) -> Option<(usize, usize)> {
        if let Some(pos) = self.buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            return Some((pos, 4));
        }

        if let Some(pos) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            return Some((pos, 2));
        }

        None
    }

    fn parse_headers(&mut self, headers_end: usize, delimiter_len: usize) -> Result<(), ParseError> {
        let headers_section = &self.buffer[..headers_end];
        let s = String::from_utf8_lossy(headers_section);
        let mut lines = s.lines();

        let request_line = lines.next().ok_or(ParseError::MissingRequestLine)?;
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        let mut headers = HttpHeaders::new();
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            if let Some((key, value)) = line.split_once(':') {
                headers.insert(key, value);
            }
        }

        let body_type = Self::determine_body_type(&headers);

        self.request = Some(HttpRequest {
            method: HttpMethod::from_str(parts[0]),
            path: parts[1].to_string(),
            version: parts[2].to_string(),
            headers,
            body: None,
        });

        self.state = ParserState::ParsingBody {
            body_start: headers_end + delimiter_len,
            body_type,
        };

        self.parse_body()?;

        Ok(())
    }

    fn determine_body_type(headers: &HttpHeaders) -> BodyType {
        if let Some(transfer_encoding) = headers.get("transfer-encoding") {
            if transfer_encoding.to_lowercase().contains("chunked") {
                return BodyType::Chunked;
            }
        }

        if let Some(content_length) = headers.get("content-length") {
            if let Ok(length) = content_length.trim().parse::<usize>() {
                return BodyType::ContentLength(length);
            }
        }

        BodyType::None
    }

    fn parse_body(&mut self) -> Result<(), ParseError> {
        let (body_start, body_type) = match &self.state {
            ParserState::ParsingBody {
                body_start,
                body_type,
            } => (*body_start, body_type),
            _ => return Ok(()),
        };

        match body_type {
            BodyType::None => {
                self.state = ParserState::Complete;
                Ok(())
            }
            BodyType::ContentLength(expected) => {
                let expected = *expected;
                let available = self.buffer.len().saturating_sub(body_start);
                if available >= expected {
                    let body = self.buffer[body_start..body_start + expected].to_vec();
                    if let Some(req) = self.request.as_mut() {
                        req.body = if expected == 0 { None } else { Some(body) };
                    }
                    self.state = ParserState::Complete;
                }
                Ok(())
            }
            BodyType::Chunked => self.parse_chunked_body(body_start),
        }
    }

    // Re-walks the chunk list from the start of the body on every call;
    // chunked uploads here are small enough that the rescan does not matter.
    fn parse_chunked_body(&mut self, body_start: usize) -> Result<(), ParseError> {
        let mut body_data = Vec::new();
        let mut pos = body_start;

        loop {
            let chunk_header_end = self.buffer[pos..]
                .windows(2)
                .position(|w| w == b"\r\n")
                .map(|p| pos + p);

            let chunk_header_end = match chunk_header_end {
                Some(end) => end,
                None => return Ok(()), // need more data for the chunk size line
            };

            let chunk_size_str = String::from_utf8_lossy(&self.buffer[pos..chunk_header_end]);
            let chunk_size_str = chunk_size_str.split(';').next().unwrap_or("").trim();
            let chunk_size = usize::from_str_radix(chunk_size_str, 16)
                .map_err(|_| ParseError::InvalidChunkSize)?;

            pos = chunk_header_end + 2;

            if chunk_size == 0 {
                // last chunk; wait for its trailing CRLF
                if self.buffer.len() >= pos + 2 {
                    if let Some(req) = self.request.as_mut() {
                        req.body = Some(body_data);
                    }
                    self.state = ParserState::Complete;
                }
                return Ok(());
            }

            if self.buffer.len() < pos + chunk_size + 2 {
                return Ok(()); // need the full chunk plus its CRLF
            }

            body_data.extend_from_slice(&self.buffer[pos..pos + chunk_size]);
            pos += chunk_size + 2;
        }
    }

    pub fn done(&self) -> bool {
        matches!(self.state, ParserState::Complete)
    }

    pub fn get(&self) -> Option<&HttpRequest> {
        if self.done() { self.request.as_ref() } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 64 * 1024;

    fn parse(raw: &[u8]) -> HttpRequestBuilder {
        let mut builder = HttpRequestBuilder::new(LIMIT);
        builder.append(raw).unwrap();
        builder
    }

    #[test]
    fn assembles_a_simple_get() {
        let builder = parse(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let request = builder.get().unwrap();
        assert_eq!(request.method, HttpMethod::GET);
        assert_eq!(request.path, "/hello");
        assert_eq!(request.version, "HTTP/1.1");
        assert_eq!(request.headers.get("host").unwrap(), "localhost");
        assert!(request.body.is_none());
    }

    #[test]
    fn incomplete_request_is_not_surfaced() {
        let builder = parse(b"GET /hello HTTP/1.1\r\nHost: loc");
        assert!(!builder.done());
        assert!(builder.get().is_none());
    }

    #[test]
    fn assembles_across_arbitrary_append_boundaries() {
        let raw = b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let mut builder = HttpRequestBuilder::new(LIMIT);
        for byte in raw {
            builder.append(std::slice::from_ref(byte)).unwrap();
        }
        let request = builder.get().unwrap();
        assert_eq!(request.body.as_deref(), Some(b"hello".as_slice()));
    }

    #[test]
    fn content_length_body_starts_after_the_header_terminator() {
        let builder = parse(b"POST /echo HTTP/1.1\r\nContent-Length: 4\r\n\r\nabcd");
        let request = builder.get().unwrap();
        assert_eq!(request.body.as_deref(), Some(b"abcd".as_slice()));
    }

    #[test]
    fn assembles_a_chunked_body() {
        let raw = b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
                    4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
        let builder = parse(raw);
        let request = builder.get().unwrap();
        assert_eq!(request.body.as_deref(), Some(b"Wikipedia".as_slice()));
    }

    #[test]
    fn rejects_a_bad_chunk_size() {
        let raw = b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n";
        let mut builder = HttpRequestBuilder::new(LIMIT);
        assert_eq!(builder.append(raw), Err(ParseError::InvalidChunkSize));
    }

    #[test]
    fn rejects_a_malformed_request_line() {
        let mut builder = HttpRequestBuilder::new(LIMIT);
        let err = builder.append(b"GET /hello\r\n\r\n").unwrap_err();
        assert_eq!(err, ParseError::InvalidRequestLine);
    }

    #[test]
    fn enforces_the_size_limit() {
        let mut builder = HttpRequestBuilder::new(16);
        let err = builder
            .append(b"POST /upload HTTP/1.1\r\nContent-Length: 9999\r\n\r\n")
            .unwrap_err();
        assert_eq!(err, ParseError::TooLarge(16));
    }

    #[test]
    fn keep_alive_defaults_follow_the_version() {
        let with = |raw: &[u8]| {
            let builder = parse(raw);
            builder.get().unwrap().keep_alive()
        };
        assert!(with(b"GET / HTTP/1.1\r\n\r\n"));
        assert!(!with(b"GET / HTTP/1.0\r\n\r\n"));
        assert!(!with(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n"));
        assert!(with(b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n"));
    }

    #[test]
    fn detects_the_continue_expectation() {
        let builder = parse(b"POST / HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 0\r\n\r\n");
        assert!(builder.get().unwrap().expects_continue());
        let builder = parse(b"GET / HTTP/1.1\r\n\r\n");
        assert!(!builder.get().unwrap().expects_continue());
    }

    #[test]
    fn query_params_are_percent_decoded() {
        let builder = parse(b"GET /search?q=hello%20world&lang=fr HTTP/1.1\r\n\r\n");
        let request = builder.get().unwrap();
        assert_eq!(request.path, "/search?q=hello%20world&lang=fr");
        assert_eq!(request.query_string(), Some("q=hello%20world&lang=fr"));
        assert_eq!(
            request.query_params(),
            vec![
                ("q".to_string(), "hello world".to_string()),
                ("lang".to_string(), "fr".to_string()),
            ]
        );
    }
}
