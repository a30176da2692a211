use std::time::SystemTime;

use crate::utils::HttpHeaders;

/// Fixed literal identifying this implementation in the `Server` header.
pub const SERVER_NAME: &str = "miniweb";
pub const TYPE_PLAIN: &str = "text/plain; charset=UTF-8";

pub struct HttpResponseBuilder {
    status_code: u16,
    status_text: String,
    headers: HttpHeaders,
    body: Vec<u8>,
}

impl HttpResponseBuilder {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        Self {
            status_code,
            status_text: status_text.to_string(),
            headers: HttpHeaders::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Serializes the response. Server, Date and Content-Length are always
    /// stamped here; Content-Length is the exact byte count of the body.
    pub fn build(mut self) -> Vec<u8> {
        self.headers.insert("Server", SERVER_NAME);
        self.headers
            .insert("Date", &httpdate::fmt_http_date(SystemTime::now()));
        self.headers
            .insert("Content-Length", &self.body.len().to_string());

        let mut response = format!("HTTP/1.1 {} {}\r\n", self.status_code, self.status_text);

        for (key, value) in self.headers.iter() {
            response.push_str(&format!("{}: {}\r\n", key, value));
        }

        response.push_str("\r\n");

        let mut bytes = response.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }

    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }

    pub fn internal_error() -> Self {
        Self::new(500, "Internal Server Error")
    }

    pub fn payload_too_large() -> Self {
        Self::new(413, "Payload Too Large")
    }
}

/// Interim response emitted before the final one when the client asked for
/// it with `Expect: 100-continue`. No headers, no body.
pub fn continue_response() -> Vec<u8> {
    b"HTTP/1.1 100 Continue\r\n\r\n".to_vec()
}

/// Outbound byte buffer with a write cursor, drained by the event loop
/// across however many writable rounds the socket needs.
#[derive(Debug)]
pub struct SimpleResponse {
    data: Vec<u8>,
    written: usize,
}

impl SimpleResponse {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, written: 0 }
    }

    pub fn peek(&self) -> &[u8] {
        &self.data[self.written..]
    }

    pub fn advance(&mut self, n: usize) {
        self.written = (self.written + n).min(self.data.len());
    }

    pub fn is_finished(&self) -> bool {
        self.written >= self.data.len()
    }
}
