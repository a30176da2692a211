use crate::handler::ResponseContext;
use crate::request::HttpRequest;
use crate::response::{self, HttpResponseBuilder, TYPE_PLAIN};
use crate::router::RouteTable;

/// Wire bytes for exactly one request, plus the connection disposition the
/// event loop applies after flushing them.
pub struct DispatchResult {
    pub bytes: Vec<u8>,
    pub keep_alive: bool,
}

/// Bridges one assembled request to exactly one response.
///
/// Handler errors stop here: they are logged and rendered as an opaque 500,
/// never unwound into the event loop. Transport-level failures are not this
/// function's concern.
pub fn dispatch(request: &HttpRequest, routes: &RouteTable) -> DispatchResult {
    let mut bytes = Vec::new();

    // Protocol courtesy: the interim response goes on the wire ahead of the
    // real one. The request is already fully buffered at this point.
    if request.expects_continue() {
        bytes.extend_from_slice(&response::continue_response());
    }

    let payload = match routes.find_route(&request.method, &request.path) {
        None => HttpResponseBuilder::not_found()
            .header("Content-Type", TYPE_PLAIN)
            .body(b"Not Found".to_vec())
            .build(),
        Some(route) => {
            let mut context = ResponseContext::default();
            match route.handler().handle(request, &mut context) {
                Ok(body) => HttpResponseBuilder::ok()
                    .header("Content-Type", TYPE_PLAIN)
                    .body(body.unwrap_or_default().into_bytes())
                    .build(),
                Err(error) => {
                    tracing::error!(
                        method = %request.method,
                        path = %request.path,
                        error = %error,
                        "handler failed"
                    );
                    HttpResponseBuilder::internal_error()
                        .header("Content-Type", TYPE_PLAIN)
                        .body(b"Error".to_vec())
                        .build()
                }
            }
        }
    };

    bytes.extend_from_slice(&payload);

    DispatchResult {
        bytes,
        keep_alive: request.keep_alive(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::{Handler, HandlerResult};
    use crate::router::Route;
    use crate::utils::{HttpHeaders, HttpMethod};

    fn request(method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest {
            method,
            path: path.to_string(),
            version: "HTTP/1.1".to_string(),
            headers: HttpHeaders::new(),
            body: None,
        }
    }

    fn constant(body: &'static str) -> impl Handler + 'static {
        move |_: &HttpRequest, _: &mut ResponseContext| -> HandlerResult {
            Ok(Some(body.to_string()))
        }
    }

    fn table(routes: Vec<Route>) -> RouteTable {
        let mut t = RouteTable::new();
        for route in routes {
            t.add_route(route);
        }
        t
    }

    struct Parsed {
        status_line: String,
        headers: Vec<(String, String)>,
        body: String,
    }

    fn parse_response(bytes: &[u8]) -> Parsed {
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap().to_string();
        let headers = lines
            .map(|line| {
                let (k, v) = line.split_once(": ").unwrap();
                (k.to_ascii_lowercase(), v.to_string())
            })
            .collect();
        Parsed {
            status_line,
            headers,
            body: body.to_string(),
        }
    }

    fn header<'a>(parsed: &'a Parsed, key: &str) -> &'a str {
        parsed
            .headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap()
    }

    #[test]
    fn success_renders_the_handler_body() {
        let routes = table(vec![Route::new(HttpMethod::GET, "/hello", constant("world"))]);
        let result = dispatch(&request(HttpMethod::GET, "/hello"), &routes);

        let parsed = parse_response(&result.bytes);
        assert_eq!(parsed.status_line, "HTTP/1.1 200 OK");
        assert_eq!(parsed.body, "world");
        assert_eq!(header(&parsed, "content-length"), "5");
        assert_eq!(header(&parsed, "content-type"), TYPE_PLAIN);
        assert_eq!(header(&parsed, "server"), response::SERVER_NAME);
        assert!(httpdate::parse_http_date(header(&parsed, "date")).is_ok());
    }

    #[test]
    fn a_none_body_renders_as_empty() {
        let none_handler =
            |_: &HttpRequest, _: &mut ResponseContext| -> HandlerResult { Ok(None) };
        let routes = table(vec![Route::new(HttpMethod::GET, "/empty", none_handler)]);
        let result = dispatch(&request(HttpMethod::GET, "/empty"), &routes);

        let parsed = parse_response(&result.bytes);
        assert_eq!(parsed.status_line, "HTTP/1.1 200 OK");
        assert_eq!(parsed.body, "");
        assert_eq!(header(&parsed, "content-length"), "0");
    }

    #[test]
    fn unmatched_requests_get_404_not_found() {
        let routes = table(vec![Route::new(HttpMethod::GET, "/hello", constant("world"))]);
        let result = dispatch(&request(HttpMethod::GET, "/missing"), &routes);

        let parsed = parse_response(&result.bytes);
        assert_eq!(parsed.status_line, "HTTP/1.1 404 Not Found");
        assert_eq!(parsed.body, "Not Found");
        assert_eq!(header(&parsed, "content-type"), TYPE_PLAIN);
    }

    #[test]
    fn handler_failures_become_an_opaque_500() {
        let failing = |_: &HttpRequest, _: &mut ResponseContext| -> HandlerResult {
            Err(HandlerError::msg("database credentials rejected"))
        };
        let routes = table(vec![Route::new(HttpMethod::GET, "/fail", failing)]);
        let result = dispatch(&request(HttpMethod::GET, "/fail"), &routes);

        let parsed = parse_response(&result.bytes);
        assert_eq!(parsed.status_line, "HTTP/1.1 500 Internal Server Error");
        assert_eq!(parsed.body, "Error");
        let text = String::from_utf8(result.bytes.clone()).unwrap();
        assert!(!text.contains("database credentials"));
    }

    #[test]
    fn wrapped_source_errors_are_equally_opaque() {
        let failing = |_: &HttpRequest, _: &mut ResponseContext| -> HandlerResult {
            let io = std::io::Error::other("disk offline");
            Err(HandlerError::Source(Box::new(io)))
        };
        let routes = table(vec![Route::new(HttpMethod::GET, "/fail", failing)]);
        let result = dispatch(&request(HttpMethod::GET, "/fail"), &routes);

        let parsed = parse_response(&result.bytes);
        assert_eq!(parsed.body, "Error");
        assert!(!String::from_utf8(result.bytes.clone())
            .unwrap()
            .contains("disk offline"));
    }

    #[test]
    fn keep_alive_follows_the_request_signal() {
        let routes = table(vec![Route::new(HttpMethod::GET, "/hello", constant("world"))]);

        let mut keep = request(HttpMethod::GET, "/hello");
        keep.headers.insert("Connection", "keep-alive");
        assert!(dispatch(&keep, &routes).keep_alive);

        let mut close = request(HttpMethod::GET, "/hello");
        close.headers.insert("Connection", "close");
        assert!(!dispatch(&close, &routes).keep_alive);

        // the handler result has no say in it
        let mut close = request(HttpMethod::GET, "/missing");
        close.headers.insert("Connection", "close");
        assert!(!dispatch(&close, &routes).keep_alive);
    }

    #[test]
    fn continue_expectation_gets_the_interim_response_first() {
        let routes = table(vec![Route::new(HttpMethod::POST, "/upload", constant("ok"))]);
        let mut req = request(HttpMethod::POST, "/upload");
        req.headers.insert("Expect", "100-continue");

        let result = dispatch(&req, &routes);
        let text = String::from_utf8(result.bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 100 Continue\r\n\r\n"));
        let rest = &text["HTTP/1.1 100 Continue\r\n\r\n".len()..];
        assert!(rest.starts_with("HTTP/1.1 200 OK\r\n"));
        // exactly one final response follows the interim one
        assert_eq!(rest.matches("HTTP/1.1").count(), 1);
    }

    // The end-to-end scenario from the routing contract: first-registered
    // route wins, misses render 404.
    #[test]
    fn hello_world_scenario() {
        let routes = table(vec![Route::new(HttpMethod::GET, "/hello", constant("world"))]);

        let result = dispatch(&request(HttpMethod::GET, "/hello"), &routes);
        let parsed = parse_response(&result.bytes);
        assert_eq!(parsed.body, "world");
        assert_eq!(header(&parsed, "content-length"), "5");

        let result = dispatch(&request(HttpMethod::GET, "/missing"), &routes);
        assert_eq!(parse_response(&result.bytes).body, "Not Found");

        let routes = table(vec![
            Route::new(HttpMethod::GET, "/hello", constant("world")),
            Route::new(HttpMethod::GET, "/hello", constant("other")),
        ]);
        let result = dispatch(&request(HttpMethod::GET, "/hello"), &routes);
        assert_eq!(parse_response(&result.bytes).body, "world");
    }
}
