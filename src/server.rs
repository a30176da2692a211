use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::Shutdown;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::dispatch;
use crate::error::{ParseError, ServerError};
use crate::handler::Handler;
use crate::request::HttpRequestBuilder;
use crate::response::{HttpResponseBuilder, SimpleResponse, TYPE_PLAIN};
use crate::router::{Route, RouteTable};
use crate::utils::HttpMethod;

const SERVER_TOKEN: Token = Token(0);

#[derive(PartialEq, Debug)]
enum Status {
    Read,
    Write,
}

struct SocketStatus {
    status: Status,
    request: HttpRequestBuilder,
    response: Option<SimpleResponse>,
    keep_alive: bool,
    id: Uuid,
}

struct SocketData {
    stream: TcpStream,
    status: SocketStatus,
}

/// One server instance: a config, a route table, and a poll loop. Routes are
/// registered through the consuming `get`/`post` builders, so the table is
/// sealed by the time `start` takes the server and begins accepting.
pub struct WebServer {
    config: ServerConfig,
    routes: RouteTable,
    poll: Poll,
    events: Events,
    listener: Option<TcpListener>,
    connections: HashMap<Token, SocketData>,
    next_token: usize,
}

impl WebServer {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        Ok(Self {
            config,
            routes: RouteTable::new(),
            poll: Poll::new()?,
            events: Events::with_capacity(1024),
            listener: None,
            connections: HashMap::new(),
            next_token: 1,
        })
    }

    /// Registers a GET route.
    pub fn get(mut self, path: &str, handler: impl Handler + 'static) -> Self {
        self.routes
            .add_route(Route::new(HttpMethod::GET, path, handler));
        self
    }

    /// Registers a POST route.
    pub fn post(mut self, path: &str, handler: impl Handler + 'static) -> Self {
        self.routes
            .add_route(Route::new(HttpMethod::POST, path, handler));
        self
    }

    /// Binds the configured address and blocks in the event loop.
    pub fn start(mut self) -> Result<(), ServerError> {
        self.bind()?;
        self.run()
    }

    fn bind(&mut self) -> Result<std::net::SocketAddr, ServerError> {
        let addr = self.config.addr().parse()?;
        let mut listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        self.poll
            .registry()
            .register(&mut listener, SERVER_TOKEN, Interest::READABLE)?;
        self.listener = Some(listener);
        tracing::info!(address = %local_addr, routes = self.routes.len(), "listening");
        Ok(local_addr)
    }

    fn run(&mut self) -> Result<(), ServerError> {
        loop {
            self.poll.poll(&mut self.events, None)?;
            for event in self.events.iter() {
                match event.token() {
                    SERVER_TOKEN => loop {
                        match self.listener.as_ref().unwrap().accept() {
                            Ok((mut stream, peer)) => {
                                let token = Token(self.next_token);
                                self.next_token += 1;
                                self.poll.registry().register(
                                    &mut stream,
                                    token,
                                    Interest::READABLE.add(Interest::WRITABLE),
                                )?;
                                let id = Uuid::new_v4();
                                tracing::debug!(conn = %id, %peer, "accepted connection");
                                let socket_status = SocketStatus {
                                    status: Status::Read,
                                    request: HttpRequestBuilder::new(
                                        self.config.client_max_body_size,
                                    ),
                                    response: None,
                                    keep_alive: false,
                                    id,
                                };
                                self.connections
                                    .insert(token, SocketData { stream, status: socket_status });
                            }
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                            Err(e) => {
                                tracing::warn!(error = %e, "accept failed");
                                break;
                            }
                        }
                    },
                    token => {
                        let closed = match self.connections.get_mut(&token) {
                            Some(socket_data) => Self::handle(
                                socket_data,
                                &self.routes,
                                self.config.client_max_body_size,
                            )
                            .is_none(),
                            None => false,
                        };
                        if closed {
                            if let Some(mut socket_data) = self.connections.remove(&token) {
                                let _ = self.poll.registry().deregister(&mut socket_data.stream);
                                tracing::debug!(conn = %socket_data.status.id, "connection closed");
                            }
                        }
                    }
                }
            }
        }
    }

    /// Drives one connection as far as the socket allows. `None` means the
    /// connection is done (cleanly or not) and must be dropped by the caller.
    fn handle(socket_data: &mut SocketData, routes: &RouteTable, max_size: usize) -> Option<()> {
        let status_ref = &mut socket_data.status;
        loop {
            match status_ref.status {
                Status::Read => {
                    let mut buffer = [0; 2048];
                    // Registrations are edge-triggered: drain until WouldBlock
                    // or the request is complete.
                    loop {
                        match socket_data.stream.read(&mut buffer) {
                            Ok(0) => return None,
                            Ok(n) => {
                                match status_ref.request.append(&buffer[..n]) {
                                    Ok(()) => {}
                                    Err(ParseError::TooLarge(limit)) => {
                                        tracing::warn!(
                                            conn = %status_ref.id,
                                            limit,
                                            "request over the size limit"
                                        );
                                        status_ref.response = Some(SimpleResponse::new(
                                            HttpResponseBuilder::payload_too_large()
                                                .header("Content-Type", TYPE_PLAIN)
                                                .body(b"Payload Too Large".to_vec())
                                                .build(),
                                        ));
                                        status_ref.keep_alive = false;
                                        status_ref.status = Status::Write;
                                        break;
                                    }
                                    Err(error) => {
                                        // Malformed bytes are a transport
                                        // failure: no response, just close.
                                        tracing::warn!(
                                            conn = %status_ref.id,
                                            error = %error,
                                            "malformed request"
                                        );
                                        return None;
                                    }
                                }
                                if status_ref.request.done() {
                                    let request = status_ref.request.get()?;
                                    let result = dispatch::dispatch(request, routes);
                                    tracing::debug!(
                                        conn = %status_ref.id,
                                        method = %request.method,
                                        path = %request.path,
                                        keep_alive = result.keep_alive,
                                        "dispatched"
                                    );
                                    status_ref.keep_alive = result.keep_alive;
                                    status_ref.response = Some(SimpleResponse::new(result.bytes));
                                    status_ref.status = Status::Write;
                                    break;
                                }
                            }
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Some(()),
                            Err(error) => {
                                tracing::debug!(conn = %status_ref.id, error = %error, "read failed");
                                return None;
                            }
                        }
                    }
                    // a response is staged; fall through and try to flush it
                }
                Status::Write => {
                    let response = status_ref.response.as_mut()?;
                    while !response.is_finished() {
                        match socket_data.stream.write(response.peek()) {
                            Ok(0) => return None,
                            Ok(n) => response.advance(n),
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Some(()),
                            Err(error) => {
                                tracing::debug!(conn = %status_ref.id, error = %error, "write failed");
                                return None;
                            }
                        }
                    }
                    if status_ref.keep_alive {
                        status_ref.status = Status::Read;
                        status_ref.request = HttpRequestBuilder::new(max_size);
                        status_ref.response = None;
                        return Some(());
                    }
                    let _ = socket_data.stream.shutdown(Shutdown::Both);
                    return None;
                }
            }
        }
    }
}
