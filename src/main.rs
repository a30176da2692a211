pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod utils;

use handler::{HandlerResult, ResponseContext};
use request::HttpRequest;
use server::WebServer;
use tracing_subscriber::EnvFilter;

fn index(_request: &HttpRequest, _response: &mut ResponseContext) -> HandlerResult {
    Ok(Some("Hello World".to_string()))
}

fn hello(_request: &HttpRequest, _response: &mut ResponseContext) -> HandlerResult {
    Ok(Some("world".to_string()))
}

fn echo(request: &HttpRequest, _response: &mut ResponseContext) -> HandlerResult {
    let body = request
        .body
        .as_deref()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default();
    Ok(Some(body))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match config::load_config("config.yaml") {
        Ok(cfg) => {
            tracing::info!("configuration loaded from config.yaml");
            cfg
        }
        Err(e) => {
            tracing::debug!(error = %e, "no usable config.yaml, using defaults");
            config::ServerConfig::default()
        }
    };

    let server = match WebServer::new(config) {
        Ok(srv) => srv,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize server");
            return;
        }
    };

    if let Err(e) = server
        .get("/", index)
        .get("/hello", hello)
        .post("/echo", echo)
        .start()
    {
        tracing::error!(error = %e, "server error");
    }
}
