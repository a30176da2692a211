use crate::error::HandlerError;
use crate::request::HttpRequest;

pub type HandlerResult = Result<Option<String>, HandlerError>;

/// Slot handed to every handler next to the request. Reserved for response
/// customization (status overrides, extra headers); carries nothing yet.
#[derive(Debug, Default)]
pub struct ResponseContext {}

/// A registered route's capability: turn a request into a textual body
/// (`Ok(None)` for an intentionally empty one) or fail with a domain error.
pub trait Handler: Send + Sync {
    fn handle(&self, request: &HttpRequest, response: &mut ResponseContext) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&HttpRequest, &mut ResponseContext) -> HandlerResult + Send + Sync,
{
    fn handle(&self, request: &HttpRequest, response: &mut ResponseContext) -> HandlerResult {
        self(request, response)
    }
}
