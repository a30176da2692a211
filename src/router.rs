use crate::handler::Handler;
use crate::utils::HttpMethod;

/// A registered (method, path, handler) binding. Immutable once built.
pub struct Route {
    method: HttpMethod,
    path: String,
    handler: Box<dyn Handler>,
}

impl Route {
    pub fn new(
        method: HttpMethod,
        path: impl Into<String>,
        handler: impl Handler + 'static,
    ) -> Self {
        Route {
            method,
            path: path.into(),
            handler: Box::new(handler),
        }
    }

    pub fn method(&self) -> &HttpMethod {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }
}

/// Ordered route collection. Registration happens before the server starts
/// accepting; after that the table is only ever read.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        RouteTable { routes: Vec::new() }
    }

    /// Appends. Duplicates are not rejected; `find_route` keeps preferring
    /// the earlier registration.
    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// First registered route whose method and path both match exactly.
    /// Case-sensitive, no normalization, query string included.
    pub fn find_route(&self, method: &HttpMethod, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.method == *method && route.path == path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
