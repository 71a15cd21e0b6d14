use crate::server::{ParsedRequest, Response};
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Anything that can answer a request.
///
/// Runs on the connection thread before any response byte is sent.
pub trait Handler: Send + Sync {
    fn handle(&self, req: &ParsedRequest) -> Response;
}

/// Exact-match dispatch table with a fallback handler.
#[derive(Clone)]
pub struct Router {
    routes: HashMap<String, Arc<dyn Handler>>,
    fallback: Arc<dyn Handler>,
}

impl Router {
    pub fn new(fallback: Arc<dyn Handler>) -> Self {
        Self {
            routes: HashMap::new(),
            fallback,
        }
    }

    /// Register `handler` for exactly `path`. A later registration for the
    /// same path replaces the earlier one.
    #[must_use]
    pub fn route(mut self, path: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.routes.insert(path.into(), handler);
        self
    }

    /// Handler for a normalized path (query string already stripped).
    pub fn resolve(&self, path: &str) -> &dyn Handler {
        self.routes
            .get(path)
            .map_or(self.fallback.as_ref(), |h| h.as_ref())
    }

    pub fn has_route(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    pub fn dispatch(&self, req: &ParsedRequest) -> Response {
        if req.method != Method::GET {
            debug!(method = %req.method, path = %req.path, "method not allowed");
            return Response::method_not_allowed(&req.method);
        }
        debug!(path = %req.path, routed = self.has_route(&req.path), "GET request");
        self.resolve(&req.path).handle(req)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut paths: Vec<_> = self.routes.keys().collect();
        paths.sort();
        f.debug_struct("Router").field("routes", &paths).finish()
    }
}
