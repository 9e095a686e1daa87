//! Middleware framework for the Beagle server.
//!
//! This module provides the [`Middleware`] trait and [`MiddlewarePipeline`].
//! Middleware can intercept a request before it reaches the handler and the
//! response on its way back out.
//!
//! ## Execution Order
//!
//! Requests pass through middleware in the order they were added; responses
//! pass back in reverse order. A middleware that answers a request itself
//! short-circuits the pipeline: later middleware and the handler never run,
//! and only the middleware that already saw the request see the response.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use beagle_core::BeagleResult;

use crate::{HttpRequest, HttpResponse};

/// The future returned by a [`ViewHandler`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = BeagleResult<HttpResponse>> + Send>>;

/// The type for an async route handler used at the end of the pipeline.
pub type ViewHandler = Box<dyn Fn(HttpRequest) -> HandlerFuture + Send + Sync>;

/// A middleware component that can process requests and responses.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use beagle_http::{HttpRequest, HttpResponse, Middleware};
///
/// struct RequireJson;
///
/// #[async_trait]
/// impl Middleware for RequireJson {
///     async fn process_request(&self, request: &mut HttpRequest) -> Option<HttpResponse> {
///         match request.header("content-type") {
///             Some(ct) if ct.starts_with("application/json") => None,
///             _ => Some(HttpResponse::bad_request("Expected JSON.")),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process an incoming request before it reaches the handler.
    ///
    /// Return `Some(HttpResponse)` to short-circuit the pipeline. Return
    /// `None` to let the request continue.
    async fn process_request(&self, request: &mut HttpRequest) -> Option<HttpResponse>;

    /// Process the response on its way out. Called in reverse order.
    async fn process_response(
        &self,
        _request: &HttpRequest,
        response: HttpResponse,
    ) -> HttpResponse {
        response
    }
}

/// An ordered pipeline of middleware components.
///
/// The pipeline is assembled once at startup and then shared read-only
/// between concurrent requests.
pub struct MiddlewarePipeline {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl Default for MiddlewarePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewarePipeline {
    /// Creates a new empty middleware pipeline.
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Adds a middleware to the end of the pipeline.
    pub fn add(&mut self, middleware: impl Middleware + 'static) {
        self.middlewares.push(Box::new(middleware));
    }

    /// Returns the number of middleware components in the pipeline.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns `true` if the pipeline has no middleware components.
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Processes a request through the middleware and the handler.
    ///
    /// 1. Calls `process_request` on each middleware in order. If one returns
    ///    a response, runs `process_response` in reverse on only the
    ///    middleware that already ran, and returns.
    /// 2. Calls the handler with the request as the middleware left it.
    ///    Handler errors become responses via [`HttpResponse::from_error`].
    /// 3. Calls `process_response` on each middleware in reverse order.
    pub async fn process(&self, mut request: HttpRequest, handler: &ViewHandler) -> HttpResponse {
        for (i, mw) in self.middlewares.iter().enumerate() {
            if let Some(response) = mw.process_request(&mut request).await {
                let mut resp = response;
                for j in (0..=i).rev() {
                    resp = self.middlewares[j].process_response(&request, resp).await;
                }
                return resp;
            }
        }

        let response = match handler(request.clone()).await {
            Ok(response) => response,
            Err(error) => {
                if error.status_code() >= 500 {
                    tracing::error!(error = %error, "handler failed");
                } else {
                    tracing::debug!(error = %error, "handler rejected request");
                }
                HttpResponse::from_error(&error)
            }
        };

        let mut resp = response;
        for mw in self.middlewares.iter().rev() {
            resp = mw.process_response(&request, resp).await;
        }
        resp
    }
}

impl std::fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewarePipeline")
            .field("middleware_count", &self.middlewares.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beagle_core::BeagleError;
    use std::sync::{Arc, Mutex};

    struct OrderTracker {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for OrderTracker {
        async fn process_request(&self, _request: &mut HttpRequest) -> Option<HttpResponse> {
            self.log.lock().unwrap().push(format!("req:{}", self.name));
            None
        }

        async fn process_response(
            &self,
            _request: &HttpRequest,
            response: HttpResponse,
        ) -> HttpResponse {
            self.log.lock().unwrap().push(format!("resp:{}", self.name));
            response
        }
    }

    struct ShortCircuitMiddleware;

    #[async_trait]
    impl Middleware for ShortCircuitMiddleware {
        async fn process_request(&self, _request: &mut HttpRequest) -> Option<HttpResponse> {
            Some(HttpResponse::forbidden("Blocked"))
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Tag(&'static str);

    struct TaggingMiddleware;

    #[async_trait]
    impl Middleware for TaggingMiddleware {
        async fn process_request(&self, request: &mut HttpRequest) -> Option<HttpResponse> {
            request.extensions_mut().insert(Tag("seen"));
            None
        }
    }

    fn make_handler() -> ViewHandler {
        Box::new(|_req| Box::pin(async { Ok(HttpResponse::ok("view response")) }))
    }

    #[tokio::test]
    async fn test_pipeline_new_is_empty() {
        let pipeline = MiddlewarePipeline::new();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.len(), 0);
    }

    #[tokio::test]
    async fn test_pipeline_no_middleware() {
        let pipeline = MiddlewarePipeline::new();
        let response = pipeline
            .process(HttpRequest::builder().build(), &make_handler())
            .await;
        assert_eq!(response.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_pipeline_short_circuit_skips_handler() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add(ShortCircuitMiddleware);
        let response = pipeline
            .process(HttpRequest::builder().build(), &make_handler())
            .await;
        assert_eq!(response.status(), http::StatusCode::FORBIDDEN);
        assert_eq!(response.text(), "Blocked");
    }

    #[tokio::test]
    async fn test_pipeline_middleware_ordering() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add(OrderTracker { name: "A", log: log.clone() });
        pipeline.add(OrderTracker { name: "B", log: log.clone() });

        pipeline
            .process(HttpRequest::builder().build(), &make_handler())
            .await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["req:A", "req:B", "resp:B", "resp:A"]
        );
    }

    #[tokio::test]
    async fn test_pipeline_short_circuit_only_unwinds_seen_middleware() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add(OrderTracker { name: "A", log: log.clone() });
        pipeline.add(ShortCircuitMiddleware);
        pipeline.add(OrderTracker { name: "C", log: log.clone() });

        pipeline
            .process(HttpRequest::builder().build(), &make_handler())
            .await;

        assert_eq!(*log.lock().unwrap(), vec!["req:A", "resp:A"]);
    }

    #[tokio::test]
    async fn test_pipeline_handler_sees_extensions() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add(TaggingMiddleware);
        let handler: ViewHandler = Box::new(|req| {
            Box::pin(async move {
                let tag = req.extensions().get::<Tag>().cloned();
                assert_eq!(tag, Some(Tag("seen")));
                Ok(HttpResponse::ok("tagged"))
            })
        });
        let response = pipeline.process(HttpRequest::builder().build(), &handler).await;
        assert_eq!(response.text(), "tagged");
    }

    #[tokio::test]
    async fn test_pipeline_handler_error_becomes_response() {
        let pipeline = MiddlewarePipeline::new();
        let handler: ViewHandler = Box::new(|_req| {
            Box::pin(async { Err(BeagleError::Conflict("already exists".into())) })
        });
        let response = pipeline.process(HttpRequest::builder().build(), &handler).await;
        assert_eq!(response.status(), http::StatusCode::CONFLICT);
    }
}
