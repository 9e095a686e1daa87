//! HTTP server integration.
//!
//! [`BeagleApp`] combines the security pipeline from
//! [`SecurityConfiguration::build_pipeline`] with the user endpoints and turns
//! them into an Axum router. Every request runs inside a
//! [`request_span`](beagle_core::logging::request_span) tagged with a fresh
//! request id, which is also returned in the `X-Request-Id` header.
//!
//! Routing happens after the gate: an unknown path is 401 for anonymous
//! callers and 404 only once authenticated.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::response::IntoResponse;
use axum::routing::any;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use beagle_auth::{InMemoryUserStore, SecurityConfiguration};
use beagle_core::logging::request_span;
use beagle_core::{BeagleError, BeagleResult, Settings};
use beagle_http::{HandlerFuture, HttpRequest, HttpResponse, MiddlewarePipeline, ViewHandler};
use http::HeaderValue;

use crate::users::UserService;

/// Largest request body the server reads.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// The Beagle application.
pub struct BeagleApp {
    settings: Settings,
    pipeline: MiddlewarePipeline,
    users: UserService,
}

impl BeagleApp {
    /// Creates the application from settings, the assembled security layer,
    /// and the store the user endpoints write to.
    ///
    /// `store` should be the same store `security` verifies against.
    pub fn new(
        settings: Settings,
        security: &SecurityConfiguration,
        store: InMemoryUserStore,
    ) -> Self {
        Self {
            settings,
            pipeline: security.build_pipeline(),
            users: UserService::new(store, security.password_hasher()),
        }
    }

    /// Returns the application settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the number of middleware in the pipeline.
    pub fn middleware_count(&self) -> usize {
        self.pipeline.len()
    }

    /// Converts the application into an Axum router.
    pub fn into_axum_router(self) -> axum::Router {
        let pipeline = Arc::new(self.pipeline);
        let users = self.users;

        let handler = move |req: Request<Body>| {
            let pipeline = pipeline.clone();
            let users = users.clone();
            let request_id = uuid::Uuid::new_v4().to_string();
            let span = request_span(&request_id, req.method().as_str(), req.uri().path());

            async move {
                let (parts, body) = req.into_parts();
                let mut response = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
                    Ok(bytes) => {
                        let request = HttpRequest::from_axum(parts, bytes.to_vec());
                        let view: ViewHandler = Box::new(move |request: HttpRequest| {
                            let users = users.clone();
                            Box::pin(async move { route(&users, request).await }) as HandlerFuture
                        });
                        pipeline.process(request, &view).await
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "failed to read request body");
                        HttpResponse::bad_request("Request body too large or unreadable.")
                    }
                };
                tracing::debug!(status = response.status().as_u16(), "request finished");

                if let Ok(value) = HeaderValue::from_str(&request_id) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                response.into_response()
            }
            .instrument(span)
        };

        axum::Router::new()
            .route("/", any(handler.clone()))
            .route("/{*path}", any(handler))
            .layer(TraceLayer::new_for_http())
    }

    /// Binds to `settings.bind_address` and serves until the process stops.
    pub async fn run(self) -> BeagleResult<()> {
        let addr = self.settings.bind_address.clone();
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            BeagleError::ImproperlyConfigured(format!("Failed to bind to {addr}: {e}"))
        })?;
        tracing::info!(%addr, middleware = self.pipeline.len(), "beagle server listening");

        axum::serve(listener, self.into_axum_router())
            .await
            .map_err(|e| BeagleError::InternalServerError(format!("Server error: {e}")))
    }
}

impl std::fmt::Debug for BeagleApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeagleApp")
            .field("bind_address", &self.settings.bind_address)
            .field("middleware_count", &self.pipeline.len())
            .finish_non_exhaustive()
    }
}

/// Dispatches a request that passed the security pipeline.
async fn route(users: &UserService, request: HttpRequest) -> BeagleResult<HttpResponse> {
    if request.path() != "/api/user" {
        return Ok(HttpResponse::not_found("Not found."));
    }
    match request.method().as_str() {
        "POST" => users.create(&request).await,
        "PUT" => users.replace(&request).await,
        "GET" => users.current(&request),
        _ => Ok(HttpResponse::not_allowed(&["GET", "POST", "PUT"])),
    }
}
