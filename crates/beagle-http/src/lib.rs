//! # beagle-http
//!
//! HTTP layer for the Beagle server. Provides the framework-neutral
//! [`HttpRequest`] and [`HttpResponse`] types, conversion from and into Axum,
//! and the [`Middleware`] pipeline that security components plug into.

pub mod middleware;
pub mod request;
pub mod response;

pub use middleware::{HandlerFuture, Middleware, MiddlewarePipeline, ViewHandler};
pub use request::{HttpRequest, HttpRequestBuilder};
pub use response::{HttpResponse, JsonResponse};
