//! Single-port transport: gRPC and the HTTP cache share one listener.

use crate::grpc::RegistryService;
use crate::routes::create_router;
use crate::state::AppState;
use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderValue, Version};
use axum::http::header::CONTENT_TYPE;
use axum::body::Body;
use axum::response::Response;
use meshix_proto::MeshixServiceServer;
use std::any::Any;
use std::convert::Infallible;
use std::task::{Context, Poll};
use tower::Service;
use tower::ServiceExt;
use tower::util::Oneshot;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

/// gRPC `INTERNAL`.
const GRPC_STATUS_INTERNAL: &str = "13";

/// True for HTTP/2 requests carrying a gRPC content type.
pub fn is_grpc<B>(req: &axum::http::Request<B>) -> bool {
    req.version() == Version::HTTP_2
        && req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/grpc"))
}

/// Routes each request to the gRPC server or the HTTP router.
#[derive(Clone)]
pub struct Multiplexer {
    http: Router,
    grpc: Router,
}

impl Multiplexer {
    pub fn new(http: Router, grpc: Router) -> Self {
        Self { http, grpc }
    }
}

impl Service<Request> for Multiplexer {
    type Response = Response;
    type Error = Infallible;
    type Future = Oneshot<Router, Request>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // both routers are always ready
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let target = if is_grpc(&req) {
            self.grpc.clone()
        } else {
            self.http.clone()
        };
        target.oneshot(req)
    }
}

/// Turn a panic inside a gRPC handler into a trailers-only `INTERNAL` status.
fn grpc_panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %message, "grpc handler panicked");

    let mut response = Response::new(Body::empty());
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/grpc"));
    headers.insert("grpc-status", HeaderValue::from_static(GRPC_STATUS_INTERNAL));
    headers.insert("grpc-message", HeaderValue::from_static("internal error"));
    response
}

fn catch_grpc_panics() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response> {
    CatchPanicLayer::custom(grpc_panic_response as fn(Box<dyn Any + Send + 'static>) -> Response)
}

/// Build the full application: registry gRPC plus the HTTP cache.
pub fn create_app(state: AppState) -> Router {
    let registry = RegistryService::new(state.registry.clone());
    let grpc = tonic::service::Routes::new(MeshixServiceServer::new(registry))
        .into_axum_router()
        .layer(catch_grpc_panics())
        .layer(TraceLayer::new_for_grpc());
    let http = create_router(state);

    Router::new().fallback_service(Multiplexer::new(http, grpc))
}
