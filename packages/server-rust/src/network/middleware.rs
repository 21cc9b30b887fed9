//! Transport middleware wrapped around every route.
//!
//! Listed outermost first:
//! 1. request id -- a fresh UUID in `x-request-id` for every request
//! 2. tracing -- one span per request, server errors logged as failures
//! 3. body limit -- bodies over `max_body_bytes` answered with 413
//! 4. request id propagation -- the id is echoed on the response
//!
//! There is no transport timeout here; the executor owns invocation
//! deadlines.

use axum::http::header::HeaderName;
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

type HttpTrace = TraceLayer<SharedClassifier<ServerErrorsAsFailures>>;

type AssignId = SetRequestIdLayer<MakeRequestUuid>;

/// Layer stack returned by [`build_http_layers`], innermost first.
type HttpLayers = Stack<
    PropagateRequestIdLayer,
    Stack<RequestBodyLimitLayer, Stack<HttpTrace, Stack<AssignId, Identity>>>,
>;

#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(PropagateRequestIdLayer::new(request_id))
        .into_inner()
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, Bytes};
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;

    fn echo_router(max_body_bytes: usize) -> Router {
        let config = NetworkConfig {
            max_body_bytes,
            ..NetworkConfig::default()
        };
        Router::new()
            .route("/", post(|body: Bytes| async move { body }))
            .layer(axum::extract::DefaultBodyLimit::disable())
            .layer(build_http_layers(&config))
    }

    fn post_body(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-length", body.len())
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn every_response_gets_a_request_id() {
        let response = echo_router(64).oneshot(post_body("ping")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert_eq!(id.len(), 36, "expected a hyphenated UUID, got {id}");
    }

    #[tokio::test]
    async fn caller_supplied_request_id_is_kept() {
        let mut request = post_body("ping");
        request
            .headers_mut()
            .insert(REQUEST_ID_HEADER, "from-caller".parse().unwrap());
        let response = echo_router(64).oneshot(request).await.unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "from-caller");
    }

    #[tokio::test]
    async fn bodies_over_the_limit_are_refused() {
        let response = echo_router(4).oneshot(post_body("too long")).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let response = echo_router(8).oneshot(post_body("8 bytes!")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
