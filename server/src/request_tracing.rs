use axum::http::{HeaderName, Request};
use tower::{
    layer::util::{Identity, Stack},
    ServiceBuilder,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{HttpMakeClassifier, MakeSpan, TraceLayer},
};
use tracing::Span;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Opens one span per request carrying the method, uri and request id
#[derive(Debug, Clone, Copy)]
pub struct RequestIdSpan;

impl<B> MakeSpan<B> for RequestIdSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");

        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

pub type RequestTracingLayer = ServiceBuilder<
    Stack<
        PropagateRequestIdLayer,
        Stack<TraceLayer<HttpMakeClassifier, RequestIdSpan>, Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>>,
    >,
>;

/// Assign an `x-request-id` to every request, trace it and echo it back
pub fn trace_with_request_id_layer() -> RequestTracingLayer {
    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdSpan))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    fn router() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(trace_with_request_id_layer())
    }

    #[tokio::test]
    async fn test_request_id_is_assigned() {
        let response = router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response.headers().get(&REQUEST_ID_HEADER).unwrap();
        assert_eq!(id.to_str().unwrap().len(), 36);
    }

    #[tokio::test]
    async fn test_incoming_request_id_is_kept() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[&REQUEST_ID_HEADER], "abc-123");
    }
}
