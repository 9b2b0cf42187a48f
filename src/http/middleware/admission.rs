//! Admission control middleware.
//! Refuses new work once shutdown has begun.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::lifecycle::gate::AdmissionGate;
use crate::observability::metrics;

/// Outermost layer on the request path.
///
/// Every request either picks up a permit before reaching the handler stack
/// or is answered with 503 right here. The permit is held across the handler
/// and dropped afterwards, which is what the shutdown drain counts.
pub async fn admission_middleware(
    State(gate): State<AdmissionGate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let permit = match gate.try_admit() {
        Some(permit) => permit,
        None => {
            tracing::debug!(
                method = %request.method(),
                path = %request.uri().path(),
                "Rejecting request, shutdown in progress"
            );
            metrics::record_rejected();
            return (StatusCode::SERVICE_UNAVAILABLE, "service is shutting down").into_response();
        }
    };

    metrics::record_admitted(gate.active_requests());
    let response = next.run(request).await;
    drop(permit);
    metrics::record_completed(gate.active_requests());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app(gate: AdmissionGate) -> Router {
        Router::new()
            .route("/", get(|| async { "hello" }))
            .layer(axum::middleware::from_fn_with_state(
                gate,
                admission_middleware,
            ))
    }

    #[tokio::test]
    async fn open_gate_passes_requests_through() {
        let gate = AdmissionGate::new();
        let response = app(gate.clone())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(gate.active_requests(), 0);
    }

    #[tokio::test]
    async fn closed_gate_answers_503() {
        let gate = AdmissionGate::new();
        gate.close();

        let response = app(gate.clone())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"service is shutting down");
        assert_eq!(gate.active_requests(), 0);
    }
}
