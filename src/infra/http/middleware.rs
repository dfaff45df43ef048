use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{Level, debug, event};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::infra::http::api::middleware::Principal;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id for one request, taken from `x-request-id` or generated.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn request_id_for(request: &Request<Body>) -> String {
    request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Tags the request with an id, echoes it on the response and logs failed requests
/// together with the error chain their handler attached.
pub async fn trace_requests(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request_id_for(&request);
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    if !(status.is_client_error() || status.is_server_error()) {
        debug!(
            target = "surveyor::http",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            request_id = %request_id,
            "request served"
        );
        return response;
    }

    let user = response
        .extensions()
        .get::<Principal>()
        .map(|principal| principal.user.clone())
        .unwrap_or_default();
    let report = response.extensions_mut().remove::<ErrorReport>();
    let detail = report
        .as_ref()
        .map(ErrorReport::summary)
        .unwrap_or("no diagnostic available");
    let origin = report.as_ref().map(|report| report.origin).unwrap_or("unknown");
    let chain = report.as_ref().map(|report| report.chain.as_slice()).unwrap_or(&[]);

    macro_rules! failed {
        ($level:expr, $message:literal) => {
            event!(
                target: "surveyor::http",
                $level,
                status = status.as_u16(),
                method = %method,
                path = %path,
                elapsed_ms,
                origin,
                detail = %detail,
                chain = ?chain,
                request_id = %request_id,
                user = %user,
                $message
            )
        };
    }
    if status.is_server_error() {
        failed!(Level::ERROR, "request failed");
    } else {
        failed!(Level::WARN, "request rejected");
    }

    response
}
