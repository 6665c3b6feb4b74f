//! The plain listener answering every request with one status code.

use axum::{
    Router,
    response::{IntoResponse, Response},
};
use http::{StatusCode, header};

use crate::metrics::MetricsLayer;

pub(crate) fn router(status: StatusCode) -> Router {
    Router::new()
        .fallback(move || async move { fixed_response(status) })
        .layer(MetricsLayer::new("fallback"))
}

fn fixed_response(status: StatusCode) -> Response {
    // Renders as "404 Not Found", or just the code when it has no reason phrase.
    let body = match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    };

    (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}
