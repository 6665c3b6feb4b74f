//! Rate limiting middleware for HTTP requests.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::Body,
    response::{IntoResponse, Response},
};
use http::{Request, StatusCode, header};
use rate_limit::{RateLimitError, RateLimitManager};
use tower::Layer;

use crate::client_key::extract_client_key;

#[derive(Clone)]
pub struct RateLimitLayer {
    manager: Arc<RateLimitManager>,
    trust_forwarded_headers: bool,
}

impl RateLimitLayer {
    pub fn new(manager: Arc<RateLimitManager>, trust_forwarded_headers: bool) -> Self {
        Self {
            manager,
            trust_forwarded_headers,
        }
    }
}

impl<Service> Layer<Service> for RateLimitLayer
where
    Service: Send + Clone,
{
    type Service = RateLimitService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        RateLimitService {
            next,
            manager: self.manager.clone(),
            trust_forwarded_headers: self.trust_forwarded_headers,
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<Service> {
    next: Service,
    manager: Arc<RateLimitManager>,
    trust_forwarded_headers: bool,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for RateLimitService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let key = extract_client_key(&req, self.trust_forwarded_headers);

        // The decision is made before the request is handed to the inner service.
        let err = match self.manager.check(&key) {
            Ok(()) => {
                let mut next = self.next.clone();
                return Box::pin(async move { next.call(req).await });
            }
            Err(err) => err,
        };

        log::debug!("Request rejected due to rate limit: {err}");

        Box::pin(async move { Ok(rejection(&err)) })
    }
}

/// Rejections carry no Retry-After header.
fn rejection(err: &RateLimitError) -> Response<Body> {
    match err {
        RateLimitError::LimitExceeded { .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::CONTENT_TYPE, "text/plain")],
            "Rate limit exceeded",
        )
            .into_response(),
        RateLimitError::InvalidRate { .. } | RateLimitError::InvalidBurst => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            "Internal server error",
        )
            .into_response(),
    }
}
