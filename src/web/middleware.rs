//! Visit tracking middleware
//!
//! Runs ahead of every API route. Qualifying requests are queued as visits and
//! tagged with [`QualifiedVisit`] so routes can count item views themselves.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    response::Response,
};
use futures::future::BoxFuture;
use std::{net::SocketAddr, sync::Arc, task::{Context, Poll}};
use tower::{Layer, Service};

use crate::tracking::{QualifiedVisit, Tracker};

/// Layer for visit tracking
#[derive(Clone)]
pub struct VisitTrackingLayer {
    tracker: Arc<Tracker>,
}

impl VisitTrackingLayer {
    pub fn new(tracker: Arc<Tracker>) -> Self {
        Self { tracker }
    }
}

impl<S> Layer<S> for VisitTrackingLayer {
    type Service = VisitTrackingMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        VisitTrackingMiddleware {
            inner,
            tracker: self.tracker.clone(),
        }
    }
}

/// Middleware service for visit tracking
#[derive(Clone)]
pub struct VisitTrackingMiddleware<S> {
    inner: S,
    tracker: Arc<Tracker>,
}

impl<S> Service<Request<Body>> for VisitTrackingMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        // Use the instance that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if self.tracker.qualifies(request.headers()) {
            let path = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| request.uri().path().to_string());
            let socket = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);

            self.tracker.record_visit(path, request.headers(), socket);
            request.extensions_mut().insert(QualifiedVisit);
        }

        Box::pin(async move { inner.call(request).await })
    }
}
