// src/server/handler.rs
use hyper::{Body, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;

use crate::proxy::{Forwarder, HyperForwarder, Proxy};

/// Catch-all service: every method and path goes to the proxy.
pub struct RequestHandler<F = HyperForwarder> {
    proxy: Arc<Proxy<F>>,
}

impl<F> RequestHandler<F> {
    pub fn new(proxy: Arc<Proxy<F>>) -> Self {
        Self { proxy }
    }
}

impl<F> Clone for RequestHandler<F> {
    fn clone(&self) -> Self {
        Self {
            proxy: self.proxy.clone(),
        }
    }
}

impl<F: Forwarder + 'static> Service<Request<Body>> for RequestHandler<F> {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let proxy = self.proxy.clone();
        Box::pin(async move { Ok(proxy.handle(req).await) })
    }
}
