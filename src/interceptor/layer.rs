//! Tower adapter for the interceptor.
//!
//! ```text
//! let router = Router::new()
//!     .route("/users/{id}", get(handler))
//!     .route_layer(ApmLayer::new(agent.clone()));  // sees MatchedPath, renames
//! let app = ApmLayer::new(agent).layer(router);    // raw path, opens the transaction
//! ```
//!
//! `Router::layer` runs after routing in axum, so a layer added that way
//! already sees the route template. Wrapping the router from outside is what
//! gives the raw-path name for requests that never reach a route.

use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use std::error::Error as StdError;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::agent::Agent;
use crate::error::DownstreamError;
use crate::interceptor::engine::Interceptor;

/// Layer that wraps services with transaction tracking.
#[derive(Debug, Clone)]
pub struct ApmLayer {
    interceptor: Interceptor,
}

impl ApmLayer {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self {
            interceptor: Interceptor::new(agent),
        }
    }
}

impl<S> Layer<S> for ApmLayer {
    type Service = ApmService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ApmService {
            inner,
            interceptor: self.interceptor.clone(),
        }
    }
}

/// Service produced by [`ApmLayer`].
///
/// The inner service's error is classified by its `source()` chain and
/// returned to the caller as-is.
#[derive(Debug, Clone)]
pub struct ApmService<S> {
    inner: S,
    interceptor: Interceptor,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ApmService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: StdError + Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // The ready service goes into the future; keep a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let interceptor = self.interceptor.clone();

        Box::pin(async move {
            interceptor
                .intercept(request, move |request| async move {
                    inner.call(request).await.map_err(DownstreamError::new)
                })
                .await
                .map_err(DownstreamError::into_inner)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ChannelReporter;
    use crate::config::AgentConfig;
    use crate::error::InternalError;
    use axum::body::Body;
    use thiserror::Error;
    use tower::{service_fn, ServiceExt};

    #[derive(Debug, Error)]
    #[error("inventory lookup failed")]
    struct InventoryError;

    #[derive(Debug, Error)]
    enum HandlerError {
        #[error("{0}")]
        Inventory(#[from] InventoryError),
        #[error("agent failure: {0}")]
        Agent(#[from] InternalError),
    }

    fn layer() -> (ApmLayer, crate::agent::ReportReceivers) {
        let (reporter, rx) = ChannelReporter::new();
        let agent = Agent::new(AgentConfig::default(), Arc::new(reporter)).unwrap();
        (ApmLayer::new(Arc::new(agent)), rx)
    }

    #[tokio::test]
    async fn test_service_error_returned_unchanged() {
        let (layer, mut rx) = layer();
        let svc = layer.layer(service_fn(|_req: Request<Body>| async {
            Err::<Response<Body>, _>(HandlerError::from(InventoryError))
        }));

        let err = svc
            .oneshot(Request::builder().uri("/stock").body(Body::empty()).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Inventory(_)));

        let report = rx.errors.recv().await.unwrap();
        assert_eq!(report.message, "inventory lookup failed");
        assert!(rx.transactions.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_internal_service_error_not_reported() {
        let (layer, mut rx) = layer();
        let svc = layer.layer(service_fn(|_req: Request<Body>| async {
            Err::<Response<Body>, _>(HandlerError::from(InternalError::new("sink closed")))
        }));

        let err = svc
            .oneshot(Request::builder().uri("/stock").body(Body::empty()).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Agent(_)));
        assert!(rx.errors.try_recv().is_err());
        assert!(rx.transactions.recv().await.is_some());
    }
}
