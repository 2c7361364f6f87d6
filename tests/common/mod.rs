//! Shared helpers for integration tests.

use std::sync::Arc;

use apm_middleware::agent::ReportReceivers;
use apm_middleware::{Agent, AgentConfig, ApmLayer, ApmService, ChannelReporter};
use axum::body::Body;
use axum::extract::Path;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use tower::Layer;

/// Agent wired to a channel reporter.
pub fn agent(config: AgentConfig) -> (Arc<Agent>, ReportReceivers) {
    let (reporter, rx) = ChannelReporter::new();
    let agent = Agent::new(config, Arc::new(reporter)).expect("valid test config");
    (Arc::new(agent), rx)
}

/// Router wrapped from outside (raw path) with a route layer (route template).
pub fn nested_app(agent: Arc<Agent>) -> ApmService<Router> {
    let router = Router::new()
        .route("/users/{id}", get(|Path(id): Path<u32>| async move { format!("user {id}") }))
        .route("/orders", get(|| async { (StatusCode::CREATED, "created") }))
        .route("/broken", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }))
        .route("/health", get(|| async { "ok" }))
        .route_layer(ApmLayer::new(agent.clone()));
    ApmLayer::new(agent).layer(router)
}

/// Router wrapped from outside only.
#[allow(dead_code)]
pub fn flat_app(agent: Arc<Agent>) -> ApmService<Router> {
    let router = Router::new()
        .route("/users/{id}", get(|Path(id): Path<u32>| async move { format!("user {id}") }));
    ApmLayer::new(agent).layer(router)
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}
