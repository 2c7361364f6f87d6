//! Framework-agnostic request interception.
//!
//! # Responsibilities
//! - Decide whether a request is instrumented (agent running, path not ignored)
//! - Start a transaction, or rename the one an outer layer already started
//! - Invoke downstream with the request untouched
//! - Report application errors and panics, pass internal errors through
//! - Finalize exactly once on every exit path
//!
//! # Design Decisions
//! - Finalization lives in a drop guard, so it also runs when the request
//!   future is cancelled
//! - A layer that skips instrumentation never ends a transaction opened by
//!   an enclosing layer
//! - A failure is reported by the innermost layer that sees it, once per
//!   request
//! - Errors and panics are handed back exactly as raised
//! - A bad trace header is logged and treated as absent

use axum::http::{HeaderMap, Request, Response, StatusCode};
use futures_util::FutureExt;
use std::error::Error as StdError;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::agent::{http_result, Agent, TransactionHandle, TRANSACTION_TYPE};
use crate::error::{panic_message, DownstreamError, Origin};
use crate::interceptor::naming::{route_origin, transaction_name};
use crate::trace_context::TraceContext;

/// Shapes of downstream output the interceptor can finalize from.
pub trait MaybeResponse {
    fn status_and_headers(&self) -> Option<(StatusCode, &HeaderMap)>;
}

impl<B> MaybeResponse for Response<B> {
    fn status_and_headers(&self) -> Option<(StatusCode, &HeaderMap)> {
        Some((self.status(), self.headers()))
    }
}

impl<B> MaybeResponse for Option<Response<B>> {
    fn status_and_headers(&self) -> Option<(StatusCode, &HeaderMap)> {
        self.as_ref().map(|r| (r.status(), r.headers()))
    }
}

/// Wraps one downstream call with transaction start/finalize.
#[derive(Debug, Clone)]
pub struct Interceptor {
    agent: Arc<Agent>,
}

impl Interceptor {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn should_instrument(&self, path: &str) -> bool {
        self.agent.is_running() && !self.agent.is_ignored(path)
    }

    /// Trace context from the first configured propagation header present.
    pub fn trace_context<B>(&self, request: &Request<B>) -> Option<TraceContext> {
        let value = self
            .agent
            .config()
            .trace_headers
            .iter()
            .find_map(|name| request.headers().get(name.as_str()))?;

        let header = match value.to_str() {
            Ok(header) => header,
            Err(_) => {
                tracing::warn!(header = ?value, "Couldn't parse non-ASCII traceparent header");
                return None;
            }
        };

        match TraceContext::parse(header) {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                tracing::warn!(header, error = %e, "Couldn't parse invalid traceparent header");
                None
            }
        }
    }

    fn start_or_continue<B>(&self, request: &Request<B>) -> TransactionHandle {
        let name = transaction_name(
            request.method().as_str(),
            route_origin(request),
            request.uri().path(),
        );

        if let Some(transaction) = self.agent.current_transaction() {
            tracing::debug!(
                transaction_id = %transaction.id(),
                name = %name,
                "Continuing active transaction"
            );
            transaction.set_name(name);
            return transaction;
        }

        self.agent.start_transaction(
            name,
            TRANSACTION_TYPE,
            self.agent.build_context(request),
            self.trace_context(request),
        )
    }

    /// Run `downstream` inside a transaction.
    ///
    /// Application errors are reported (unhandled) and returned unchanged;
    /// internal errors are returned unchanged without reporting; panics are
    /// reported and resumed.
    pub async fn intercept<B, T, E, F, Fut>(
        &self,
        request: Request<B>,
        downstream: F,
    ) -> Result<T, DownstreamError<E>>
    where
        F: FnOnce(Request<B>) -> Fut,
        Fut: Future<Output = Result<T, DownstreamError<E>>>,
        T: MaybeResponse,
        E: StdError + 'static,
    {
        Agent::request_scope(self.run(request, downstream)).await
    }

    async fn run<B, T, E, F, Fut>(
        &self,
        request: Request<B>,
        downstream: F,
    ) -> Result<T, DownstreamError<E>>
    where
        F: FnOnce(Request<B>) -> Fut,
        Fut: Future<Output = Result<T, DownstreamError<E>>>,
        T: MaybeResponse,
        E: StdError + 'static,
    {
        let (transaction, ends_transaction) = if self.should_instrument(request.uri().path()) {
            (Some(self.start_or_continue(&request)), true)
        } else {
            // An enclosing layer's transaction stays open for that layer.
            (None, self.agent.current_transaction().is_none())
        };
        let mut finalizer = Finalizer {
            agent: &self.agent,
            transaction,
            ends_transaction,
            status: None,
        };

        let outcome = AssertUnwindSafe(async move { downstream(request).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(response)) => {
                finalizer.capture(&response);
                Ok(response)
            }
            Ok(Err(error)) => {
                match error.origin {
                    Origin::Internal => {
                        tracing::debug!(error = %error.source, "Passing through internal error");
                    }
                    Origin::Application if self.agent.claim_failure_report() => {
                        self.agent.report(&error.source, false);
                    }
                    Origin::Application => {
                        tracing::trace!(error = %error.source, "Failure already reported by a nested layer");
                    }
                }
                Err(error)
            }
            Err(payload) => {
                if self.agent.claim_failure_report() {
                    self.agent.report_panic(panic_message(payload.as_ref()), false);
                }
                drop(finalizer);
                std::panic::resume_unwind(payload)
            }
        }
    }
}

/// Ends the current transaction when dropped.
///
/// A skipped layer nested in an instrumented one drops as a no-op.
struct Finalizer<'a> {
    agent: &'a Agent,
    transaction: Option<TransactionHandle>,
    ends_transaction: bool,
    status: Option<StatusCode>,
}

impl Finalizer<'_> {
    fn capture<T: MaybeResponse>(&mut self, response: &T) {
        let Some((status, headers)) = response.status_and_headers() else {
            return;
        };
        self.status = Some(status);
        if let Some(transaction) = &self.transaction {
            transaction.add_response(self.agent.build_response_context(status, headers));
        }
    }
}

impl Drop for Finalizer<'_> {
    fn drop(&mut self) {
        if self.ends_transaction {
            self.agent.end_transaction(self.status.map(http_result));
        }
    }
}
