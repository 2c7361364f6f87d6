//! Agent facade.
//!
//! # Data Flow
//! ```text
//! AgentConfig
//!     → Agent::new (validate, compile ignore patterns)
//!
//! Per request (task-local slot, see `Agent::request_scope`):
//!     start_transaction → slot holds TransactionHandle
//!     current_transaction → clone of the slot
//!     end_transaction → slot emptied, record shipped to Reporter
//!     claim_failure_report → first caller wins, later layers stay quiet
//!
//! report(error) → ErrorReport linked to the current transaction → Reporter
//! ```
//!
//! # Design Decisions
//! - The current transaction is scoped to the request task, never global
//! - `end_transaction` without an active transaction is a no-op
//! - Config and patterns are immutable after construction

pub mod context;
pub mod reporter;
pub mod transaction;

use axum::http::{HeaderMap, Request, StatusCode};
use regex::Regex;
use std::cell::RefCell;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::validation::{compile_patterns, validate_config};
use crate::config::{AgentConfig, ConfigError};
use crate::trace_context::TraceContext;

pub use context::{HeaderPolicy, RequestContext, ResponseContext, TransactionContext};
pub use reporter::{ChannelReporter, ErrorKind, ErrorReport, LogReporter, ReportReceivers, Reporter};
pub use transaction::{http_result, Transaction, TransactionHandle, TRANSACTION_TYPE};

tokio::task_local! {
    static CURRENT_REQUEST: RefCell<RequestSlot>;
}

/// State shared by every interceptor layer handling one request.
#[derive(Debug, Default)]
struct RequestSlot {
    transaction: Option<TransactionHandle>,
    failure_reported: bool,
}

/// Process-wide agent state.
#[derive(Debug)]
pub struct Agent {
    config: AgentConfig,
    ignore_patterns: Vec<Regex>,
    header_policy: HeaderPolicy,
    running: AtomicBool,
    reporter: Arc<dyn Reporter>,
}

impl Agent {
    /// Validate the config and build an agent that ships records to `reporter`.
    pub fn new(config: AgentConfig, reporter: Arc<dyn Reporter>) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let ignore_patterns =
            compile_patterns(&config.ignore_url_patterns).map_err(ConfigError::Validation)?;
        let header_policy = HeaderPolicy::new(config.capture_headers, &config.sanitize_field_names);

        tracing::info!(
            service = %config.service_name,
            active = config.active,
            ignore_patterns = ignore_patterns.len(),
            "APM agent initialized"
        );

        Ok(Self {
            running: AtomicBool::new(config.active),
            config,
            ignore_patterns,
            header_policy,
            reporter,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
        tracing::info!("APM agent started");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        tracing::info!("APM agent stopped");
    }

    /// Whether `path` matches any ignore pattern (first match wins).
    pub fn is_ignored(&self, path: &str) -> bool {
        match self.ignore_patterns.iter().find(|re| re.is_match(path)) {
            Some(re) => {
                tracing::trace!(path, pattern = %re.as_str(), "Request path ignored");
                true
            }
            None => false,
        }
    }

    /// Run `future` with a per-request transaction slot.
    ///
    /// Nested calls reuse the enclosing slot so inner layers see the
    /// transaction opened by outer ones.
    pub async fn request_scope<F: Future>(future: F) -> F::Output {
        if CURRENT_REQUEST.try_with(|_| ()).is_ok() {
            future.await
        } else {
            CURRENT_REQUEST
                .scope(RefCell::new(RequestSlot::default()), future)
                .await
        }
    }

    /// Transaction active in the current request scope, if any.
    pub fn current_transaction(&self) -> Option<TransactionHandle> {
        CURRENT_REQUEST
            .try_with(|slot| slot.borrow().transaction.clone())
            .ok()
            .flatten()
    }

    /// Claim the single unhandled-failure report of the current request.
    ///
    /// Returns `false` once a layer of the same request has claimed it.
    /// Outside a request scope every call wins.
    pub fn claim_failure_report(&self) -> bool {
        CURRENT_REQUEST
            .try_with(|slot| !std::mem::replace(&mut slot.borrow_mut().failure_reported, true))
            .unwrap_or(true)
    }

    /// Open a transaction and make it current.
    ///
    /// Outside a request scope the transaction is returned but not tracked,
    /// so `end_transaction` will not see it.
    pub fn start_transaction(
        &self,
        name: impl Into<String>,
        transaction_type: &str,
        context: RequestContext,
        trace_context: Option<TraceContext>,
    ) -> TransactionHandle {
        let transaction = Transaction::new(
            name,
            transaction_type,
            self.config.service_name.clone(),
            context,
            trace_context,
        );
        tracing::debug!(
            transaction_id = %transaction.id,
            name = %transaction.name,
            trace_id = ?transaction.trace_context.as_ref().map(TraceContext::trace_id),
            "Transaction started"
        );

        let handle = TransactionHandle::new(transaction);
        let installed = CURRENT_REQUEST
            .try_with(|slot| slot.borrow_mut().transaction = Some(handle.clone()))
            .is_ok();
        if !installed {
            tracing::warn!("Transaction started outside a request scope; it will not be tracked");
        }
        handle
    }

    /// Close the current transaction, if any, and ship it.
    pub fn end_transaction(&self, result: Option<String>) -> Option<Transaction> {
        let handle = CURRENT_REQUEST
            .try_with(|slot| slot.borrow_mut().transaction.take())
            .ok()
            .flatten()?;

        let transaction = handle.finish(result);
        tracing::debug!(
            transaction_id = %transaction.id,
            name = %transaction.name,
            result = ?transaction.result,
            duration_ms = ?transaction.duration_ms,
            "Transaction ended"
        );
        self.reporter.report_transaction(transaction.clone());
        Some(transaction)
    }

    /// Report an error, linked to the current transaction when there is one.
    pub fn report(&self, error: &(dyn StdError + 'static), handled: bool) -> ErrorReport {
        self.ship_error(ErrorReport::from_error(error, handled))
    }

    /// Report a panic payload message.
    pub fn report_panic(&self, message: impl Into<String>, handled: bool) -> ErrorReport {
        self.ship_error(ErrorReport::from_panic(message, handled))
    }

    fn ship_error(&self, mut report: ErrorReport) -> ErrorReport {
        report.service_name = self.config.service_name.clone();
        if let Some(tx) = self.current_transaction() {
            let snapshot = tx.snapshot();
            report.culprit = Some(snapshot.name);
            report.transaction_id = Some(snapshot.id);
            report.trace_id = snapshot
                .trace_context
                .as_ref()
                .map(|ctx| ctx.trace_id().to_string());
        }

        tracing::error!(
            error_id = %report.id,
            message = %report.message,
            handled = report.handled,
            culprit = ?report.culprit,
            "Reporting error"
        );
        self.reporter.report_error(report.clone());
        report
    }

    pub fn build_context<B>(&self, request: &Request<B>) -> RequestContext {
        RequestContext::from_request(request, &self.header_policy)
    }

    pub fn build_response_context(&self, status: StatusCode, headers: &HeaderMap) -> ResponseContext {
        ResponseContext::from_parts(status, headers, &self.header_policy)
    }
}
