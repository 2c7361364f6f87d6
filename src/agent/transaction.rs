//! Transaction records.
//!
//! # Responsibilities
//! - Hold request/response metadata and trace linkage for one request
//! - Allow a nested layer to rename the in-flight transaction
//! - Stamp result and duration exactly once at finalization

use axum::http::StatusCode;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::agent::context::{RequestContext, ResponseContext, TransactionContext};
use crate::trace_context::TraceContext;

/// Type of every transaction opened by the HTTP interceptor.
pub const TRANSACTION_TYPE: &str = "request";

/// One bounded unit of work.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub service_name: String,
    pub context: TransactionContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_context: Option<TraceContext>,
    pub result: Option<String>,
    pub sampled: bool,
    /// Microseconds since the Unix epoch.
    pub timestamp: u64,
    /// Set when the transaction ends.
    pub duration_ms: Option<f64>,
    #[serde(skip)]
    started: Instant,
}

impl Transaction {
    pub fn new(
        name: impl Into<String>,
        transaction_type: impl Into<String>,
        service_name: impl Into<String>,
        request: RequestContext,
        trace_context: Option<TraceContext>,
    ) -> Self {
        let timestamp = epoch_micros();
        let sampled = trace_context.as_ref().map_or(true, TraceContext::is_sampled);

        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            transaction_type: transaction_type.into(),
            service_name: service_name.into(),
            context: TransactionContext {
                request,
                response: None,
            },
            trace_context,
            result: None,
            sampled,
            timestamp,
            duration_ms: None,
            started: Instant::now(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.duration_ms.is_some()
    }

    /// Stamp the result and stop the clock. Later calls are ignored.
    pub fn finish(&mut self, result: Option<String>) {
        if self.is_finished() {
            return;
        }
        self.result = result;
        self.duration_ms = Some(self.started.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Microseconds since the Unix epoch, saturating at `u64::MAX`.
pub(crate) fn epoch_micros() -> u64 {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    u64::try_from(micros).unwrap_or(u64::MAX)
}

/// Coarse status bucket, e.g. 404 → "HTTP 4xx".
pub fn http_result(status: StatusCode) -> String {
    format!("HTTP {}xx", status.as_u16() / 100)
}

/// Shared handle to the in-flight transaction.
#[derive(Debug, Clone)]
pub struct TransactionHandle {
    inner: Arc<Mutex<Transaction>>,
}

impl TransactionHandle {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transaction)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Transaction> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> Uuid {
        self.lock().id
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.lock().name = name.into();
    }

    pub fn trace_id(&self) -> Option<String> {
        self.lock()
            .trace_context
            .as_ref()
            .map(|ctx| ctx.trace_id().to_string())
    }

    pub fn add_response(&self, response: ResponseContext) {
        self.lock().context.response = Some(response);
    }

    /// Finish and return a copy of the final record.
    pub fn finish(&self, result: Option<String>) -> Transaction {
        let mut tx = self.lock();
        tx.finish(result);
        tx.clone()
    }

    pub fn snapshot(&self) -> Transaction {
        self.lock().clone()
    }

    pub fn same_as(&self, other: &TransactionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
