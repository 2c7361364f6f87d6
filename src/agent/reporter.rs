//! Sinks for completed transactions and error reports.
//!
//! Shipping to a collector is outside this crate; reporters only hand the
//! records off.

use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::agent::transaction::{epoch_micros, Transaction};

/// An error captured by the agent.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub id: Uuid,
    pub message: String,
    /// Messages of the `source()` chain, outermost first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
    pub kind: ErrorKind,
    pub handled: bool,
    /// Name of the transaction active when the error happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub culprit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    pub service_name: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Error,
    Panic,
}

impl ErrorReport {
    pub fn from_error(error: &(dyn StdError + 'static), handled: bool) -> Self {
        let mut causes = Vec::new();
        let mut current = error.source();
        while let Some(cause) = current {
            causes.push(cause.to_string());
            current = cause.source();
        }
        Self::new(error.to_string(), causes, ErrorKind::Error, handled)
    }

    pub fn from_panic(message: impl Into<String>, handled: bool) -> Self {
        Self::new(message.into(), Vec::new(), ErrorKind::Panic, handled)
    }

    fn new(message: String, causes: Vec<String>, kind: ErrorKind, handled: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
            causes,
            kind,
            handled,
            culprit: None,
            transaction_id: None,
            trace_id: None,
            service_name: String::new(),
            timestamp: epoch_micros(),
        }
    }
}

/// Destination for everything the agent collects.
pub trait Reporter: Send + Sync + fmt::Debug {
    fn report_transaction(&self, transaction: Transaction);
    fn report_error(&self, error: ErrorReport);
}

/// Forwards records over unbounded channels.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    transactions: mpsc::UnboundedSender<Transaction>,
    errors: mpsc::UnboundedSender<ErrorReport>,
}

/// Receiving side of a [`ChannelReporter`].
#[derive(Debug)]
pub struct ReportReceivers {
    pub transactions: mpsc::UnboundedReceiver<Transaction>,
    pub errors: mpsc::UnboundedReceiver<ErrorReport>,
}

impl ChannelReporter {
    pub fn new() -> (Self, ReportReceivers) {
        let (tx_sender, tx_receiver) = mpsc::unbounded_channel();
        let (err_sender, err_receiver) = mpsc::unbounded_channel();
        (
            Self {
                transactions: tx_sender,
                errors: err_sender,
            },
            ReportReceivers {
                transactions: tx_receiver,
                errors: err_receiver,
            },
        )
    }
}

impl Reporter for ChannelReporter {
    fn report_transaction(&self, transaction: Transaction) {
        if self.transactions.send(transaction).is_err() {
            tracing::debug!("Transaction receiver dropped, discarding transaction");
        }
    }

    fn report_error(&self, error: ErrorReport) {
        if self.errors.send(error).is_err() {
            tracing::debug!("Error receiver dropped, discarding error report");
        }
    }
}

/// Writes every record as a JSON log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl LogReporter {
    fn emit<T: Serialize>(kind: &str, record: &T) {
        match serde_json::to_string(record) {
            Ok(payload) => tracing::info!(target: "apm", kind, %payload, "APM record"),
            Err(e) => tracing::warn!(kind, error = %e, "Failed to serialize APM record"),
        }
    }
}

impl Reporter for LogReporter {
    fn report_transaction(&self, transaction: Transaction) {
        Self::emit("transaction", &transaction);
    }

    fn report_error(&self, error: ErrorReport) {
        Self::emit("error", &error);
    }
}
