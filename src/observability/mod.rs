//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields: transaction_id, name, result)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, pretty or JSON)
//!     → LogReporter records under the "apm" target
//! ```

pub mod logging;
