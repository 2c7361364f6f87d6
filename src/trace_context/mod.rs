//! Trace context propagation.
//!
//! # Data Flow
//! ```text
//! Inbound request headers
//!     → interceptor picks the first configured propagation header present
//!     → codec.rs parses "{version}-{trace_id}-{parent_id}-{flags}"
//!     → TraceContext attached to the new transaction
//!
//! Malformed header:
//!     → InvalidTraceparentHeader
//!     → warning logged, request continues without trace linkage
//! ```
//!
//! # Design Decisions
//! - Parsing is pure; failures never break request processing
//! - Only version "00" is accepted
//! - Identifiers are kept as the exact lowercase hex received, so they can be
//!   forwarded unchanged

pub mod codec;

pub use codec::{TraceContext, TraceContextError};
