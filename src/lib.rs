//! APM request-tracing middleware.
//!
//! Wraps each inbound request in a transaction: continues or starts a
//! distributed trace, names the transaction after the matched route, reports
//! uncaught application failures, and finalizes exactly once per request.

pub mod agent;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod observability;
pub mod trace_context;

pub use agent::{Agent, ChannelReporter, LogReporter, Reporter, Transaction};
pub use config::AgentConfig;
pub use error::{DownstreamError, InternalError, Origin};
pub use interceptor::{ApmLayer, ApmService, Interceptor, RouteOrigin};
pub use trace_context::{TraceContext, TraceContextError};
