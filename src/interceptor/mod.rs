//! Request interception subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → layer.rs (tower Service, classifies inner errors)
//!     → engine.rs (instrument? start/continue transaction)
//!         → naming.rs ("METHOD ROUTE")
//!         → trace_context (propagation header)
//!     → downstream service
//!     → engine.rs (capture response, report errors, finalize once)
//!     → Response or the original error
//! ```
//!
//! # Design Decisions
//! - Instrumentation never changes the request, response, or error
//! - Nested layers share one transaction; the innermost name wins

pub mod engine;
pub mod layer;
pub mod naming;

pub use engine::{Interceptor, MaybeResponse};
pub use layer::{ApmLayer, ApmService};
pub use naming::{route_origin, transaction_name, RouteOrigin};
