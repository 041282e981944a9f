//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Connection handlers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (atomic counters + metrics facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → /metrics (JSON snapshot for autoscalers)
//!     → /metrics/prometheus (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use metrics::{ActiveConnection, Counters, MetricsSnapshot};
