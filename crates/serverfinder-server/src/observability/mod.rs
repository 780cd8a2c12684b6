//! Observability Module
//!
//! - `events`: Structured event logging with consistent fields
//! - `metrics`: Prometheus metrics for pull and push cycles
//! - `tracing`: Subscriber setup with optional OpenTelemetry export

pub mod events;
pub mod metrics;
pub mod tracing;

pub use self::metrics::{init_metrics, MetricsState};
pub use self::tracing::{init_tracing, shutdown_tracing, TracingConfig};
