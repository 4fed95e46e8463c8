//! Observability subsystem
//!
//! - Typed lifecycle and item notifications, delivered to subscribers
//! - Lock-free per-index metrics
//! - Structured logs through `tracing`
//!
//! Failures are reported, not thrown: an operation that fails returns its
//! error and also publishes an `IndexNotification::Error`.

mod events;
mod metrics;
mod notifier;

pub use events::{IndexNotification, IndexStatus};
pub use metrics::{MetricsSnapshot, PerformanceMetrics};
pub use notifier::{NotificationReceiver, Notifier};
