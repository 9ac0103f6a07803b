//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Adapter, transport and lifecycle produce:
//!     → logging.rs (structured log events and exchange spans)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every exchange runs in a span carrying its token
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
