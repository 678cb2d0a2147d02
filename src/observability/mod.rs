//! Observability for healthgate.
//!
//! Structured logging lives in [`crate::logging`]; this module holds the
//! Prometheus metrics served on `/metrics`.
//!
//! ```rust,ignore
//! use healthgate::observability::Metrics;
//!
//! let metrics = Metrics::new()?;
//! metrics.record_http_request("/health", 200, 0.004);
//! println!("{}", metrics.export());
//! ```

pub mod metrics;

pub use metrics::Metrics;
