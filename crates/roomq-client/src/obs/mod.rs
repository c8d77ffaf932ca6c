//! Lightweight in-process metrics.
//!
//! Counters and latency histograms for admission decisions and remote calls,
//! rendered in Prometheus text format for the host application to expose.

pub mod metrics;

pub use metrics::AdmissionMetrics;
