//! List load generator for Kubernetes API servers.
//!
//! This crate provides tools to:
//! - Launch list calls at a fixed rate for a fixed duration
//! - Spread them round-robin over a pool of independent clients
//! - Stop cleanly on SIGINT/SIGTERM and wait for in-flight calls
//! - Report the failure rate and optionally write per-call latencies to CSV

pub mod cancel;
pub mod client;
pub mod config;
pub mod counters;
pub mod dispatcher;
pub mod kubeconfig;
pub mod report;
pub mod sink;
pub mod worker;

pub use cancel::{termination_signals, CancelOnce, CancellationController};
pub use client::{ClientPool, KubeClient};
pub use config::{DispatchConfig, ListConfig};
pub use counters::{Counters, Summary};
pub use dispatcher::{Dispatcher, RunState, StopReason};
pub use kubeconfig::Kubeconfig;
pub use report::{OutputFormat, ResultsReport, RunReport};
pub use sink::CsvSink;
pub use worker::Outcome;
