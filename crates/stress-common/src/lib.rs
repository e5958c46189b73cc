//! Common types shared across the kube-stress workspace.
//!
//! The traits in [`client`] and [`sink`] are the seams between the request
//! dispatcher and the outside world: the API client that issues list calls
//! and the destination for recorded latencies.

pub mod client;
pub mod error;
pub mod sink;

pub use client::{drain, BoxedBody, ClientHandle, ListParams, ResponseBody};
pub use error::{RequestError, StressError, StressResult};
pub use sink::ResultSink;
