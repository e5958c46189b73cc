//! Fake client handles for exercising the dispatcher without a cluster.
//!
//! Every fake counts how often it was called and how many response bodies it
//! handed out were dropped again, so tests can check both the request rate and
//! that nothing is leaked on timeout or cancellation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use stress_common::{BoxedBody, ClientHandle, ListParams, RequestError, ResponseBody};

/// Increments a shared counter when dropped.
#[derive(Debug)]
pub struct DropCounter(Arc<AtomicUsize>);

impl DropCounter {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        Self(counter)
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Response body served from memory.
pub struct StaticBody {
    chunks: VecDeque<Bytes>,
    stall: bool,
    _released: DropCounter,
}

impl StaticBody {
    pub fn new(chunks: Vec<Bytes>, released: Arc<AtomicUsize>) -> Self {
        Self {
            chunks: chunks.into(),
            stall: false,
            _released: DropCounter::new(released),
        }
    }

    /// A body that yields its chunks and then never finishes.
    pub fn stalling(chunks: Vec<Bytes>, released: Arc<AtomicUsize>) -> Self {
        Self {
            stall: true,
            ..Self::new(chunks, released)
        }
    }
}

#[async_trait]
impl ResponseBody for StaticBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RequestError> {
        match self.chunks.pop_front() {
            Some(chunk) => Ok(Some(chunk)),
            None if self.stall => std::future::pending().await,
            None => Ok(None),
        }
    }
}

/// Bookkeeping shared by all fakes.
#[derive(Debug, Default)]
pub struct CallStats {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    released: Arc<AtomicUsize>,
    abandoned: Arc<AtomicUsize>,
    params: std::sync::Mutex<Vec<ListParams>>,
}

impl CallStats {
    fn enter(&self, params: &ListParams) -> InFlight<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Ok(mut seen) = self.params.lock() {
            seen.push(params.clone());
        }
        InFlight(&self.in_flight)
    }

    /// Number of list requests issued.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of requests that were waiting on this handle at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of response bodies dropped by the caller.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Number of requests whose future was dropped before completing.
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    /// Parameters of every request seen so far.
    pub fn params(&self) -> Vec<ListParams> {
        self.params.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Succeeds after a fixed delay with a small JSON payload.
#[derive(Debug)]
pub struct FixedDelayClient {
    delay: Duration,
    payload: Bytes,
    stats: CallStats,
}

impl FixedDelayClient {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            payload: Bytes::from_static(br#"{"kind":"ConfigMapList","items":[]}"#),
            stats: CallStats::default(),
        }
    }

    pub fn stats(&self) -> &CallStats {
        &self.stats
    }
}

#[async_trait]
impl ClientHandle for FixedDelayClient {
    async fn issue_list_request(&self, params: &ListParams) -> Result<BoxedBody, RequestError> {
        let _in_flight = self.stats.enter(params);
        tokio::time::sleep(self.delay).await;
        let chunks = self.payload.chunks(8).map(Bytes::copy_from_slice).collect();
        Ok(Box::new(StaticBody::new(chunks, self.stats.released.clone())))
    }
}

/// Fails every request with a transport error, optionally after a delay.
#[derive(Debug, Default)]
pub struct FailingClient {
    delay: Duration,
    stats: CallStats,
}

impl FailingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            stats: CallStats::default(),
        }
    }

    pub fn stats(&self) -> &CallStats {
        &self.stats
    }
}

#[async_trait]
impl ClientHandle for FailingClient {
    async fn issue_list_request(&self, params: &ListParams) -> Result<BoxedBody, RequestError> {
        let _in_flight = self.stats.enter(params);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Err(RequestError::Transport("connection refused".to_string()))
    }
}

/// Never answers. Dropping the pending request is recorded as abandoned.
#[derive(Debug, Default)]
pub struct StallingClient {
    stats: CallStats,
}

impl StallingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &CallStats {
        &self.stats
    }
}

#[async_trait]
impl ClientHandle for StallingClient {
    async fn issue_list_request(&self, params: &ListParams) -> Result<BoxedBody, RequestError> {
        let _in_flight = self.stats.enter(params);
        let _abandoned = DropCounter::new(self.stats.abandoned.clone());
        std::future::pending().await
    }
}

/// Answers immediately but the body never finishes streaming.
#[derive(Debug, Default)]
pub struct StallingBodyClient {
    stats: CallStats,
}

impl StallingBodyClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &CallStats {
        &self.stats
    }
}

#[async_trait]
impl ClientHandle for StallingBodyClient {
    async fn issue_list_request(&self, params: &ListParams) -> Result<BoxedBody, RequestError> {
        let _in_flight = self.stats.enter(params);
        Ok(Box::new(StaticBody::stalling(
            vec![Bytes::from_static(b"{\"items\":[")],
            self.stats.released.clone(),
        )))
    }
}
