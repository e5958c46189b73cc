//! Execution of a single list request.

use std::time::Duration;

use stress_common::{drain, ClientHandle, ListParams, RequestError, ResultSink};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::DispatchConfig;
use crate::counters::Counters;

/// Result of one request. Only used for logging and tests; the counters and
/// the sink have already been updated when it is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { latency: Duration, bytes: u64 },
    Failure { kind: &'static str },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn latency(&self) -> Option<Duration> {
        match self {
            Outcome::Success { latency, .. } => Some(*latency),
            Outcome::Failure { .. } => None,
        }
    }
}

/// Issue one list request and record its outcome.
///
/// The request gets its own deadline but still aborts as soon as `ctx` is
/// cancelled. Errors never propagate: they are counted in `counters.failed`.
/// The latency covers sending the request and reading the whole response
/// body, and is only forwarded to `sink` on success.
pub async fn execute<C>(
    ctx: &CancellationToken,
    client: &C,
    config: &DispatchConfig,
    counters: &Counters,
    sink: Option<&dyn ResultSink>,
) -> Outcome
where
    C: ClientHandle + ?Sized,
{
    counters.record_issued();

    let timeout = config.request_timeout();
    let start = Instant::now();
    let result = tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(RequestError::Cancelled),
        res = tokio::time::timeout(timeout, list_once(client, config.params())) => {
            res.unwrap_or(Err(RequestError::Timeout(timeout)))
        }
    };

    match result {
        Ok(bytes) => {
            let latency = start.elapsed();
            trace!(?latency, bytes, "List call took {:?}", latency);
            if let Some(sink) = sink {
                if let Err(e) = sink.record(&format!("{:?}", latency)) {
                    warn!(error = %e, "Failed to record latency");
                }
            }
            Outcome::Success { latency, bytes }
        }
        Err(err) => {
            counters.record_failure();
            debug!(kind = err.kind(), "List call failed after {:?}", start.elapsed());
            warn!(error = %err, "Error seen with list call");
            Outcome::Failure { kind: err.kind() }
        }
    }
}

/// Send the request and read the whole response.
///
/// The body is dropped, and its connection released, on every path out of
/// this future, including when the future itself is dropped.
async fn list_once<C>(client: &C, params: &ListParams) -> Result<u64, RequestError>
where
    C: ClientHandle + ?Sized,
{
    let mut body = client.issue_list_request(params).await?;
    drain(body.as_mut()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{
        list_params, FailingClient, FailingSink, FixedDelayClient, RecordingSink,
        StallingBodyClient, StallingClient,
    };

    fn config(timeout: Duration) -> DispatchConfig {
        DispatchConfig::new(1.0, Duration::from_secs(10), timeout, list_params()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_records_latency() {
        let client = FixedDelayClient::new(Duration::from_millis(250));
        let counters = Counters::new();
        let sink = RecordingSink::new();

        let outcome = execute(
            &CancellationToken::new(),
            &client,
            &config(Duration::from_secs(60)),
            &counters,
            Some(&sink),
        )
        .await;

        assert!(outcome.is_success());
        assert!(outcome.latency().unwrap() >= Duration::from_millis(250));
        assert_eq!(counters.snapshot().total, 1);
        assert_eq!(counters.snapshot().failed, 0);
        assert_eq!(
            sink.records(),
            vec![format!("{:?}", outcome.latency().unwrap())]
        );
        assert_eq!(client.stats().released(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_counts_failure() {
        let client = FailingClient::new();
        let counters = Counters::new();
        let sink = RecordingSink::new();

        let outcome = execute(
            &CancellationToken::new(),
            &client,
            &config(Duration::from_secs(60)),
            &counters,
            Some(&sink),
        )
        .await;

        assert_eq!(outcome, Outcome::Failure { kind: "transport" });
        assert_eq!(counters.snapshot().total, 1);
        assert_eq!(counters.snapshot().failed, 1);
        assert!(sink.records().is_empty());
        assert_eq!(client.stats().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_abandons_request() {
        let client = StallingClient::new();
        let counters = Counters::new();

        let start = Instant::now();
        let outcome = execute(
            &CancellationToken::new(),
            &client,
            &config(Duration::from_secs(5)),
            &counters,
            None,
        )
        .await;

        assert_eq!(outcome, Outcome::Failure { kind: "timeout" });
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(6));
        assert_eq!(counters.snapshot().failed, 1);
        assert_eq!(client.stats().abandoned(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_released_when_read_times_out() {
        let client = StallingBodyClient::new();
        let counters = Counters::new();

        let outcome = execute(
            &CancellationToken::new(),
            &client,
            &config(Duration::from_secs(1)),
            &counters,
            None,
        )
        .await;

        assert_eq!(outcome, Outcome::Failure { kind: "timeout" });
        assert_eq!(client.stats().released(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_in_flight_request() {
        let client = StallingClient::new();
        let counters = Counters::new();
        let ctx = CancellationToken::new();

        let canceller = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                ctx.cancel();
            })
        };

        let start = Instant::now();
        let outcome = execute(
            &ctx,
            &client,
            &config(Duration::from_secs(60)),
            &counters,
            None,
        )
        .await;
        canceller.await.unwrap();

        assert_eq!(outcome, Outcome::Failure { kind: "cancelled" });
        assert!(start.elapsed() < Duration::from_secs(60));
        assert_eq!(counters.snapshot(), crate::Summary { total: 1, failed: 1 });
        assert_eq!(client.stats().abandoned(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_does_not_fail_request() {
        let client = FixedDelayClient::new(Duration::from_millis(10));
        let counters = Counters::new();
        let sink = FailingSink::new();

        let outcome = execute(
            &CancellationToken::new(),
            &client,
            &config(Duration::from_secs(60)),
            &counters,
            Some(&sink),
        )
        .await;

        assert!(outcome.is_success());
        assert_eq!(sink.attempts(), 1);
        assert_eq!(counters.snapshot().failed, 0);
    }
}
