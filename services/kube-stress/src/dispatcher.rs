//! Rate-limited launching of list requests.
//!
//! The dispatcher turns a rate and a duration into a stream of request tasks:
//! - One task per tick of a `1 / qps` ticker, round-robin over the client pool
//! - No cap on in-flight requests; the ticker is the only throttle
//! - Stops ticking when the duration has elapsed or the context is cancelled
//! - Waits for every launched task before reading the counters

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use stress_common::{ClientHandle, ResultSink};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::ClientPool;
use crate::config::DispatchConfig;
use crate::counters::{Counters, Summary};
use crate::worker;

/// Lifecycle of a run. States are only ever entered in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    /// Launching a request on every tick
    Running,
    /// Cancellation or deadline observed, no further requests launched
    Cancelling,
    /// Tick loop exited, waiting for in-flight requests
    Draining,
    /// Every request has returned; the summary is final
    Done,
}

impl RunState {
    fn next(self) -> Option<RunState> {
        match self {
            RunState::Running => Some(RunState::Cancelling),
            RunState::Cancelling => Some(RunState::Draining),
            RunState::Draining => Some(RunState::Done),
            RunState::Done => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Running => "running",
            RunState::Cancelling => "cancelling",
            RunState::Draining => "draining",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why the tick loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    DurationElapsed,
    Cancelled,
}

/// Launches one request per tick and joins them all before reporting.
pub struct Dispatcher {
    config: Arc<DispatchConfig>,
    sink: Option<Arc<dyn ResultSink>>,
    state: watch::Sender<RunState>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        let (state, _) = watch::channel(RunState::Running);
        Self {
            config: Arc::new(config),
            sink: None,
            state,
        }
    }

    /// Forward the latency of every successful request to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Watch the run move through [`RunState`].
    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Run until the configured duration has elapsed or `ctx` is cancelled,
    /// then wait for every launched request and return the totals.
    ///
    /// Reaching the deadline does not cancel `ctx`: requests still in flight
    /// are allowed to finish within their own timeout. A dispatcher runs once;
    /// `Done` is final for its state receivers.
    pub async fn run<C: ClientHandle + ?Sized>(
        self,
        ctx: &CancellationToken,
        pool: &ClientPool<C>,
    ) -> Summary {
        let period = self.config.tick_interval();
        let total_duration = self.config.total_duration();
        let counters = Arc::new(Counters::new());
        let mut workers = JoinSet::new();

        let start = Instant::now();
        let mut ticks: u64 = 0;
        let reason = match schedule(start, period) {
            None => {
                warn!(
                    ?period,
                    "Tick interval too long to schedule, no list calls will be made"
                );
                self.advance(RunState::Cancelling);
                StopReason::DurationElapsed
            }
            Some(mut ticker) => loop {
                if start.elapsed() >= total_duration {
                    self.advance(RunState::Cancelling);
                    break StopReason::DurationElapsed;
                }

                tokio::select! {
                    biased;
                    _ = ctx.cancelled() => {
                        self.advance(RunState::Cancelling);
                        break StopReason::Cancelled;
                    }
                    _ = ticker.tick() => {
                        if start.elapsed() >= total_duration {
                            self.advance(RunState::Cancelling);
                            break StopReason::DurationElapsed;
                        }

                        let client = pool.get(ticks as usize);
                        ticks += 1;

                        let ctx = ctx.clone();
                        let config = Arc::clone(&self.config);
                        let counters = Arc::clone(&counters);
                        let sink = self.sink.clone();
                        workers.spawn(async move {
                            let sink = sink.as_deref();
                            worker::execute(&ctx, client.as_ref(), &config, &counters, sink).await;
                        });

                        // Reap finished tasks so long runs don't accumulate them.
                        while let Some(joined) = workers.try_join_next() {
                            log_join_error(joined);
                        }
                    }
                }
            },
        };

        debug!(
            ?reason,
            launched = ticks,
            in_flight = workers.len(),
            elapsed = ?start.elapsed(),
            "Stopped launching list calls"
        );
        self.advance(RunState::Draining);

        while let Some(joined) = workers.join_next().await {
            log_join_error(joined);
        }

        let summary = counters.snapshot();
        self.advance(RunState::Done);

        info!(
            launched = ticks,
            elapsed = ?start.elapsed(),
            "Finished listing objects for a duration of {:?}",
            total_duration
        );
        summary
    }

    fn advance(&self, to: RunState) {
        let from = *self.state.borrow();
        debug_assert_eq!(from.next(), Some(to), "invalid run state transition");
        debug!(%from, %to, "Run state changed");
        self.state.send_replace(to);
    }
}

/// Ticker firing every `period`, first one `period` after `start`.
///
/// `None` when the tick deadlines cannot be represented as an `Instant`, i.e.
/// no tick could ever fire.
fn schedule(start: Instant, period: Duration) -> Option<Interval> {
    let first = start.checked_add(period)?;
    first.checked_add(period)?;
    let mut ticker = interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    Some(ticker)
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "List worker task failed");
    }
}
