//! Turning termination signals into a one-shot cancellation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cancels a token at most once, however many callers race to do it.
#[derive(Debug, Clone)]
pub struct CancelOnce {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
    cancellations: Arc<AtomicUsize>,
}

impl CancelOnce {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            fired: Arc::new(AtomicBool::new(false)),
            cancellations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Cancel the token. Returns `true` only for the call that did it.
    pub fn trigger(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancellations.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
        true
    }

    /// How many times the cancel function actually ran (0 or 1).
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Listens for termination signals until its token is done.
///
/// The first signal cancels the token; later signals are ignored. The listener
/// exits once the token is cancelled, whether by a signal or by the owner
/// through [`CancellationController::shutdown`].
pub struct CancellationController {
    cancel: CancelOnce,
    listener: JoinHandle<()>,
}

impl CancellationController {
    pub fn attach<S>(token: CancellationToken, signals: S) -> Self
    where
        S: Stream<Item = ()> + Send + 'static,
    {
        let cancel = CancelOnce::new(token);
        let listener = tokio::spawn(listen(cancel.clone(), signals));
        Self { cancel, listener }
    }

    pub fn cancel_handle(&self) -> &CancelOnce {
        &self.cancel
    }

    /// Cancel the token if no signal did, then wait for the listener to exit.
    pub async fn shutdown(self) {
        self.cancel.trigger();
        if let Err(e) = self.listener.await {
            debug!(error = %e, "Signal listener ended abnormally");
        }
    }
}

async fn listen<S>(cancel: CancelOnce, signals: S)
where
    S: Stream<Item = ()> + Send,
{
    let mut signals = std::pin::pin!(signals);
    loop {
        tokio::select! {
            biased;
            _ = cancel.token().cancelled() => {
                debug!("Cancelled context, stopping signal listener");
                return;
            }
            signal = signals.next() => match signal {
                Some(()) => {
                    info!("Received a stop signal");
                    if !cancel.trigger() {
                        debug!("Cancellation already in progress, ignoring signal");
                    }
                }
                None => {
                    // Source closed: nothing left to listen to, but stay
                    // attached until the token is done.
                    cancel.token().cancelled().await;
                    return;
                }
            },
        }
    }
}

/// SIGINT and SIGTERM as one stream.
#[cfg(unix)]
pub fn termination_signals() -> std::io::Result<impl Stream<Item = ()> + Send + 'static> {
    use tokio::signal::unix::{signal, SignalKind};

    let interrupt = signal(SignalKind::interrupt())?;
    let terminate = signal(SignalKind::terminate())?;
    Ok(futures::stream::unfold(
        (interrupt, terminate),
        |(mut interrupt, mut terminate)| async move {
            let received = tokio::select! {
                r = interrupt.recv() => r,
                r = terminate.recv() => r,
            };
            received.map(|()| ((), (interrupt, terminate)))
        },
    ))
}

/// Ctrl-C as a stream.
#[cfg(not(unix))]
pub fn termination_signals() -> std::io::Result<impl Stream<Item = ()> + Send + 'static> {
    Ok(futures::stream::unfold((), |()| async {
        tokio::signal::ctrl_c().await.ok().map(|()| ((), ()))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use std::time::Duration;

    #[test]
    fn test_cancel_once_under_races() {
        let cancel = CancelOnce::new(CancellationToken::new());
        let winners: usize = (0..16)
            .map(|_| {
                let cancel = cancel.clone();
                std::thread::spawn(move || cancel.trigger())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();

        assert_eq!(winners, 1);
        assert_eq!(cancel.cancellations(), 1);
        assert!(cancel.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_two_signals_cancel_once() {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded();
        let controller = CancellationController::attach(token.clone(), rx);

        tx.unbounded_send(()).unwrap();
        tx.unbounded_send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .expect("token was not cancelled");

        let cancel = controller.cancel_handle().clone();
        tokio::time::timeout(Duration::from_secs(5), controller.shutdown())
            .await
            .expect("listener did not exit");
        assert_eq!(cancel.cancellations(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_without_signal_stops_listener() {
        let token = CancellationToken::new();
        let (_tx, rx) = mpsc::unbounded::<()>();
        let controller = CancellationController::attach(token.clone(), rx);

        assert!(!token.is_cancelled());
        let cancel = controller.cancel_handle().clone();
        tokio::time::timeout(Duration::from_secs(5), controller.shutdown())
            .await
            .expect("listener did not exit");

        assert!(token.is_cancelled());
        assert_eq!(cancel.cancellations(), 1);
    }

    #[tokio::test]
    async fn test_closed_signal_source_waits_for_token() {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded::<()>();
        drop(tx);
        let controller = CancellationController::attach(token.clone(), rx);

        tokio::task::yield_now().await;
        assert!(!token.is_cancelled());

        tokio::time::timeout(Duration::from_secs(5), controller.shutdown())
            .await
            .expect("listener did not exit");
    }

    #[tokio::test]
    async fn test_signal_after_external_cancel_is_ignored() {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded();
        let controller = CancellationController::attach(token.clone(), rx);

        assert!(controller.cancel_handle().trigger());
        // The listener may already be gone; a late signal must not panic.
        let _ = tx.unbounded_send(());

        let cancel = controller.cancel_handle().clone();
        controller.shutdown().await;
        assert_eq!(cancel.cancellations(), 1);
    }
}
