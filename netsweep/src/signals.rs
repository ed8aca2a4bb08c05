//! Interrupt handling for a running sweep.

use std::future::Future;

/// Relay interrupts from `interrupt` to a running sweep.
///
/// The first interrupt calls `stop` and lets the sweep wind down. Returns
/// `true` when a second interrupt arrives, after which the caller should exit
/// without waiting. Returns `false` if the signal source fails.
pub async fn relay_interrupts<I, F, S>(mut interrupt: I, stop: S) -> bool
where
    I: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
    S: FnOnce(),
{
    if let Err(e) = interrupt().await {
        tracing::warn!("Cannot listen for interrupts: {}", e);
        return false;
    }
    tracing::warn!("Interrupt received, stopping the sweep (interrupt again to exit now)");
    stop();

    match interrupt().await {
        Ok(()) => {
            tracing::warn!("Second interrupt received, exiting");
            true
        }
        Err(e) => {
            tracing::warn!("Cannot listen for interrupts: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    type Interrupt = Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>;

    /// Signal source that fires once per `notify_one`
    fn source(notify: &Arc<Notify>) -> impl FnMut() -> Interrupt {
        let notify = notify.clone();
        move || {
            let notify = notify.clone();
            Box::pin(async move {
                notify.notified().await;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_first_interrupt_stops_second_exits() {
        let notify = Arc::new(Notify::new());
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        let relay = tokio::spawn(relay_interrupts(source(&notify), move || {
            flag.store(true, Ordering::SeqCst)
        }));

        notify.notify_one();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !stopped.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(!relay.is_finished());

        notify.notify_one();
        let exit = tokio::time::timeout(Duration::from_secs(5), relay)
            .await
            .unwrap()
            .unwrap();
        assert!(exit);
    }

    #[tokio::test]
    async fn test_failed_signal_source() {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        let exit = relay_interrupts(
            || async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no signals")) },
            move || flag.store(true, Ordering::SeqCst),
        )
        .await;
        assert!(!exit);
        assert!(!stopped.load(Ordering::SeqCst));
    }
}
