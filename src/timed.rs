use std::time::Duration;

use async_trait::async_trait;
use color_eyre::Result;
use tokio::{select, time::sleep};
use tracing::debug;

use crate::{
    budget::Budget,
    control::{Control, DoneReceiver, DoneSender},
    looper::{Looper, WorkFn},
};

/// Runs the work function on a fixed wall-clock interval, for a fixed
/// iteration count or indefinitely.
///
/// Each interval is measured from the end of the previous iteration, not
/// from a fixed origin, so long runs accumulate drift. The inter-iteration
/// wait races the interval against a quit request, which bounds quit latency
/// to at most one interval plus whatever the in-flight work function takes.
pub struct TimedLooper {
    budget: Budget,
    interval: Duration,
    control: Control,
}

impl TimedLooper {
    pub fn new(budget: Budget, interval: Duration) -> Self {
        Self {
            budget,
            interval,
            control: Control::new(),
        }
    }

    /// Same as `new()`, but delivering completion into a caller-supplied
    /// channel (capacity >= 1).
    pub fn with_channel(
        budget: Budget,
        interval: Duration,
        done_tx: DoneSender,
        done_rx: DoneReceiver,
    ) -> Self {
        Self {
            budget,
            interval,
            control: Control::with_channel(done_tx, done_rx),
        }
    }
}

#[async_trait]
impl Looper for TimedLooper {
    async fn run(&self, mut work: WorkFn) {
        if self.budget.is_spent() {
            self.control.deliver(Ok(()));
            return;
        }

        let mut remaining = self.budget;
        loop {
            if let Err(err) = work().await {
                // Errors stop the loop right away, no waiting out the tick.
                self.control.deliver(Err(err));
                return;
            }

            if !remaining.consume() {
                self.control.deliver(Ok(()));
                return;
            }

            select! {
                _ = self.control.quit_signalled() => {
                    debug!("Quit requested, stopping interval loop");
                    self.control.deliver(Ok(()));
                    return;
                }
                _ = sleep(self.interval) => {}
            }
        }
    }

    async fn wait(&self) -> Result<()> {
        self.control.wait().await
    }

    fn done(&self, result: Result<()>) {
        self.control.deliver(result);
    }

    fn quit(&self) {
        self.control.quit();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use color_eyre::eyre::eyre;
    use tokio::{sync::mpsc, time::Instant};

    use super::*;
    use crate::looper::work_fn;

    const INTERVAL: Duration = Duration::from_millis(10);

    fn counting_work(counter: Arc<AtomicU64>) -> WorkFn {
        work_fn(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_never_invokes_work() {
        let looper = TimedLooper::new(Budget::Finite(0), INTERVAL);
        let counter = Arc::new(AtomicU64::new(0));

        looper.run(counting_work(counter.clone())).await;

        assert!(looper.wait().await.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn single_iteration_budget_skips_the_interval_wait() {
        let looper = TimedLooper::new(Budget::Finite(1), Duration::from_secs(3600));
        let counter = Arc::new(AtomicU64::new(0));
        let start = Instant::now();

        looper.run(counting_work(counter.clone())).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(looper.wait().await.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_of_two_waits_exactly_one_interval() {
        let looper = Arc::new(TimedLooper::new(Budget::Finite(2), INTERVAL));
        let counter = Arc::new(AtomicU64::new(0));
        let start = Instant::now();

        let task = tokio::spawn({
            let looper = looper.clone();
            let work = counting_work(counter.clone());
            async move { looper.run(work).await }
        });

        assert!(looper.wait().await.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        let elapsed = start.elapsed();
        assert!(elapsed >= INTERVAL);
        assert!(elapsed < INTERVAL * 2);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn quit_preempts_the_interval_wait() {
        let looper = Arc::new(TimedLooper::new(
            Budget::Unbounded,
            Duration::from_secs(3600),
        ));
        let (iter_tx, mut iter_rx) = mpsc::channel(8);

        let work = work_fn(move || {
            let iter_tx = iter_tx.clone();
            async move {
                let _ = iter_tx.send(()).await;
                Ok(())
            }
        });

        let start = Instant::now();
        let task = tokio::spawn({
            let looper = looper.clone();
            async move { looper.run(work).await }
        });

        iter_rx.recv().await.unwrap();
        looper.quit();

        assert!(looper.wait().await.is_ok());
        assert!(start.elapsed() < Duration::from_secs(3600));
        task.await.unwrap();

        // The loop must not have started another iteration after the quit.
        assert!(iter_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn work_error_stops_without_waiting_out_the_interval() {
        let looper = Arc::new(TimedLooper::new(
            Budget::Unbounded,
            Duration::from_secs(3600),
        ));
        let start = Instant::now();

        let work = work_fn(|| async { Err(eyre!("tick failed")) });

        let task = tokio::spawn({
            let looper = looper.clone();
            async move { looper.run(work).await }
        });

        let err = looper.wait().await.unwrap_err();
        assert_eq!(err.to_string(), "tick failed");
        assert_eq!(start.elapsed(), Duration::ZERO);
        task.await.unwrap();
    }
}
