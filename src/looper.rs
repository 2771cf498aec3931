use std::{future::Future, pin::Pin};

use async_trait::async_trait;
use color_eyre::Result;

/// A single invocation of the caller's work function.
pub type WorkFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// The unit of work a looper drives: one iteration of application logic,
/// reporting success or a terminal error.
pub type WorkFn = Box<dyn FnMut() -> WorkFuture + Send>;

/// Box an ordinary async closure into a [`WorkFn`].
pub fn work_fn<F, Fut>(mut f: F) -> WorkFn
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(move || Box::pin(f()) as WorkFuture)
}

/// The contract shared by all loop runner variants.
///
/// A looper drives repeated invocation of a caller-supplied work function
/// inside a background task, watches for a termination request, and delivers
/// exactly one completion result. The looper never spawns the task itself;
/// callers run `run()` inside their own spawn and block on `wait()` from
/// wherever they need the outcome.
///
/// Usage contract, not runtime-guarded:
/// - `run()` is called once per instance. Instances are not reusable after
///   completion.
/// - `wait()` has a single consumer; fan-out over the one buffered result is
///   not supported.
/// - Termination is cooperative. A work function that never returns blocks
///   termination indefinitely; long-blocking work is responsible for its own
///   interruption checks.
#[async_trait]
pub trait Looper: Send + Sync {
    /// Drive `work` according to this variant's scheduling policy, blocking
    /// the calling task until the loop stops: budget exhausted, work
    /// function error, or quit requested.
    async fn run(&self, work: WorkFn);

    /// Block until the loop has delivered its completion result, then return
    /// it: `Ok(())` for a clean stop, the work function's error otherwise.
    async fn wait(&self) -> Result<()>;

    /// Force-deliver a completion result now, as if the loop had stopped
    /// with it. Never blocks; a no-op when a result was already delivered.
    fn done(&self, result: Result<()>);

    /// Request cooperative termination. Non-blocking and idempotent; the
    /// running loop observes it at the next checkpoint between iterations
    /// and stops cleanly.
    fn quit(&self);
}
