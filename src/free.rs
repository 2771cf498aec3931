use async_trait::async_trait;
use color_eyre::Result;

use crate::{
    budget::Budget,
    control::{Control, DoneReceiver, DoneSender},
    looper::{Looper, WorkFn},
};

/// Runs the work function back-to-back with no delay between iterations,
/// for a fixed iteration count or indefinitely.
pub struct FreeLooper {
    budget: Budget,
    control: Control,
}

impl FreeLooper {
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            control: Control::new(),
        }
    }

    /// Same as `new()`, but delivering completion into a caller-supplied
    /// channel (capacity >= 1).
    pub fn with_channel(budget: Budget, done_tx: DoneSender, done_rx: DoneReceiver) -> Self {
        Self {
            budget,
            control: Control::with_channel(done_tx, done_rx),
        }
    }
}

#[async_trait]
impl Looper for FreeLooper {
    async fn run(&self, mut work: WorkFn) {
        if self.budget.is_spent() {
            self.control.deliver(Ok(()));
            return;
        }

        let mut remaining = self.budget;
        loop {
            if let Err(err) = work().await {
                self.control.deliver(Err(err));
                return;
            }

            if !remaining.consume() {
                self.control.deliver(Ok(()));
                return;
            }

            if self.control.quit_requested() {
                self.control.deliver(Ok(()));
                return;
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
