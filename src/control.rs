use color_eyre::{Result, eyre::bail};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub type DoneSender = Sender<Result<()>>;
pub type DoneReceiver = Receiver<Result<()>>;

/// Completion and termination signaling shared by every looper variant.
///
/// The completion slot is a bounded channel written meaningfully at most
/// once: the first delivery wins and later ones are dropped without
/// blocking. The termination flag is a cancellation token, safe to set and
/// check any number of times from any task.
pub struct Control {
    done_tx: DoneSender,
    done_rx: Mutex<Option<DoneReceiver>>,
    quit: CancellationToken,
}

impl Control {
    pub fn new() -> Self {
        let (done_tx, done_rx) = mpsc::channel(1);
        Self::with_channel(done_tx, done_rx)
    }

    /// Wrap a caller-supplied completion channel. The channel must have a
    /// capacity of at least 1, otherwise every delivery is dropped.
    pub fn with_channel(done_tx: DoneSender, done_rx: DoneReceiver) -> Self {
        Self {
            done_tx,
            done_rx: Mutex::new(Some(done_rx)),
            quit: CancellationToken::new(),
        }
    }

    /// Deliver the completion result. Never blocks: once the slot is filled
    /// (or the receiver is gone), further results are dropped.
    pub fn deliver(&self, result: Result<()>) {
        if self.done_tx.try_send(result).is_err() {
            debug!("Completion already delivered, dropping result");
        }
    }

    /// Wait for the completion result. Single consumer: the first call
    /// claims the receiver, any later call errors out instead of hanging.
    pub async fn wait(&self) -> Result<()> {
        let rx = self.done_rx.lock().take();
        let Some(mut rx) = rx else {
            error!("Called wait() more than once");
            bail!("completion result was already consumed by an earlier wait()");
        };

        match rx.recv().await {
            Some(result) => result,
            // We hold a sender for as long as self lives, so the channel
            // can't close before a result is buffered.
            None => Ok(()),
        }
    }

    pub fn quit(&self) {
        self.quit.cancel();
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.is_cancelled()
    }

    /// Resolves once termination has been requested.
    pub async fn quit_signalled(&self) {
        self.quit.cancelled().await;
    }
}
