//! Background fetch plumbing shared by every view.

pub mod feeds;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Flag a view shares with its fetchers. While disabled the fetchers keep
/// ticking but skip network work.
#[derive(Debug, Clone)]
pub struct SendData(Arc<AtomicBool>);

impl Default for SendData {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl SendData {
    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::SeqCst);
    }

    /// Flip the flag, returning the new state.
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::SeqCst)
    }

    /// Disable until the guard drops, then restore whatever was set before.
    pub fn pause(&self) -> PauseGuard {
        let previous = self.0.swap(false, Ordering::SeqCst);
        PauseGuard {
            flag: self.clone(),
            previous,
        }
    }
}

#[must_use = "dropping the guard resumes immediately"]
pub struct PauseGuard {
    flag: SendData,
    previous: bool,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

/// A cancellation scope and the tasks started in it.
///
/// The first task to fail cancels the scope, so its siblings and the view
/// running under the same token wind down. [`TaskGroup::wait`] reports that
/// first failure.
pub struct TaskGroup {
    token: CancellationToken,
    tasks: JoinSet<Result<()>>,
}

impl TaskGroup {
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            tasks: JoinSet::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let token = self.token.clone();
        self.tasks.spawn(async move {
            let result = task.await;
            if result.is_err() {
                token.cancel();
            }
            result
        });
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Join every task and return the first error any of them produced.
    pub async fn wait(mut self) -> Result<()> {
        let mut first: Option<Error> = None;
        while let Some(joined) = self.tasks.join_next().await {
            let err = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => Error::Task(e.to_string()),
            };
            if first.is_none() {
                first = Some(err);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Run `action` every `period` until `token` is cancelled. The first tick is
/// immediate. An action in flight is dropped on cancellation.
pub async fn run_every<F, Fut>(token: &CancellationToken, period: Duration, mut action: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            _ = ticker.tick() => {}
        }
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            result = action() => result?,
        }
    }
}

/// Send one value, giving up if the scope is cancelled or nobody listens.
/// Returns whether the value was delivered.
pub async fn deliver<T>(token: &CancellationToken, tx: &mpsc::Sender<T>, value: T) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        sent = tx.send(value) => sent.is_ok(),
    }
}
