use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum JobFailure {
    #[error("job panicked: {0}")]
    Panicked(String),
    #[error("job was cancelled before completing")]
    Cancelled,
    #[error("worker pool is closed")]
    PoolClosed,
}

/// Bounded set of execution slots shared by every evaluation that holds a
/// clone of it.
///
/// The pool never holds more than `size` jobs in flight, no matter how many
/// jobs one fan-out submits or how many callers submit at once. A slot is
/// owned by the running job and returned when the job finishes, panics, or is
/// aborted.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self { slots: Arc::new(Semaphore::new(size)), size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Runs every job on the pool and waits for all of them.
    ///
    /// Outcomes come back in submission order. Jobs still running when the
    /// returned future is dropped are aborted.
    pub async fn run_all<F, T>(&self, jobs: Vec<F>) -> Vec<Result<T, JobFailure>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let total = jobs.len();
        let mut tasks = JoinSet::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let slots = Arc::clone(&self.slots);
            tasks.spawn(async move {
                let _slot = match slots.acquire_owned().await {
                    Ok(slot) => slot,
                    Err(_) => return (index, Err(JobFailure::PoolClosed)),
                };
                let outcome = AssertUnwindSafe(job)
                    .catch_unwind()
                    .await
                    .map_err(|payload| JobFailure::Panicked(panic_message(payload.as_ref())));
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<Result<T, JobFailure>>> =
            std::iter::repeat_with(|| None).take(total).collect();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, outcome)) = joined {
                outcomes[index] = Some(outcome);
            }
        }

        outcomes.into_iter().map(|outcome| outcome.unwrap_or(Err(JobFailure::Cancelled))).collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
