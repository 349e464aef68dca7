//! Bounded worker pool. Units run concurrently (at most `concurrency` at a time) and their
//! results are handed back in completion order, not submission order.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::common::Shutdown;

/// What the driving task gets back from [`WorkerPool::next_completed`]
#[derive(Debug)]
pub enum Completion<T> {
    Finished(T),
    /// The unit panicked; siblings are unaffected
    Crashed(String),
    /// Shutdown was requested; remaining units were aborted
    Interrupted,
}

enum Next<T> {
    Shutdown,
    Joined(Option<Result<T, JoinError>>),
}

pub struct WorkerPool<T> {
    tasks: JoinSet<T>,
    semaphore: Arc<Semaphore>,
    shutdown: Shutdown,
    interrupted: bool,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(concurrency: usize, shutdown: Shutdown) -> Self {
        Self {
            tasks: JoinSet::new(),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            shutdown,
            interrupted: false,
        }
    }

    /// Queue a unit; it starts as soon as a slot is free
    pub fn submit<F>(&mut self, unit: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        self.tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore should never be closed");
            unit.await
        });
    }

    /// Wait for the next unit to finish. Returns `None` once everything was collected
    /// or after an interruption was reported.
    pub async fn next_completed(&mut self) -> Option<Completion<T>> {
        if self.interrupted || self.tasks.is_empty() {
            return None;
        }

        let mut shutdown = self.shutdown.clone();
        let next = tokio::select! {
            biased;
            _ = shutdown.requested() => Next::Shutdown,
            joined = self.tasks.join_next() => Next::Joined(joined),
        };

        match next {
            Next::Shutdown => {
                self.tasks.abort_all();
                self.interrupted = true;
                Some(Completion::Interrupted)
            }
            Next::Joined(None) => None,
            Next::Joined(Some(Ok(value))) => Some(Completion::Finished(value)),
            Next::Joined(Some(Err(e))) => Some(Completion::Crashed(e.to_string())),
        }
    }
}
