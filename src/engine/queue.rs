//! Serialized task queue for the polling fan-out
//!
//! At most one per-location check is in flight at any moment, keeping the
//! polling traffic flat enough to stay under the remote rate limiter. The
//! queue can be paused: future tasks in the batch are withheld while the
//! in-flight task always runs to completion. Pausing is advisory, not
//! preemptive.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Outcome of one submitted task
#[derive(Debug)]
pub enum TaskOutcome<T> {
    /// The task was dispatched and ran to completion
    Completed(T),

    /// The queue was paused before this task could dispatch
    Skipped,
}

impl<T> TaskOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Skipped => None,
        }
    }
}

/// Ordered dispatch queue with one in-flight permit and pause/resume
#[derive(Clone)]
pub struct TaskQueue {
    in_flight: Arc<Semaphore>,
    paused: Arc<AtomicBool>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Semaphore::new(1)),
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop dispatching new tasks. In-flight work is not cancelled.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        debug!("queue paused");
    }

    /// Allow dispatch again
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        debug!("queue resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Run a batch of tasks in submission order and await them all.
    ///
    /// Tasks dispatch one at a time behind the in-flight permit, so
    /// completion order equals submission order. A task submitted while the
    /// queue is paused is skipped, never queued for later.
    pub async fn run_batch<F, T>(&self, tasks: Vec<F>) -> Vec<TaskOutcome<T>>
    where
        F: Future<Output = T>,
    {
        let mut outcomes = Vec::with_capacity(tasks.len());

        for task in tasks {
            if self.is_paused() {
                outcomes.push(TaskOutcome::Skipped);
                continue;
            }

            let permit = self.in_flight.acquire().await;
            match permit {
                Ok(_permit) => outcomes.push(TaskOutcome::Completed(task.await)),
                // The semaphore is never closed; treat a closed permit the
                // same as a paused queue rather than panic.
                Err(_) => outcomes.push(TaskOutcome::Skipped),
            }
        }

        outcomes
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_runs_in_submission_order() {
        let queue = TaskQueue::new();
        let tasks: Vec<_> = (0..4).map(|n| async move { n }).collect();

        let outcomes = queue.run_batch(tasks).await;
        let values: Vec<i32> = outcomes.into_iter().filter_map(|o| o.completed()).collect();
        assert_eq!(values, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_pause_skips_remaining_tasks() {
        let queue = TaskQueue::new();
        let pause_handle = queue.clone();

        // The second task pauses the queue; the third must be skipped.
        let outcomes = queue
            .run_batch(vec![
                Box::pin(async { 1 }) as std::pin::Pin<Box<dyn Future<Output = i32>>>,
                Box::pin(async move {
                    pause_handle.pause();
                    2
                }),
                Box::pin(async { 3 }),
            ])
            .await;

        let values: Vec<i32> = outcomes.into_iter().filter_map(|o| o.completed()).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_resume_allows_next_batch() {
        let queue = TaskQueue::new();
        queue.pause();

        let skipped = queue.run_batch(vec![async { 1 }]).await;
        assert!(skipped.into_iter().next().unwrap().completed().is_none());

        queue.resume();
        let ran = queue.run_batch(vec![async { 1 }]).await;
        assert_eq!(ran.into_iter().filter_map(|o| o.completed()).count(), 1);
    }
}
