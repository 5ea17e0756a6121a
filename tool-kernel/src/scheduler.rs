//! Admission control for in-flight requests.
//!
//! A request only gets a task once it holds a slot. Callers of
//! [`TaskScheduler::spawn`] wait while every slot is busy, so the frame
//! reader stops pulling input when handlers or the response writer fall
//! behind.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

const DEFAULT_MAX_IN_FLIGHT: NonZeroUsize = match NonZeroUsize::new(32) {
    Some(limit) => limit,
    None => NonZeroUsize::MIN,
};

/// Maximum number of requests holding a slot at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    max_in_flight: NonZeroUsize,
}

impl SchedulerConfig {
    /// Creates a configuration with the supplied slot count.
    #[must_use]
    pub const fn new(max_in_flight: NonZeroUsize) -> Self {
        Self { max_in_flight }
    }

    /// Returns the slot count.
    #[must_use]
    pub const fn max_in_flight(self) -> NonZeroUsize {
        self.max_in_flight
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT)
    }
}

/// Fixed pool of request slots.
///
/// Clones share the same slots. Closing any clone closes them all.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    slots: Arc<Semaphore>,
    config: SchedulerConfig,
}

impl TaskScheduler {
    /// Creates a scheduler with every slot free.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(config.max_in_flight().get())),
            config,
        }
    }

    /// Returns the associated configuration.
    #[must_use]
    pub const fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Returns how many slots are currently free.
    #[must_use]
    pub fn idle_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Returns `true` once [`TaskScheduler::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    /// Stops admitting work.
    ///
    /// Callers waiting in [`TaskScheduler::spawn`] are released with
    /// [`SchedulerError::Closed`]. Tasks that already hold a slot keep
    /// running.
    pub fn close(&self) {
        self.slots.close();
    }

    /// Waits for a free slot, then runs `future` on its own task.
    ///
    /// The slot is released when the future completes or the task is
    /// aborted.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Closed`] if the scheduler is closed before
    /// a slot frees up.
    pub async fn spawn<F, T>(&self, future: F) -> SchedulerResult<JoinHandle<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let slot = self.admit().await?;
        Ok(tokio::spawn(async move {
            let output = future.await;
            drop(slot);
            output
        }))
    }

    async fn admit(&self) -> SchedulerResult<OwnedSemaphorePermit> {
        Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| SchedulerError::Closed)
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

/// Errors produced by the scheduler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler no longer admits work.
    #[error("scheduler closed")]
    Closed,
}

/// Result alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
