//! Concurrency control for per-file tasks

use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::info;

use crate::error::{Result, ImgpressError};

pub mod progress;

pub use progress::*;

/// Optional cap on in-flight per-file work.
///
/// Unbounded by default: every file of every entry is scheduled at once
/// and `acquire` returns immediately.
#[derive(Debug)]
pub struct ConcurrencyLimit {
    semaphore: Option<Semaphore>,
    max_concurrent: Option<usize>,
}

impl ConcurrencyLimit {
    /// Create a limit; `None` means unbounded
    pub fn new(max_concurrent: Option<usize>) -> Self {
        match max_concurrent {
            Some(limit) => {
                info!("Limiting per-file work to {} concurrent tasks", limit);
                Self {
                    semaphore: Some(Semaphore::new(limit)),
                    max_concurrent: Some(limit),
                }
            }
            None => Self::unbounded(),
        }
    }

    /// No limit at all
    pub fn unbounded() -> Self {
        Self {
            semaphore: None,
            max_concurrent: None,
        }
    }

    /// Maximum permits, if bounded
    pub fn max_concurrent(&self) -> Option<usize> {
        self.max_concurrent
    }

    /// Wait for a slot. The returned permit frees the slot on drop.
    pub async fn acquire(&self) -> Result<Option<SemaphorePermit<'_>>> {
        match &self.semaphore {
            Some(semaphore) => {
                let permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| ImgpressError::task(format!("Semaphore closed: {}", e)))?;
                Ok(Some(permit))
            }
            None => Ok(None),
        }
    }
}

impl Default for ConcurrencyLimit {
    fn default() -> Self {
        Self::unbounded()
    }
}
