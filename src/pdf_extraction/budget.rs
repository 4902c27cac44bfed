// Wall-clock budget checked at stage boundaries
use std::time::{Duration, Instant};

use crate::error::{IngestError, Result};

/// Cooperative deadline for one document. Nothing is preempted; callers
/// check at stage boundaries and stop at the next one after the limit.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    started: Instant,
    limit: Duration,
}

impl TimeBudget {
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.elapsed() >= self.limit
    }

    pub fn check(&self, stage: &'static str) -> Result<()> {
        let elapsed = self.elapsed();
        if elapsed >= self.limit {
            return Err(IngestError::TimeoutExceeded {
                stage,
                elapsed,
                budget: self.limit,
            });
        }
        Ok(())
    }
}
