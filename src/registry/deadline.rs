//! Shared deadline for the remote half of a push
//!
//! One [`Deadline`] is created when the repository is opened and every
//! subsequent network call runs against it. It is a single budget for the
//! whole operation, not a per-call timeout.

use crate::error::{PusherError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
            budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Run `call`, cancelling it if the deadline passes first
    pub async fn run<T, F>(&self, step: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout_at(self.expires_at, call).await {
            Ok(result) => result,
            Err(_) => Err(PusherError::Timeout {
                step: step.to_string(),
                budget: self.budget,
            }),
        }
    }
}
