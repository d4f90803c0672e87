use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::providers::ProviderError;

const WINDOW: Duration = Duration::from_secs(60);

/// Rolling one-minute request ceiling shared by every call an adapter makes.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    issued: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn per_minute(limit: u32) -> Self {
        Self::with_window(limit, WINDOW)
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            issued: Mutex::new(VecDeque::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn acquire(&self) -> Result<(), ProviderError> {
        self.acquire_at(Instant::now())
    }

    /// Records a request at `now` unless the window is already full.
    pub fn acquire_at(&self, now: Instant) -> Result<(), ProviderError> {
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        while issued
            .front()
            .is_some_and(|&at| now.saturating_duration_since(at) >= self.window)
        {
            issued.pop_front();
        }

        if issued.len() >= self.limit as usize {
            return Err(ProviderError::RateLimited { limit: self.limit });
        }

        issued.push_back(now);
        Ok(())
    }
}
