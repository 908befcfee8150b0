//! Shared request throttling
//!
//! The RequestThrottle bounds how many requests are in flight and spaces the
//! start of consecutive requests by a (optionally jittered) minimum delay. One
//! throttle is shared by every listing page and document request of a harvest,
//! so the source sees a single, polite request stream.

use crate::config::ThrottleConfig;
use crate::error::{Error, Result};
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Process-wide request limiter (cloneable, all state is shared)
///
/// # Algorithm
///
/// - A semaphore caps the number of requests in flight
/// - `next_slot` holds the earliest instant the next request may start
///   (nanoseconds since a process-wide monotonic epoch)
/// - Each acquisition claims the current slot with a CAS and pushes it forward
///   by one delay, then sleeps until its slot arrives
#[derive(Clone)]
pub struct RequestThrottle {
    config: Arc<ThrottleConfig>,
    permits: Arc<Semaphore>,
    next_slot: Arc<AtomicU64>,
}

/// Permission to run one request; the slot is released on drop
pub struct ThrottlePermit {
    _permit: OwnedSemaphorePermit,
}

impl RequestThrottle {
    /// Create a throttle from validated settings
    pub fn new(config: ThrottleConfig) -> Result<Self> {
        config.validate()?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent_requests));
        Ok(Self {
            config: Arc::new(config),
            permits,
            next_slot: Arc::new(AtomicU64::new(Self::now_nanos())),
        })
    }

    /// Settings this throttle was built from
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Wait for a free request slot and for the inter-request delay to elapse
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gazette_dl::config::ThrottleConfig;
    /// use gazette_dl::throttle::RequestThrottle;
    /// use std::time::Duration;
    ///
    /// # async fn example() -> gazette_dl::Result<()> {
    /// let throttle = RequestThrottle::new(ThrottleConfig {
    ///     max_concurrent_requests: 6,
    ///     download_delay: Duration::from_millis(1500),
    ///     ..Default::default()
    /// })?;
    ///
    /// let _permit = throttle.acquire().await?;
    /// // ... perform the request while holding the permit ...
    /// # Ok(())
    /// # }
    /// ```
    pub async fn acquire(&self) -> Result<ThrottlePermit> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::ShuttingDown)?;

        let wait = self.claim_slot();
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        Ok(ThrottlePermit { _permit: permit })
    }

    /// Stop handing out permits; pending and future acquisitions fail
    pub fn close(&self) {
        self.permits.close();
    }

    /// Number of requests that could start right now without waiting for a permit
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Reserve the next start slot and return how long to wait for it
    fn claim_slot(&self) -> Duration {
        let delay = self.jittered_delay();
        let delay_nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);

        loop {
            let now = Self::now_nanos();
            let slot = self.next_slot.load(Ordering::SeqCst);
            let start = slot.max(now);
            let next = start.saturating_add(delay_nanos);

            if self
                .next_slot
                .compare_exchange(slot, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Duration::from_nanos(start - now);
            }
            // Another request claimed the slot first, retry with the new value
        }
    }

    /// Delay scaled by a random factor within the configured jitter bounds
    fn jittered_delay(&self) -> Duration {
        let base = self.config.download_delay;
        if base.is_zero() || !self.config.randomize_download_delay {
            return base;
        }
        let (low, high) = (self.config.jitter_min_factor, self.config.jitter_max_factor);
        let factor = if high > low {
            rand::thread_rng().gen_range(low..=high)
        } else {
            low
        };
        Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }

    /// Get current monotonic time in nanoseconds
    ///
    /// The epoch is arbitrary but consistent within a process lifetime.
    fn now_nanos() -> u64 {
        static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        let start = START.get_or_init(Instant::now);
        start.elapsed().as_nanos() as u64
    }
}
