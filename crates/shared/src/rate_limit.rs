//! Sliding-window rate limiting for authentication endpoints
//!
//! Attempts are tracked per key (client IP) in process memory. State does not
//! survive a restart; the limiter is an abuse deterrent, not a security
//! boundary. Keys are distributed across a fixed set of mutex-guarded shards
//! so concurrent requests for different keys do not contend.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use time::{Duration, OffsetDateTime};

const SHARD_COUNT: usize = 16;

type AttemptMap = HashMap<String, Vec<OffsetDateTime>>;

/// Limits for one class of endpoint
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_attempts: usize,
    pub window: Duration,
}

impl RateLimitConfig {
    /// Login attempts: 5 per 15 minutes per client address
    pub const LOGIN: Self = Self {
        max_attempts: 5,
        window: Duration::minutes(15),
    };

    /// Registration attempts: 3 per 60 minutes per client address
    pub const REGISTRATION: Self = Self {
        max_attempts: 3,
        window: Duration::minutes(60),
    };
}

/// Returned when a key has exhausted its attempts for the current window
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("rate limit exceeded, retry in {retry_after_secs}s")]
pub struct RateLimited {
    /// Seconds until the oldest retained attempt leaves the window
    pub retry_after_secs: u64,
}

/// In-memory sliding-window rate limiter
///
/// Cloning is cheap; clones share the same underlying counters.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    shards: Arc<[Mutex<AttemptMap>; SHARD_COUNT]>,
}

impl RateLimiter {
    /// Create a limiter backed by process memory
    pub fn new_in_memory(config: RateLimitConfig) -> Self {
        Self {
            config,
            shards: Arc::new(std::array::from_fn(|_| Mutex::new(HashMap::new()))),
        }
    }

    /// Check the sliding window for `key` and record the attempt if allowed
    ///
    /// Attempts older than the window are discarded on every check. When the
    /// retained count has reached the limit, the call fails WITHOUT recording
    /// a new attempt, so a throttled client cannot push its own window
    /// forward by retrying.
    pub fn check_and_record(&self, key: &str) -> Result<(), RateLimited> {
        self.check_and_record_at(key, OffsetDateTime::now_utc())
    }

    /// Window check against an explicit clock, used by tests
    pub fn check_and_record_at(&self, key: &str, now: OffsetDateTime) -> Result<(), RateLimited> {
        let mut shard = self.shard_for(key);
        let attempts = shard.entry(key.to_string()).or_default();

        let cutoff = now - self.config.window;
        attempts.retain(|at| *at > cutoff);

        if attempts.len() >= self.config.max_attempts {
            let oldest = attempts.iter().min().copied().unwrap_or(now);
            let retry_after_secs = (oldest + self.config.window - now).whole_seconds().max(0) as u64;
            return Err(RateLimited { retry_after_secs });
        }

        attempts.push(now);
        Ok(())
    }

    /// Forget all recorded attempts for `key`
    ///
    /// Called after a successful login so a user who mistyped a password a
    /// few times is not penalized on subsequent requests.
    pub fn reset(&self, key: &str) {
        self.shard_for(key).remove(key);
    }

    fn shard_for(&self, key: &str) -> MutexGuard<'_, AttemptMap> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % SHARD_COUNT;
        // A poisoned shard only means another thread panicked mid-insert;
        // the map itself is still usable.
        match self.shards[index].lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
