use std::time::Duration;

/// Pacing for the supervisor's reconnect loop. There is no attempt cap:
/// the supervisor retries for as long as the process runs.
#[derive(Clone, Debug)]
pub struct ReconnectConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.2,
        }
    }
}

/// Tracks consecutive failed attempts and hands out the next sleep.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay before the next attempt; advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Back to the base delay after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Exponential backoff with jitter, floored at 100ms.
    fn delay_for(&self, attempt: u32) -> Duration {
        let doubled = self.config.base_delay.as_millis() as f64 * 2.0_f64.powi(attempt as i32);
        let capped = doubled.min(self.config.max_delay.as_millis() as f64);

        // Spread delays across ±jitter_factor of the capped value.
        let band = capped * self.config.jitter_factor;
        let jitter = (random_u64() % (band as u64 * 2 + 1)) as f64 - band;

        Duration::from_millis((capped + jitter).max(100.0) as u64)
    }
}

/// Non-cryptographic xorshift64 over per-thread state. Only used to
/// decorrelate reconnect timing; never for anything secret.
fn random_u64() -> u64 {
    use std::cell::Cell;
    use std::time::{SystemTime, UNIX_EPOCH};

    thread_local! {
        // Seeded from the clock; the low bit is forced on because zero is
        // a fixed point of xorshift.
        static STATE: Cell<u64> = Cell::new(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
                | 1,
        );
    }

    STATE.with(|state| {
        let mut x = state.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        state.set(x);
        x
    })
}
