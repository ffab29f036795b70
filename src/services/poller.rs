#[cfg(test)]
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Time source for polling.
pub trait Clock: Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration)
    }
}

/// Clock that only moves when slept on or advanced.
#[cfg(test)]
#[derive(Debug)]
pub struct FakeClock {
    base: Instant,
    offset: Mutex<Duration>,
}

#[cfg(test)]
impl FakeClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    /// Total fake time passed since construction.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollTimeout {
    Forever,
    Once,
    Within(Duration),
}

impl PollTimeout {
    /// Config convention: negative waits forever, zero is a single attempt.
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            s if s < 0 => PollTimeout::Forever,
            0 => PollTimeout::Once,
            s => PollTimeout::Within(Duration::from_secs(s.unsigned_abs())),
        }
    }
}

const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub struct Poller<C: Clock> {
    clock: C,
}

impl<C: Clock> Poller<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Retries `check` until it reports ready or the timeout runs out.
    ///
    /// `check` receives the time left for its attempt, `None` when the wait is unbounded.
    /// An `Err` from `check` counts as "not ready". Bounded waits start a new attempt only
    /// while more than one interval remains, so they make at most `ceil(timeout / interval) + 1`
    /// attempts and never sleep past the timeout.
    pub fn wait_until_ready<F>(
        &self,
        what: &str,
        timeout: PollTimeout,
        interval: Duration,
        mut check: F,
    ) -> bool
    where
        F: FnMut(Option<Duration>) -> anyhow::Result<bool>,
    {
        let interval = interval.max(MIN_INTERVAL);
        let start = self.clock.now();
        let remaining = |limit: Duration| {
            limit.saturating_sub(self.clock.now().saturating_duration_since(start))
        };
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            let budget = match timeout {
                PollTimeout::Within(limit) => Some(remaining(limit)),
                PollTimeout::Forever | PollTimeout::Once => None,
            };
            let last_error = match check(budget) {
                Ok(true) => {
                    info!("{} | ready after {} attempt(s)", what, attempt);
                    return true;
                }
                Ok(false) => None,
                Err(e) => Some(e),
            };

            let retry = match timeout {
                PollTimeout::Forever => true,
                PollTimeout::Once => false,
                PollTimeout::Within(limit) => remaining(limit) > interval,
            };

            match (retry, last_error) {
                (true, err) => {
                    match err {
                        Some(e) => debug!("{} | attempt {} failed: {:#}", what, attempt, e),
                        None => debug!("{} | attempt {} not ready", what, attempt),
                    }
                    self.clock.sleep(interval);
                }
                (false, Some(e)) => {
                    warn!("{} | not ready after {} attempt(s): {:#}", what, attempt, e);
                    return false;
                }
                (false, None) => {
                    warn!("{} | not ready after {} attempt(s)", what, attempt);
                    return false;
                }
            }
        }
    }
}
