//! Shared HTTP agent and the crate-wide retry policy.

use std::sync::OnceLock;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Return a shared HTTP agent with consistent timeouts.
///
/// Every network collaborator call goes through this agent so no call can
/// hang past the read timeout.
pub fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .build()
    })
}

/// Bounded retry policy with a fresh per-attempt resource.
///
/// Every retrying call site in the crate uses this one policy instead of
/// open-coding its own loop. The resource supplier is drawn once per
/// attempt, which is how downloads rotate their egress proxy.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first try.
    pub max_attempts: usize,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `action` up to `max_attempts` times, supplying a fresh resource
    /// each attempt. Returns the first success or the last error.
    pub fn run_with_resource<R, T, E, S, F>(&self, mut supply: S, mut action: F) -> Result<T, E>
    where
        S: FnMut() -> R,
        F: FnMut(R) -> Result<T, E>,
    {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match action(supply()) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    std::thread::sleep(self.delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_stops_after_first_success() {
        let policy = RetryPolicy::new(4, Duration::ZERO);
        let mut attempts = 0usize;
        let result: Result<u32, &'static str> = policy.run_with_resource(
            || (),
            |()| {
                attempts += 1;
                if attempts < 3 {
                    Err("fail")
                } else {
                    Ok(7)
                }
            },
        );
        assert_eq!(result, Ok(7));
        assert_eq!(attempts, 3);
    }

    #[test]
    fn retry_returns_last_error_when_exhausted() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let mut attempts = 0usize;
        let result: Result<u32, usize> = policy.run_with_resource(
            || (),
            |()| {
                attempts += 1;
                Err(attempts)
            },
        );
        assert_eq!(result, Err(3));
    }

    #[test]
    fn resource_is_drawn_fresh_each_attempt() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let mut drawn = Vec::new();
        let mut counter = 0usize;
        let _: Result<(), ()> = policy.run_with_resource(
            || {
                counter += 1;
                counter
            },
            |r| {
                drawn.push(r);
                Err(())
            },
        );
        assert_eq!(drawn, vec![1, 2, 3]);
    }
}
