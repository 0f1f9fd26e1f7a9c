//! Reconnect with exponential backoff.
//!
//! The transport owns the connection; this policy tells an outer shell how
//! long to wait between attempts after the link drops. Delays grow
//! exponentially and carry random jitter so a fleet of clients does not
//! reconnect in lockstep after a server restart.
//!
//! # Example
//!
//! ```rust,ignore
//! let policy = ReconnectPolicy::builder()
//!     .max_attempts(5)
//!     .initial_delay(Duration::from_millis(250))
//!     .build();
//!
//! let socket = reconnect_with_backoff(&policy, || connect(&url)).await?;
//! ```

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Backoff policy for reconnect attempts.
///
/// # Default Values
///
/// - `max_attempts`: 10
/// - `initial_delay`: 500ms
/// - `max_delay`: 30 seconds
/// - `multiplier`: 2.0
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Attempts before giving up
    pub max_attempts: u32,
    /// Base delay before the first retry
    pub initial_delay: Duration,
    /// Cap for the exponential growth
    pub max_delay: Duration,
    /// Growth factor per attempt
    pub multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ReconnectPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> ReconnectPolicyBuilder {
        ReconnectPolicyBuilder {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// Upper bound of the delay before retry number `attempt` (0-indexed)
    ///
    /// `min(initial_delay * multiplier^attempt, max_delay)`, never negative
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_possible_wrap)]
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt.min(64) as i32);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()).max(0.0))
    }

    /// Delay before retry number `attempt`, with jitter
    ///
    /// Uniform in `[base / 2, base]`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        self.base_delay(attempt).mul_f64(jitter)
    }

    /// True while another attempt is allowed
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Builder for [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub struct ReconnectPolicyBuilder {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl ReconnectPolicyBuilder {
    /// Set maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set base delay before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set growth factor.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Build the [`ReconnectPolicy`].
    #[must_use]
    pub const fn build(self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
        }
    }
}

/// Run `connect` until it succeeds or the policy gives up.
///
/// # Errors
///
/// Returns the last error once `max_attempts` attempts have failed.
pub async fn reconnect_with_backoff<F, Fut, T, E>(
    policy: &ReconnectPolicy,
    mut connect: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match connect().await {
            Ok(connection) => {
                if attempt > 0 {
                    tracing::info!(attempt, "Reconnected");
                }
                return Ok(connection);
            },
            Err(error) => {
                attempt += 1;
                if !policy.should_retry(attempt) {
                    tracing::error!(attempt, %error, "Giving up reconnecting");
                    return Err(error);
                }

                let delay = policy.delay_for_attempt(attempt - 1);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    %error,
                    "Connect failed, retrying"
                );
                tokio::time::sleep(delay).await;
            },
        }
    }
}
