//! Process-wide cooldown tracking for the external AI service.
//!
//! Every AI-calling component consults [`QuotaGuard::is_exhausted`] before
//! calling out and reports rate-limit errors back through
//! [`QuotaGuard::mark_exhausted_from_error`]. State lives behind a mutex and
//! is shared via `Arc`, not module globals.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::LlmError;

pub struct QuotaGuard {
    /// Calls are blocked until this instant. `None` means not exhausted.
    retry_until: Mutex<Option<Instant>>,
    /// Cooldown applied when the provider gives no usable retry delay.
    default_cooldown: Duration,
}

impl QuotaGuard {
    pub fn new(default_cooldown: Duration) -> Self {
        Self {
            retry_until: Mutex::new(None),
            default_cooldown,
        }
    }

    /// Whether AI calls are currently blocked. Auto-clears once the cooldown
    /// has elapsed.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted_at(Instant::now())
    }

    fn exhausted_at(&self, now: Instant) -> bool {
        let mut state = self.retry_until.lock();
        match *state {
            Some(until) if now < until => true,
            Some(_) => {
                *state = None;
                tracing::info!("AI quota cooldown elapsed, calls re-enabled");
                false
            }
            None => false,
        }
    }

    pub fn mark_exhausted(&self, cooldown: Duration) {
        let until = Instant::now() + cooldown;
        *self.retry_until.lock() = Some(until);
        tracing::warn!(cooldown_secs = cooldown.as_secs(), "AI quota exhausted, backing off");
    }

    /// Record a provider error if it is rate-limit shaped, using its
    /// advertised retry delay when present. Returns true when the guard was
    /// tripped.
    pub fn mark_exhausted_from_error(&self, error: &LlmError) -> bool {
        match error {
            LlmError::RateLimited { retry_after } => {
                self.mark_exhausted(retry_after.unwrap_or(self.default_cooldown));
                true
            }
            _ => false,
        }
    }

    /// Remaining cooldown, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        let state = self.retry_until.lock();
        state.and_then(|until| until.checked_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> QuotaGuard {
        QuotaGuard::new(Duration::from_secs(3600))
    }

    #[test]
    fn test_starts_not_exhausted() {
        assert!(!guard().is_exhausted());
    }

    #[test]
    fn test_mark_exhausted_blocks_immediately_and_clears_after_cooldown() {
        let guard = guard();
        guard.mark_exhausted(Duration::from_secs(60));

        let now = Instant::now();
        assert!(guard.exhausted_at(now));
        assert!(guard.exhausted_at(now + Duration::from_secs(59)));
        assert!(!guard.exhausted_at(now + Duration::from_secs(61)));
        // Auto-clear is sticky: once elapsed, the state resets.
        assert!(!guard.exhausted_at(now));
    }

    #[test]
    fn test_rate_limit_error_uses_advertised_delay() {
        let guard = guard();
        let tripped = guard.mark_exhausted_from_error(&LlmError::RateLimited {
            retry_after: Some(Duration::from_secs(35)),
        });
        assert!(tripped);

        let now = Instant::now();
        assert!(guard.exhausted_at(now + Duration::from_secs(30)));
        assert!(!guard.exhausted_at(now + Duration::from_secs(40)));
    }

    #[test]
    fn test_rate_limit_without_delay_uses_default_cooldown() {
        let guard = QuotaGuard::new(Duration::from_secs(100));
        guard.mark_exhausted_from_error(&LlmError::RateLimited { retry_after: None });

        let now = Instant::now();
        assert!(guard.exhausted_at(now + Duration::from_secs(90)));
        assert!(!guard.exhausted_at(now + Duration::from_secs(110)));
    }

    #[test]
    fn test_non_rate_limit_errors_do_not_trip_the_guard() {
        let guard = guard();
        assert!(!guard.mark_exhausted_from_error(&LlmError::Transport("boom".into())));
        assert!(!guard.mark_exhausted_from_error(&LlmError::Timeout));
        assert!(!guard.is_exhausted());
    }

    #[test]
    fn test_retry_after_reports_remaining_time() {
        let guard = guard();
        assert!(guard.retry_after().is_none());

        guard.mark_exhausted(Duration::from_secs(60));
        let remaining = guard.retry_after().unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(55));
    }
}
