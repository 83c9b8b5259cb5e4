//! Sliding-window rate limiter for geodata providers.
//!
//! Implements per-provider rate limiting over a trailing time window.
//! Each provider gets its own window with a configurable duration and
//! request cap. The limiter is purely advisory: it never blocks or sleeps,
//! it only reports whether a request may proceed and how long to wait
//! otherwise. State is in-memory and resets on process restart.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::models::ProviderId;

/// Default window: one hour.
const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

/// Default cap per window.
const DEFAULT_MAX_REQUESTS: u32 = 1000;

/// Request budget for one provider over a sliding window.
#[derive(Clone, Copy, Debug)]
pub struct RateBudget {
    /// Trailing window duration.
    pub window: Duration,

    /// Maximum requests allowed inside the window.
    pub max_requests: u32,
}

impl Default for RateBudget {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

/// Answer to a capacity check.
#[derive(Clone, Copy, Debug)]
pub struct RateDecision {
    /// Whether a request may proceed right now.
    pub allowed: bool,

    /// When not allowed, the time until the oldest retained request exits
    /// the window. Zero when allowed.
    pub wait: Duration,

    /// Requests left in the window after this check.
    pub remaining: u32,
}

/// Usage snapshot for observability.
#[derive(Clone, Copy, Debug)]
pub struct UsageStats {
    /// Requests recorded inside the current window.
    pub used: u32,

    /// Requests left in the window.
    pub remaining: u32,

    /// Fraction of the budget consumed, in [0, 100].
    pub percent_used: f64,
}

/// Sliding window for a single provider.
#[derive(Debug)]
struct RequestWindow {
    /// Timestamps of recorded requests, monotonically non-decreasing.
    timestamps: VecDeque<Instant>,
    budget: RateBudget,
}

impl RequestWindow {
    fn new(budget: RateBudget) -> Self {
        Self {
            timestamps: VecDeque::new(),
            budget,
        }
    }

    /// Drop timestamps older than the trailing window.
    /// After this, `timestamps.len() <= max_requests` holds whenever the
    /// caller honored previous decisions.
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.timestamps.front() {
            if now.duration_since(*oldest) >= self.budget.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn check(&mut self, now: Instant) -> RateDecision {
        self.prune(now);

        let used = self.timestamps.len() as u32;
        if used < self.budget.max_requests {
            return RateDecision {
                allowed: true,
                wait: Duration::ZERO,
                remaining: self.budget.max_requests - used,
            };
        }

        // At capacity. The caller may proceed once the oldest retained
        // timestamp leaves the window.
        let wait = self
            .timestamps
            .front()
            .map(|oldest| {
                self.budget
                    .window
                    .saturating_sub(now.duration_since(*oldest))
            })
            .unwrap_or(Duration::ZERO);

        RateDecision {
            allowed: false,
            wait,
            remaining: 0,
        }
    }

    fn record(&mut self, now: Instant) {
        self.prune(now);
        self.timestamps.push_back(now);
    }

    fn stats(&mut self, now: Instant) -> UsageStats {
        self.prune(now);

        let used = self.timestamps.len() as u32;
        let max = self.budget.max_requests.max(1);
        UsageStats {
            used,
            remaining: self.budget.max_requests.saturating_sub(used),
            percent_used: f64::from(used) / f64::from(max) * 100.0,
        }
    }
}

/// Sliding-window rate limiter for multiple providers.
///
/// Thread-safe: one process-wide instance is shared (via `Arc`) across all
/// provider clients and concurrent discovery runs, so the budget is enforced
/// globally rather than per caller. Windows are created on demand with
/// default settings, or can be pre-configured per provider.
pub struct RateLimiter {
    /// Per-provider sliding windows.
    windows: Mutex<HashMap<String, RequestWindow>>,
    /// Per-provider budget overrides.
    budgets: Mutex<HashMap<String, RateBudget>>,
}

impl RateLimiter {
    /// Create a new rate limiter with default settings.
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            budgets: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the windows mutex, recovering from poison if necessary.
    ///
    /// For rate limiting, it's safe to recover from a poisoned mutex since
    /// the worst case is slightly incorrect rate limiting, which is better
    /// than panicking.
    fn lock_windows(&self) -> MutexGuard<'_, HashMap<String, RequestWindow>> {
        self.windows.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter windows mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Lock the budgets mutex, recovering from poison if necessary.
    fn lock_budgets(&self) -> MutexGuard<'_, HashMap<String, RateBudget>> {
        self.budgets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter budgets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Configure the budget for a specific provider.
    pub fn configure(&self, provider: &ProviderId, budget: RateBudget) {
        let mut budgets = self.lock_budgets();
        budgets.insert(provider.to_string(), budget);
        drop(budgets); // Release budgets lock before acquiring windows lock

        // Reset the window if it already exists
        let mut windows = self.lock_windows();
        windows.remove(provider.as_ref());
    }

    /// Check whether a request to the given provider may proceed.
    ///
    /// Prunes expired timestamps first. Never blocks; when the budget is
    /// exhausted the decision carries the advised wait duration and the
    /// caller must either wait or abort.
    pub fn check(&self, provider: &ProviderId) -> RateDecision {
        let mut windows = self.lock_windows();

        let window = windows
            .entry(provider.to_string())
            .or_insert_with(|| self.create_window(provider));

        let decision = window.check(Instant::now());
        if !decision.allowed {
            debug!(
                "Rate limiter: '{}' at capacity, advise waiting {:?}",
                provider, decision.wait
            );
        }
        decision
    }

    /// Record a completed request for the given provider.
    ///
    /// Call this only after a successful provider call, never on failure,
    /// so failed calls do not consume budget.
    pub fn record(&self, provider: &ProviderId) {
        let mut windows = self.lock_windows();

        let window = windows
            .entry(provider.to_string())
            .or_insert_with(|| self.create_window(provider));

        window.record(Instant::now());
    }

    /// Usage snapshot for the given provider.
    pub fn stats(&self, provider: &ProviderId) -> UsageStats {
        let mut windows = self.lock_windows();

        match windows.get_mut(provider.as_ref()) {
            Some(window) => window.stats(Instant::now()),
            None => {
                let budget = self.budget_for(provider);
                UsageStats {
                    used: 0,
                    remaining: budget.max_requests,
                    percent_used: 0.0,
                }
            }
        }
    }

    /// Reset the limiter state for a provider.
    pub fn reset(&self, provider: &ProviderId) {
        let mut windows = self.lock_windows();
        windows.remove(provider.as_ref());
    }

    /// Create a window for a provider, using a configured budget if any.
    fn create_window(&self, provider: &ProviderId) -> RequestWindow {
        RequestWindow::new(self.budget_for(provider))
    }

    fn budget_for(&self, provider: &ProviderId) -> RateBudget {
        let budgets = self.lock_budgets();
        budgets.get(provider.as_ref()).copied().unwrap_or_default()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    /// Shift every recorded timestamp for a provider into the past,
    /// simulating a clock advance.
    fn backdate(limiter: &RateLimiter, provider: &ProviderId, by: Duration) {
        let mut windows = limiter.lock_windows();
        if let Some(window) = windows.get_mut(provider.as_ref()) {
            for ts in window.timestamps.iter_mut() {
                *ts -= by;
            }
        }
    }

    #[test]
    fn test_allows_until_cap() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("TEST_PROVIDER");

        limiter.configure(
            &provider,
            RateBudget {
                window: Duration::from_secs(3600),
                max_requests: 3,
            },
        );

        for expected_remaining in [3, 2, 1] {
            let decision = limiter.check(&provider);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            limiter.record(&provider);
        }

        let decision = limiter.check(&provider);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.wait > Duration::ZERO);
    }

    #[test]
    fn test_window_expiry_frees_budget() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("EXPIRY_PROVIDER");

        limiter.configure(
            &provider,
            RateBudget {
                window: Duration::from_secs(3600),
                max_requests: 2,
            },
        );

        limiter.record(&provider);
        limiter.record(&provider);
        assert!(!limiter.check(&provider).allowed);

        // Simulate the window elapsing
        backdate(&limiter, &provider, Duration::from_secs(3601));

        let decision = limiter.check(&provider);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);
    }

    #[test]
    fn test_wait_reflects_oldest_timestamp() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("WAIT_PROVIDER");

        limiter.configure(
            &provider,
            RateBudget {
                window: Duration::from_secs(3600),
                max_requests: 1,
            },
        );

        limiter.record(&provider);
        backdate(&limiter, &provider, Duration::from_secs(3000));

        let decision = limiter.check(&provider);
        assert!(!decision.allowed);
        // The single slot frees when the 3600 s window passes; ~600 s remain
        assert!(decision.wait <= Duration::from_secs(600));
        assert!(decision.wait > Duration::from_secs(590));
    }

    #[test]
    fn test_per_provider_isolation() {
        let limiter = RateLimiter::new();
        let provider_a: ProviderId = Cow::Borrowed("PROVIDER_A");
        let provider_b: ProviderId = Cow::Borrowed("PROVIDER_B");

        limiter.configure(
            &provider_a,
            RateBudget {
                window: Duration::from_secs(3600),
                max_requests: 1,
            },
        );

        limiter.record(&provider_a);
        assert!(!limiter.check(&provider_a).allowed);

        // Provider B keeps its own (default) budget
        assert!(limiter.check(&provider_b).allowed);
    }

    #[test]
    fn test_reset_restores_capacity() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("RESET_PROVIDER");

        limiter.configure(
            &provider,
            RateBudget {
                window: Duration::from_secs(3600),
                max_requests: 1,
            },
        );

        limiter.record(&provider);
        assert!(!limiter.check(&provider).allowed);

        limiter.reset(&provider);
        assert!(limiter.check(&provider).allowed);
    }

    #[test]
    fn test_stats() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("STATS_PROVIDER");

        limiter.configure(
            &provider,
            RateBudget {
                window: Duration::from_secs(3600),
                max_requests: 4,
            },
        );

        let stats = limiter.stats(&provider);
        assert_eq!(stats.used, 0);
        assert_eq!(stats.remaining, 4);

        limiter.record(&provider);
        limiter.record(&provider);

        let stats = limiter.stats(&provider);
        assert_eq!(stats.used, 2);
        assert_eq!(stats.remaining, 2);
        assert!((stats.percent_used - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_prune_keeps_len_within_cap() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("PRUNE_PROVIDER");

        limiter.configure(
            &provider,
            RateBudget {
                window: Duration::from_secs(3600),
                max_requests: 2,
            },
        );

        limiter.record(&provider);
        limiter.record(&provider);
        backdate(&limiter, &provider, Duration::from_secs(3601));
        limiter.record(&provider);

        let stats = limiter.stats(&provider);
        assert_eq!(stats.used, 1);
    }
}
