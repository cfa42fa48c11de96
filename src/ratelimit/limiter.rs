//! Core rate limiter implementation.
//!
//! Fixed-window counting: each key gets a window that starts with its first
//! action and lasts for the policy's window duration. Up to `max_count`
//! actions are admitted in that window. A burst of `max_count` right before a
//! window ends followed by another right after it is possible; this is the
//! accepted cost of O(1) state and O(1) decisions per key.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use super::clock::{Clock, SystemClock};
use super::counter::{window_end, CounterEntry};
use super::key::LimitKey;
use super::policy::{AuthAction, GameAction, Policy, PolicyRegistry};
use crate::config::SjoelguardConfig;
use crate::error::Result;

/// Default store size above which checks trigger an expiry sweep.
pub const DEFAULT_SWEEP_THRESHOLD: usize = 1000;

/// Remaining budget for a key, as reported without consuming an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingAttempts {
    /// Actions still admitted in the current window
    pub remaining: u32,
    /// When the current (or a hypothetical fresh) window ends
    pub reset_at: Instant,
}

impl RemainingAttempts {
    /// Time until the window resets, measured from `now`.
    pub fn retry_after(&self, now: Instant) -> Duration {
        self.reset_at.saturating_duration_since(now)
    }
}

/// Admission controller that owns the counter store.
///
/// The store is sharded, and every read-modify-write of an entry happens
/// while its shard is write-locked, so concurrent checks of the same key
/// can never admit more than the policy allows. Share it with `Arc`.
pub struct RateLimiter<C: Clock = SystemClock> {
    /// Counter entries indexed by composite key
    counters: DashMap<String, CounterEntry>,
    /// Registered policies
    registry: PolicyRegistry,
    clock: C,
    sweep_threshold: usize,
}

impl RateLimiter<SystemClock> {
    /// Create a limiter with the built-in policy table.
    pub fn new() -> Self {
        Self::with_clock(PolicyRegistry::new(), SystemClock)
    }

    /// Create a limiter from configuration, validating policy overrides.
    pub fn with_config(config: &SjoelguardConfig) -> Result<Self> {
        let registry = config.build_registry()?;
        Ok(Self::with_clock(registry, SystemClock)
            .with_sweep_threshold(config.limiter.sweep_threshold))
    }
}

impl Default for RateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a limiter with an explicit registry and time source.
    pub fn with_clock(registry: PolicyRegistry, clock: C) -> Self {
        Self {
            counters: DashMap::new(),
            registry,
            clock,
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
        }
    }

    /// Set the store size above which checks sweep expired entries.
    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold;
        self
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Attempt one action for `key` under `policy`.
    ///
    /// Returns `true` if the action is admitted. A denial is not counted.
    pub fn check_limit(&self, key: &str, policy: &Policy) -> bool {
        let now = self.clock.now();

        trace!(key = %key, limit = policy.max_count(), "Checking rate limit");

        let (allowed, inserted) = match self.counters.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired(now) {
                    debug!(key = %key, "Rate limit window expired, starting a new one");
                    *entry = CounterEntry::fresh(now, policy);
                    (true, false)
                } else if entry.try_admit(policy) {
                    (true, false)
                } else {
                    debug!(
                        key = %key,
                        count = entry.count(),
                        limit = policy.max_count(),
                        "Rate limit exceeded"
                    );
                    (false, false)
                }
            }
            Entry::Vacant(vacant) => {
                debug!(
                    key = %key,
                    limit = policy.max_count(),
                    window = ?policy.window(),
                    "Creating new rate limit counter"
                );
                vacant.insert(CounterEntry::fresh(now, policy));
                (true, true)
            }
        };

        // The store only grows on insert, so only inserts pay for the
        // all-shard size check. The entry guard is released above.
        if inserted && self.counters.len() > self.sweep_threshold {
            self.sweep_expired();
        }

        allowed
    }

    /// Report the remaining budget for `key` without counting an attempt.
    pub fn get_remaining_attempts(&self, key: &str, policy: &Policy) -> RemainingAttempts {
        let now = self.clock.now();

        match self.counters.get(key) {
            Some(entry) if !entry.is_expired(now) => RemainingAttempts {
                remaining: entry.remaining(policy),
                reset_at: entry.window_reset_at(),
            },
            _ => RemainingAttempts {
                remaining: policy.max_count(),
                reset_at: window_end(now, policy),
            },
        }
    }

    /// Forget the counter for `key`. Missing keys are ignored.
    pub fn reset(&self, key: &str) {
        if self.counters.remove(key).is_some() {
            debug!(key = %key, "Rate limit counter reset");
        }
    }

    /// Check an authentication action for `identifier`.
    pub fn check_auth_limit(&self, action: AuthAction, identifier: &str) -> bool {
        let policy = self.registry.auth_policy(action);
        let key = LimitKey::auth(action, identifier).to_string_key();
        self.check_limit(&key, &policy)
    }

    /// Check a game mutation for `user_id`.
    pub fn check_game_limit(&self, action: GameAction, user_id: &str) -> bool {
        let policy = self.registry.game_policy(action);
        let key = LimitKey::games(action, user_id).to_string_key();
        self.check_limit(&key, &policy)
    }

    /// Check a key whose category and action are only known at runtime.
    pub fn check(&self, key: &LimitKey) -> Result<bool> {
        let policy = self.registry.get_policy(key.category, key.action)?;
        Ok(self.check_limit(&key.to_string_key(), &policy))
    }

    /// Remaining budget for a key whose policy is resolved from the registry.
    pub fn remaining(&self, key: &LimitKey) -> Result<RemainingAttempts> {
        let policy = self.registry.get_policy(key.category, key.action)?;
        Ok(self.get_remaining_attempts(&key.to_string_key(), &policy))
    }

    /// Remove every entry whose window has ended. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;

        self.counters.retain(|_, entry| {
            if entry.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            info!(
                removed = removed,
                remaining = self.counters.len(),
                "Swept expired rate limit counters"
            );
        }

        removed
    }

    /// Clear all counters.
    pub fn clear(&self) {
        self.counters.clear();
    }

    /// Get the number of tracked counters.
    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }
}
