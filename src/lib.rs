//! Sjoelguard - admission control for a sjoelen score tracker
//!
//! This crate throttles authentication attempts and game mutations with
//! per-identifier fixed-window counters. Callers name a registered policy and
//! supply a stable identifier; the limiter answers allow or deny.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod telemetry;

pub use error::{Result, SjoelguardError};
pub use ratelimit::RateLimiter;
