//! Rate limiting logic and state management.

mod clock;
mod counter;
mod key;
mod limiter;
mod policy;
mod sweeper;

pub use clock::{Clock, MockClock, SystemClock};
pub use counter::CounterEntry;
pub use key::LimitKey;
pub use limiter::{RateLimiter, RemainingAttempts, DEFAULT_SWEEP_THRESHOLD};
pub use policy::{
    Action, AuthAction, Category, GameAction, Policy, PolicyEntry, PolicyOverride, PolicyRegistry,
    MAX_WINDOW,
};
pub use sweeper::{spawn_sweeper, SweeperHandle};
