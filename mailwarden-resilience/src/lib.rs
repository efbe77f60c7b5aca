pub mod backoff;
pub mod breaker;
pub mod classify;

pub use backoff::next_interval;
pub use breaker::{Breaker, BreakerConfig, State as BreakerState};
pub use classify::{classify, Category, Cause};
