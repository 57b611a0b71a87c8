//! Rate limiting algorithms and per-client state management.

mod clock;
mod fixed;
mod leaky;
mod limiter;
mod sliding;
mod store;
mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fixed::{
    FixedWindow, FixedWindowLimiter, FixedWindowState, TimeWindow, DEFAULT_FIXED_LIMIT,
    DEFAULT_FIXED_UNIT,
};
pub use leaky::{
    LeakyBucket, LeakyBucketLimiter, LeakyBucketState, DEFAULT_BUCKET_CAPACITY,
    DEFAULT_LEAK_RATE,
};
pub use limiter::{Algorithm, Decision, KeyedLimiter, Policy, RateLimiter};
pub use sliding::{SlidingWindow, SlidingWindowLimiter, DEFAULT_SLIDING_LIMIT, DEFAULT_WINDOW_SECS};
pub use store::StateStore;
pub use token::{
    TokenBucket, TokenBucketLimiter, TokenBucketState, DEFAULT_TOKEN_CAPACITY,
    DEFAULT_TOKEN_RATE,
};
