//! Rate limiting logic.

mod limiter;
mod token_bucket;

pub use limiter::RateLimiter;
pub use token_bucket::TokenBucket;
