//! gRPC server module for the rate limiter service.

mod server;
mod service;

pub use server::GrpcServer;
pub use service::RateLimiterServiceImpl;

// Include the generated protobuf code
pub mod proto {
    pub mod ratelimiter {
        pub mod v1 {
            tonic::include_proto!("ratelimiter.v1");
        }
    }
}

// Re-export commonly used types
pub use proto::ratelimiter::v1::{
    rate_limiter_service_server::RateLimiterServiceServer,
    CheckRateLimitRequest, CheckRateLimitResponse, GetStatusRequest, GetStatusResponse,
    ResetLimitRequest, ResetLimitResponse,
};
