//! Rate limiter service implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tonic::{Request, Response, Status};
use tracing::{debug, instrument, warn};

use super::proto::ratelimiter::v1::{
    rate_limiter_service_server::RateLimiterService, CheckRateLimitRequest,
    CheckRateLimitResponse, GetStatusRequest, GetStatusResponse, ResetLimitRequest,
    ResetLimitResponse,
};
use crate::error::LimitdError;
use crate::ratelimit::RateLimiter;

/// Implementation of the RateLimiterService gRPC interface.
pub struct RateLimiterServiceImpl {
    /// The rate limiter instance
    limiter: Arc<RateLimiter>,
}

impl RateLimiterServiceImpl {
    /// Create a new RateLimiterServiceImpl with the given rate limiter.
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[tonic::async_trait]
impl RateLimiterService for RateLimiterServiceImpl {
    /// Check whether a request is allowed, charging its cost regardless of
    /// the outcome.
    #[instrument(
        skip(self, request),
        fields(
            key = %request.get_ref().key,
            limit = request.get_ref().limit,
            cost = request.get_ref().cost
        )
    )]
    async fn check_rate_limit(
        &self,
        request: Request<CheckRateLimitRequest>,
    ) -> Result<Response<CheckRateLimitResponse>, Status> {
        let req = request.into_inner();

        // Negative window values fail validation the same way zero does.
        let window = Duration::from_secs(req.window_seconds.max(0) as u64);

        let result = self
            .limiter
            .check_rate_limit(&req.key, req.limit, window, req.cost)
            .await
            .map_err(error_to_status)?;

        let retry_after_seconds = if result.allowed {
            0
        } else {
            (result.reset_at - Utc::now()).num_seconds().max(0)
        };

        debug!(
            key = %req.key,
            allowed = result.allowed,
            remaining = result.remaining,
            "Rate limit decision made"
        );

        Ok(Response::new(CheckRateLimitResponse {
            allowed: result.allowed,
            remaining: result.remaining,
            reset_at: Some(to_timestamp(result.reset_at)),
            limit: result.limit,
            retry_after_seconds,
        }))
    }

    /// Read the current window state for a key without consuming units.
    #[instrument(skip(self, request), fields(key = %request.get_ref().key))]
    async fn get_status(
        &self,
        request: Request<GetStatusRequest>,
    ) -> Result<Response<GetStatusResponse>, Status> {
        let req = request.into_inner();

        let result = self
            .limiter
            .get_status(&req.key, req.limit)
            .await
            .map_err(error_to_status)?;

        Ok(Response::new(GetStatusResponse {
            allowed: result.allowed,
            current: result.limit - result.remaining,
            remaining: result.remaining,
            reset_at: Some(to_timestamp(result.reset_at)),
            limit: result.limit,
        }))
    }

    /// Clear all rate limit state for a key.
    #[instrument(skip(self, request), fields(key = %request.get_ref().key))]
    async fn reset_limit(
        &self,
        request: Request<ResetLimitRequest>,
    ) -> Result<Response<ResetLimitResponse>, Status> {
        let req = request.into_inner();

        self.limiter
            .reset_limit(&req.key)
            .await
            .map_err(error_to_status)?;

        debug!(key = %req.key, "Rate limit reset");

        Ok(Response::new(ResetLimitResponse {}))
    }
}

fn to_timestamp(at: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: at.timestamp(),
        nanos: at.timestamp_subsec_nanos() as i32,
    }
}

/// Map domain errors onto gRPC status codes by kind.
fn error_to_status(err: LimitdError) -> Status {
    if err.is_validation() {
        return Status::invalid_argument(err.to_string());
    }
    match err {
        LimitdError::KeyNotFound => Status::not_found("key not found"),
        other => {
            warn!(error = %other, "Storage failure while serving request");
            Status::internal("internal server error")
        }
    }
}

#[cfg(test)]
mod tests {
    use tonic::Code;

    use super::*;
    use crate::storage::MemoryStore;

    fn test_service() -> RateLimiterServiceImpl {
        let limiter = Arc::new(RateLimiter::new(Arc::new(MemoryStore::new())));
        RateLimiterServiceImpl::new(limiter)
    }

    fn check_request(key: &str, limit: i64, cost: i64) -> Request<CheckRateLimitRequest> {
        Request::new(CheckRateLimitRequest {
            key: key.to_string(),
            limit,
            window_seconds: 60,
            cost,
        })
    }

    #[tokio::test]
    async fn test_check_allows_within_limit() {
        let service = test_service();

        let response = service
            .check_rate_limit(check_request("client-1", 5, 1))
            .await
            .unwrap()
            .into_inner();

        assert!(response.allowed);
        assert_eq!(response.remaining, 4);
        assert_eq!(response.limit, 5);
        assert_eq!(response.retry_after_seconds, 0);
        assert!(response.reset_at.is_some());
    }

    #[tokio::test]
    async fn test_check_denies_over_limit_with_retry_hint() {
        let service = test_service();

        service
            .check_rate_limit(check_request("client-1", 2, 2))
            .await
            .unwrap();

        let response = service
            .check_rate_limit(check_request("client-1", 2, 1))
            .await
            .unwrap()
            .into_inner();

        assert!(!response.allowed);
        assert_eq!(response.remaining, 0);
        assert!(response.retry_after_seconds >= 0);
    }

    #[tokio::test]
    async fn test_empty_key_is_invalid_argument() {
        let service = test_service();

        let status = service
            .check_rate_limit(check_request("", 5, 1))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_zero_window_is_invalid_argument() {
        let service = test_service();

        let request = Request::new(CheckRateLimitRequest {
            key: "client-1".to_string(),
            limit: 5,
            window_seconds: 0,
            cost: 1,
        });

        let status = service.check_rate_limit(request).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_status_reports_current_consumption() {
        let service = test_service();

        service
            .check_rate_limit(check_request("client-1", 10, 4))
            .await
            .unwrap();

        let response = service
            .get_status(Request::new(GetStatusRequest {
                key: "client-1".to_string(),
                limit: 10,
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.allowed);
        assert_eq!(response.current, 4);
        assert_eq!(response.remaining, 6);
    }

    #[tokio::test]
    async fn test_reset_missing_key_is_not_found() {
        let service = test_service();

        let status = service
            .reset_limit(Request::new(ResetLimitRequest {
                key: "nobody".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_reset_then_status_is_fresh() {
        let service = test_service();

        service
            .check_rate_limit(check_request("client-1", 3, 3))
            .await
            .unwrap();
        service
            .reset_limit(Request::new(ResetLimitRequest {
                key: "client-1".to_string(),
            }))
            .await
            .unwrap();

        let response = service
            .get_status(Request::new(GetStatusRequest {
                key: "client-1".to_string(),
                limit: 3,
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.allowed);
        assert_eq!(response.remaining, 3);
        assert_eq!(response.current, 0);
    }
}
