//! gRPC server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use tonic::transport::Server;
use tracing::{error, info};

use super::proto::ratelimiter::v1::rate_limiter_service_server::RateLimiterServiceServer;
use super::service::RateLimiterServiceImpl;
use crate::error::{LimitdError, Result};
use crate::ratelimit::RateLimiter;

/// gRPC server for the rate limiter service.
pub struct GrpcServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter instance
    limiter: Arc<RateLimiter>,
}

impl GrpcServer {
    /// Create a new gRPC server.
    pub fn new(addr: SocketAddr, limiter: Arc<RateLimiter>) -> Self {
        Self { addr, limiter }
    }

    /// Start the gRPC server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        let service = RateLimiterServiceImpl::new(self.limiter);

        info!(
            addr = %self.addr,
            "Starting gRPC server for RateLimiterService"
        );

        Server::builder()
            .add_service(RateLimiterServiceServer::new(service))
            .serve(self.addr)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                LimitdError::Grpc(e)
            })
    }

    /// Start the gRPC server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        let service = RateLimiterServiceImpl::new(self.limiter);

        info!(
            addr = %self.addr,
            "Starting gRPC server for RateLimiterService with graceful shutdown"
        );

        Server::builder()
            .add_service(RateLimiterServiceServer::new(service))
            .serve_with_shutdown(self.addr, signal)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                LimitdError::Grpc(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:50051".parse().unwrap();
        let limiter = Arc::new(RateLimiter::new(Arc::new(MemoryStore::new())));
        let _server = GrpcServer::new(addr, limiter);
    }
}
