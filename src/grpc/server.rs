//! gRPC server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tonic::transport::server::{Router, TcpIncoming};
use tonic::transport::Server;
use tracing::{error, info};

use super::proto::queuegate::v1::queue_service_server::QueueServiceServer;
use super::service::QueueServiceImpl;
use crate::error::{QueueGateError, Result};
use crate::queue::QueueGateway;

/// gRPC server for the queue service.
pub struct GrpcServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The gateway every RPC goes through
    gateway: Arc<QueueGateway>,
}

impl GrpcServer {
    /// Create a new gRPC server around `gateway`.
    pub fn new(addr: SocketAddr, gateway: Arc<QueueGateway>) -> Self {
        Self { addr, gateway }
    }

    /// Address the server binds to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn router(gateway: Arc<QueueGateway>) -> Router {
        Server::builder().add_service(QueueServiceServer::new(QueueServiceImpl::new(gateway)))
    }

    /// Start the gRPC server. Runs until the process is stopped.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Bind the configured address and serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind(self.addr).await.inspect_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind gRPC listener");
        })?;
        Self::serve_on(listener, self.gateway, signal).await
    }

    /// Serve on an already bound `listener` until `signal` resolves.
    pub async fn serve_on<F>(
        listener: TcpListener,
        gateway: Arc<QueueGateway>,
        signal: F,
    ) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = listener.local_addr()?;
        let incoming = TcpIncoming::from_listener(listener, true, None)
            .map_err(std::io::Error::other)?;

        info!(addr = %addr, "Serving QueueService");

        Self::router(gateway)
            .serve_with_incoming_shutdown(incoming, signal)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                QueueGateError::Grpc(e)
            })
    }
}
