//! Queue service implementation.

use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{debug, info, instrument, warn};

use super::proto::queuegate::v1::{
    queue_service_server::QueueService, DequeueRequest, DequeueResponse, EnqueueRequest,
    EnqueueResponse, HealthRequest, HealthResponse, SnapshotRequest, SnapshotResponse,
};
use crate::error::{QueueGateError, Result};
use crate::queue::QueueGateway;
use crate::ratelimit::Algorithm;

/// Metadata key naming the caller when the transport has no peer address.
pub const CLIENT_ID_METADATA: &str = "x-client-id";

/// Identify the caller of `request`.
///
/// The peer IP address is used when the transport knows it. Only when it does
/// not, as with in-process transports, is the `x-client-id` metadata value
/// trusted instead.
pub fn client_identity<T>(request: &Request<T>) -> std::result::Result<String, Status> {
    if let Some(addr) = request.remote_addr() {
        return Ok(addr.ip().to_string());
    }

    match request
        .metadata()
        .get(CLIENT_ID_METADATA)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
    {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => {
            warn!("Request has neither a peer address nor a client id");
            Err(Status::invalid_argument("client identity is required"))
        }
    }
}

fn to_status(err: QueueGateError) -> Status {
    match err {
        QueueGateError::RateLimited { .. } => Status::resource_exhausted(err.to_string()),
        QueueGateError::EmptyQueue => Status::failed_precondition(err.to_string()),
        other => Status::internal(other.to_string()),
    }
}

/// Implementation of the QueueService gRPC interface.
pub struct QueueServiceImpl {
    /// The gateway every RPC goes through
    gateway: Arc<QueueGateway>,
}

impl QueueServiceImpl {
    /// Create a new QueueServiceImpl around `gateway`.
    pub fn new(gateway: Arc<QueueGateway>) -> Self {
        Self { gateway }
    }

    fn enqueue(
        &self,
        algorithm: Algorithm,
        request: Request<EnqueueRequest>,
        admit: fn(&QueueGateway, &str, String) -> Result<Vec<String>>,
    ) -> std::result::Result<Response<EnqueueResponse>, Status> {
        let identity = client_identity(&request)?;
        let req = request.into_inner();

        if req.value.is_empty() {
            warn!(identity = %identity, "Received enqueue request with empty value");
            return Err(Status::invalid_argument("value is required"));
        }

        match admit(self.gateway.as_ref(), &identity, req.value) {
            Ok(queue) => {
                info!(
                    identity = %identity,
                    algorithm = %algorithm,
                    queue_len = queue.len(),
                    "Value enqueued"
                );
                Ok(Response::new(EnqueueResponse {
                    message: format!("Added via {}", algorithm.title()),
                    queue,
                }))
            }
            Err(err) => {
                debug!(identity = %identity, algorithm = %algorithm, "Enqueue rate limited");
                Err(to_status(err))
            }
        }
    }
}

#[tonic::async_trait]
impl QueueService for QueueServiceImpl {
    async fn health(
        &self,
        _request: Request<HealthRequest>,
    ) -> std::result::Result<Response<HealthResponse>, Status> {
        Ok(Response::new(HealthResponse {
            message: "Queue with rate limiting is running".to_string(),
        }))
    }

    #[instrument(skip(self, request), fields(value_len = request.get_ref().value.len()))]
    async fn enqueue_fixed(
        &self,
        request: Request<EnqueueRequest>,
    ) -> std::result::Result<Response<EnqueueResponse>, Status> {
        self.enqueue(Algorithm::FixedWindow, request, QueueGateway::enqueue_fixed)
    }

    #[instrument(skip(self, request), fields(value_len = request.get_ref().value.len()))]
    async fn enqueue_sliding(
        &self,
        request: Request<EnqueueRequest>,
    ) -> std::result::Result<Response<EnqueueResponse>, Status> {
        self.enqueue(Algorithm::SlidingWindow, request, QueueGateway::enqueue_sliding)
    }

    #[instrument(skip(self, request), fields(value_len = request.get_ref().value.len()))]
    async fn enqueue_leaky(
        &self,
        request: Request<EnqueueRequest>,
    ) -> std::result::Result<Response<EnqueueResponse>, Status> {
        self.enqueue(Algorithm::LeakyBucket, request, QueueGateway::enqueue_leaky)
    }

    #[instrument(skip(self, request), fields(value_len = request.get_ref().value.len()))]
    async fn enqueue_token(
        &self,
        request: Request<EnqueueRequest>,
    ) -> std::result::Result<Response<EnqueueResponse>, Status> {
        self.enqueue(Algorithm::TokenBucket, request, QueueGateway::enqueue_token)
    }

    #[instrument(skip(self, _request))]
    async fn dequeue(
        &self,
        _request: Request<DequeueRequest>,
    ) -> std::result::Result<Response<DequeueResponse>, Status> {
        let dequeued = self.gateway.dequeue().map_err(|err| {
            warn!("Dequeue attempted on empty queue");
            to_status(err)
        })?;

        info!(queue_len = dequeued.queue.len(), "Value dequeued");

        Ok(Response::new(DequeueResponse {
            message: "Item removed".to_string(),
            removed: dequeued.removed,
            queue: dequeued.queue,
        }))
    }

    async fn snapshot(
        &self,
        _request: Request<SnapshotRequest>,
    ) -> std::result::Result<Response<SnapshotResponse>, Status> {
        Ok(Response::new(SnapshotResponse {
            queue: self.gateway.snapshot(),
        }))
    }
}
