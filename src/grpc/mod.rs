//! gRPC front end for the rate-limited queue.

mod server;
mod service;

pub use server::GrpcServer;
pub use service::{client_identity, QueueServiceImpl, CLIENT_ID_METADATA};

// Include the generated protobuf code
pub mod proto {
    pub mod queuegate {
        pub mod v1 {
            tonic::include_proto!("queuegate.v1");
        }
    }
}

// Re-export commonly used types
pub use proto::queuegate::v1::{
    queue_service_client::QueueServiceClient, queue_service_server::QueueServiceServer,
    DequeueRequest, DequeueResponse, EnqueueRequest, EnqueueResponse, HealthRequest,
    HealthResponse, SnapshotRequest, SnapshotResponse,
};
