//! Error types for the Queuegate service.

use thiserror::Error;

use crate::ratelimit::Algorithm;

/// Main error type for Queuegate operations.
#[derive(Error, Debug)]
pub enum QueueGateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The selected limiter denied the enqueue
    #[error("{} rate limit exceeded", .algorithm.sentence_name())]
    RateLimited {
        /// Limiter that made the decision
        algorithm: Algorithm,
    },

    /// Dequeue was attempted on an empty queue
    #[error("Queue is empty")]
    EmptyQueue,

    /// gRPC server errors
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::transport::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Queuegate operations.
pub type Result<T> = std::result::Result<T, QueueGateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_message_names_algorithm() {
        let err = QueueGateError::RateLimited {
            algorithm: Algorithm::SlidingWindow,
        };
        assert_eq!(err.to_string(), "Sliding window rate limit exceeded");
    }

    #[test]
    fn test_empty_queue_message() {
        assert_eq!(QueueGateError::EmptyQueue.to_string(), "Queue is empty");
    }
}
