//! Queuegate - Rate-Limited Shared Queue Service
//!
//! This crate implements a process-wide FIFO queue whose enqueue paths are
//! each gated by a per-client rate limiter: fixed window, sliding window, leaky
//! bucket or token bucket. Dequeue is never limited. The queue is served over
//! gRPC, with the caller's peer address as its rate limiting identity.

pub mod config;
pub mod error;
pub mod grpc;
pub mod queue;
pub mod ratelimit;
