//! The shared queue and its rate-limited admission paths.

mod gateway;
mod shared;

pub use gateway::{Dequeued, QueueGateway};
pub use shared::SharedQueue;
