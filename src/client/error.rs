use super::config::ConfigError;
use crate::queue::QueueError;
use crate::sender::TransportBuildError;
use thiserror::Error;

/// Failures that keep the client uninitialized. Nothing is torn down
/// because nothing was built.
#[derive(Error, Debug)]
pub enum StartError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("queue storage error: {0}")]
    Storage(#[from] QueueError),
    #[error("identifier storage error: {0}")]
    Identity(#[from] std::io::Error),
    #[error("transport error: {0}")]
    Transport(#[from] TransportBuildError),
}

/// Failures on the running client surface. All are reported, none abort
/// the host process.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("tracklet not started; call start() first")]
    NotStarted,
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("storage fault: {0}")]
    Storage(#[from] QueueError),
    #[error("shutdown timed out waiting for the delivery worker")]
    ShutdownTimeout,
}
