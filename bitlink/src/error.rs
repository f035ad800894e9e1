//! Error taxonomy for the client

use std::time::Duration;

use bitlink_proto::CodecError;
use uuid::Uuid;

/// Failure reported by the wireless link collaborator.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("no matching peripheral found")]
    NotFound,

    #[error("connection request cancelled")]
    Cancelled,

    #[error("bluetooth transport unavailable on this platform")]
    PlatformUnsupported,

    #[error("service or characteristic {0} not found on peripheral")]
    ServiceNotFound(Uuid),

    #[error("bluetooth backend error: {0}")]
    Backend(#[from] btleplug::Error),
}

/// What sank one connection attempt, before classification.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Client-facing errors. Connection-phase failures reach the caller through
/// [`DeviceEvent`](crate::DeviceEvent); per-write failures are returned from
/// the write call itself.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bluetooth transport unavailable")]
    LinkUnavailable(#[source] LinkError),

    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("connection failed: {0}")]
    ConnectFailed(#[source] AttemptError),

    #[error("automatic reconnect failed: {0}")]
    ReconnectFailed(#[source] AttemptError),

    #[error("device is not connected")]
    NotInitialized,

    #[error("write handle is not ready")]
    NotReady,

    #[error("write failed: {0}")]
    WriteFailed(#[source] LinkError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}
