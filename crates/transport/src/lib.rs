//! Streaming transport for synthesized audio
//!
//! Frames audio units into a self-delimiting `multipart/mixed` body and
//! tracks the lifecycle of one streamed response.

pub mod lifecycle;
pub mod multipart;
pub mod writer;

pub use lifecycle::{StreamLifecycle, StreamPhase};
pub use multipart::{
    content_type, encode_error, encode_fragment, encode_terminator, BOUNDARY, ERROR_CONTENT_TYPE,
};
pub use writer::{frame_channel, DisconnectProbe, FrameStream, FrameWriter};

use thiserror::Error;

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Client disconnected")]
    ClientDisconnected,

    #[error("Invalid stream transition from {from:?} to {to:?}")]
    InvalidTransition { from: StreamPhase, to: StreamPhase },

    #[error("Stream already terminated")]
    Terminated,
}
