//! Lifecycle of one streamed response

use crate::multipart::encode_terminator;
use crate::TransportError;

/// Phases move strictly forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StreamPhase {
    Accepting,
    Segmenting,
    Streaming,
    Terminated,
}

#[derive(Debug)]
pub struct StreamLifecycle {
    phase: StreamPhase,
}

impl Default for StreamLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamLifecycle {
    pub fn new() -> Self {
        Self {
            phase: StreamPhase::Accepting,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == StreamPhase::Terminated
    }

    pub fn begin_segmenting(&mut self) -> Result<(), TransportError> {
        self.advance(StreamPhase::Segmenting)
    }

    pub fn begin_streaming(&mut self) -> Result<(), TransportError> {
        self.advance(StreamPhase::Streaming)
    }

    /// Move to `Terminated`. Returns the terminator frame the first time
    /// only; later calls return `None`.
    pub fn terminate(&mut self) -> Option<Vec<u8>> {
        if self.is_terminated() {
            return None;
        }
        self.phase = StreamPhase::Terminated;
        Some(encode_terminator())
    }

    fn advance(&mut self, to: StreamPhase) -> Result<(), TransportError> {
        if self.is_terminated() {
            return Err(TransportError::Terminated);
        }
        if to <= self.phase {
            return Err(TransportError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }
}
