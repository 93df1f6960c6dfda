//! Request statistics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide request counters
#[derive(Debug, Default)]
pub struct RequestStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    stream_requests: AtomicU64,
    successful_streams: AtomicU64,
    cancelled_streams: AtomicU64,
    failed_streams: AtomicU64,
    chunks_sent: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub stream_requests: u64,
    pub successful_streams: u64,
    pub cancelled_streams: u64,
    pub failed_streams: u64,
    pub chunks_sent: u64,
}

/// How a streamed response ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

impl StreamOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            StreamOutcome::Completed => "completed",
            StreamOutcome::Cancelled => "cancelled",
            StreamOutcome::Failed(_) => "failed",
        }
    }
}

impl RequestStats {
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_request(&self) {
        self.stream_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_end(&self, outcome: &StreamOutcome, chunks: usize) {
        let counter = match outcome {
            StreamOutcome::Completed => &self.successful_streams,
            StreamOutcome::Cancelled => &self.cancelled_streams,
            StreamOutcome::Failed(_) => &self.failed_streams,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.chunks_sent.fetch_add(chunks as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            stream_requests: self.stream_requests.load(Ordering::Relaxed),
            successful_streams: self.successful_streams.load(Ordering::Relaxed),
            cancelled_streams: self.cancelled_streams.load(Ordering::Relaxed),
            failed_streams: self.failed_streams.load(Ordering::Relaxed),
            chunks_sent: self.chunks_sent.load(Ordering::Relaxed),
        }
    }
}
