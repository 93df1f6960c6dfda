//! Periodic cache maintenance

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::AudioCache;

/// Background task expiring stale audio entries on a fixed period
pub struct MaintenanceLoop {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MaintenanceLoop {
    /// Spawn the loop. The first pass runs one full `interval` after start.
    pub fn start(audio_cache: Arc<AudioCache>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut timer = tokio::time::interval_at(start, interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        run_pass(&audio_cache);
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("Cache maintenance loop shutting down");
                            break;
                        }
                    }
                }
            }
        });

        tracing::info!(interval_secs = interval.as_secs(), "Cache maintenance loop started");

        Self { shutdown_tx, handle }
    }

    /// Stop the loop and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Cache maintenance task failed");
        }
    }
}

/// One expiry pass over the audio cache, returning entries removed
pub fn run_pass(audio_cache: &AudioCache) -> usize {
    let removed = audio_cache.expire_older_than(audio_cache.ttl());
    if removed > 0 {
        tracing::info!(
            removed,
            remaining = audio_cache.len(),
            bytes = audio_cache.bytes(),
            "Cache maintenance: expired stale audio"
        );
    } else {
        tracing::debug!(entries = audio_cache.len(), "Cache maintenance: nothing to expire");
    }
    metrics::counter!("soulgate_cache_expired_total").increment(removed as u64);
    removed
}
