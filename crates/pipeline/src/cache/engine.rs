//! Engine handle cache
//!
//! Holds at most `max_handles` engines, evicting in insertion order.
//! Hits do not reorder entries.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use soulgate_core::{Error, Result};

use crate::engine::{EngineFactory, EngineHandle};

#[derive(Default)]
struct Handles {
    by_locale: HashMap<String, EngineHandle>,
    order: VecDeque<String>,
}

impl Handles {
    fn evict_oldest(&mut self) -> Option<String> {
        let locale = self.order.pop_front()?;
        self.by_locale.remove(&locale);
        Some(locale)
    }
}

pub struct EngineCache {
    factory: Arc<dyn EngineFactory>,
    max_handles: usize,
    handles: Mutex<Handles>,
}

impl EngineCache {
    pub fn new(factory: Arc<dyn EngineFactory>, max_handles: usize) -> Self {
        Self {
            factory,
            max_handles: max_handles.max(1),
            handles: Mutex::new(Handles::default()),
        }
    }

    /// Get the engine for `locale`, constructing it on a miss.
    ///
    /// Construction runs without holding the lock. If another caller
    /// inserted the same locale meanwhile, theirs is kept and returned.
    pub async fn acquire(&self, locale: &str) -> Result<EngineHandle> {
        let cached = self.handles.lock().by_locale.get(locale).cloned();
        if let Some(handle) = cached {
            metrics::counter!("soulgate_engine_cache_hits_total").increment(1);
            return Ok(handle);
        }

        metrics::counter!("soulgate_engine_cache_misses_total").increment(1);
        tracing::info!(locale, "Creating synthesis engine");

        let created = self.factory.create(locale).await.map_err(|e| {
            tracing::error!(locale, error = %e, "Engine construction failed");
            Error::engine_unavailable(locale, e)
        })?;

        let mut handles = self.handles.lock();
        if let Some(existing) = handles.by_locale.get(locale) {
            return Ok(Arc::clone(existing));
        }

        while handles.by_locale.len() >= self.max_handles {
            match handles.evict_oldest() {
                Some(evicted) => tracing::debug!(locale = %evicted, "Evicted engine handle"),
                None => break,
            }
        }

        handles.order.push_back(locale.to_string());
        handles.by_locale.insert(locale.to_string(), Arc::clone(&created));

        Ok(created)
    }

    /// Drop the oldest-inserted handle, returning its locale
    pub fn evict_least_recent(&self) -> Option<String> {
        self.handles.lock().evict_oldest()
    }

    pub fn size(&self) -> usize {
        self.handles.lock().by_locale.len()
    }

    /// Locales currently loaded, oldest first
    pub fn locales(&self) -> Vec<String> {
        self.handles.lock().order.iter().cloned().collect()
    }
}
