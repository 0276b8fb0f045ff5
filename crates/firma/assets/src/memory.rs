//! In-memory fetcher.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use firma_core::{PipelineError, PipelineResult};

use crate::Fetcher;

/// Serves fixed bodies by URL; anything else fails like an unreachable host.
///
/// Counts every fetch attempt, including failed ones.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    bodies: Arc<HashMap<String, Vec<u8>>>,
    calls: Arc<AtomicUsize>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`.
    pub fn with(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Arc::make_mut(&mut self.bodies).insert(url.into(), body.into());
        self
    }

    /// Number of fetches attempted so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> PipelineResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::fetch(url, "connection refused"))
    }
}
