//! Shared host state.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use stemtap_core::{PeakProvider, ProjectStore, TimelineEngine};
use stemtap_decode::DecodingPeakProvider;
use stemtap_project::FileStore;
use stemtap_transport::AudioTransport;

use crate::clock_transport::ClockTransport;
use crate::config::Config;

/// Engine shared between command handling and the poll loop.
pub struct AppState {
    engine: Mutex<TimelineEngine>,
}

impl AppState {
    pub fn new(engine: TimelineEngine) -> Arc<Self> {
        Arc::new(Self {
            engine: Mutex::new(engine),
        })
    }

    /// Engine wired to the wall clock, decoded peaks and the configured
    /// project directory.
    pub fn from_config(config: &Config) -> Arc<Self> {
        let transport: Box<dyn AudioTransport> = Box::new(ClockTransport::new());
        let peaks: Box<dyn PeakProvider> = Box::new(DecodingPeakProvider::default());
        let store: Box<dyn ProjectStore> = Box::new(FileStore::new(config.project_dir()));

        tracing::info!(project_dir = %config.project_dir().display(), "engine ready");
        Self::new(TimelineEngine::new(
            config.engine.to_engine_config(),
            transport,
            peaks,
            store,
        ))
    }

    pub fn engine(&self) -> anyhow::Result<MutexGuard<'_, TimelineEngine>> {
        self.engine
            .lock()
            .map_err(|_| anyhow!("failed to acquire engine lock"))
    }

    /// Non-blocking lock for the poll loop; `None` when contended.
    pub fn try_engine(&self) -> Option<MutexGuard<'_, TimelineEngine>> {
        self.engine.try_lock().ok()
    }
}
