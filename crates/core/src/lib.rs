pub mod config;
pub mod drag;
pub mod engine;
pub mod error;
pub mod markers;
#[cfg(test)]
mod mock;
pub mod playback;
pub mod snap;
pub mod time;
pub mod viewport;
pub mod waveform;

pub use config::EngineConfig;
pub use drag::{DragHandle, DragTarget, Edge};
pub use engine::{
    EngineSettings, EngineSnapshot, ImportSummary, ObserverId, SongInfo, TimelineEngine,
    ViewportSnapshot, ZoomDirection,
};
pub use error::EngineError;
pub use markers::{
    Direction, Layer, MarkerStore, NavigationScope, RemovedMarker, StemCount, ToggleOutcome,
};
pub use playback::{LoopRegion, PlayOutcome, PlaybackState, PollOutcome, TransportController};
pub use time::{MusicalPosition, TimeContext, format_clock};
pub use viewport::Viewport;
pub use waveform::{WaveformCache, WaveformPath};

pub use stemtap_project::{
    FileStore, MemoryStore, Project, ProjectError, ProjectStore, ViewMode,
};
pub use stemtap_transport::{
    AudioRef, AudioTransport, LayerId, PeakData, PeakProvider, SyntheticPeaks, TransportError,
};
