//! The timeline engine: one owner for transport, viewport and markers.
//!
//! UI layers read [`EngineSnapshot`]s and call the public methods below; no
//! other path mutates engine state. Observers registered with
//! [`TimelineEngine::subscribe`] run after each state-changing call.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use stemtap_project::{
    PROJECT_FORMAT_VERSION, Project, ProjectError, ProjectMetadata, ProjectSettings, ProjectStore,
    ViewMode, load_from_store, parse_marker_csv, save_to_store,
};
use stemtap_transport::{AudioRef, AudioTransport, LayerId, PeakData, PeakProvider, TransportError};

use crate::config::EngineConfig;
use crate::drag::{DragHandle, DragSession, DragTarget};
use crate::error::EngineError;
use crate::markers::{
    Direction, Layer, MarkerStore, NavigationScope, RemovedMarker, StemCount, ToggleOutcome,
};
use crate::playback::{LoopRegion, PlayOutcome, PlaybackState, PollOutcome, TransportController};
use crate::snap;
use crate::time::TimeContext;
use crate::viewport::{SCROLL_STEP_RATIO, Viewport};
use crate::waveform::{WaveformCache, WaveformPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&EngineSnapshot) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub view_mode: ViewMode,
    pub show_grid_lines: bool,
    /// Navigation and undo look at the active layer only.
    pub layer_specific_navigation: bool,
    pub magnetic_snap: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SongInfo {
    pub name: String,
    pub bpm: f64,
    pub audio: Option<AudioRef>,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    pub modified_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSnapshot {
    pub start_ms: f64,
    pub duration_ms: f64,
    pub pixels_per_second: f64,
    pub width_px: f64,
    pub is_locked: bool,
}

impl From<&Viewport> for ViewportSnapshot {
    fn from(viewport: &Viewport) -> Self {
        Self {
            start_ms: viewport.start_ms(),
            duration_ms: viewport.duration_ms(),
            pixels_per_second: viewport.pixels_per_second(),
            width_px: viewport.width_px(),
            is_locked: viewport.is_locked(),
        }
    }
}

/// Owned, immutable view of the engine state.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub playback: PlaybackState,
    pub current_ms: f64,
    pub ghost_ms: Option<f64>,
    pub song_duration_ms: f64,
    pub song_loaded: bool,
    pub viewport: ViewportSnapshot,
    pub layers: Vec<Layer>,
    pub active_layer: LayerId,
    pub stem_count: StemCount,
    pub settings: EngineSettings,
    pub repeat: bool,
    pub loop_region: Option<LoopRegion>,
    pub can_redo: bool,
    pub is_dragging: bool,
    pub song: SongInfo,
    pub peaks: PeakData,
}

impl EngineSnapshot {
    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn layer(&self, id: LayerId) -> &Layer {
        &self.layers[id.index()]
    }

    pub fn marker_count(&self) -> usize {
        self.layers.iter().map(|l| l.markers.len()).sum()
    }

    /// Layers of the selected stem set, hidden ones included.
    pub fn exposed_layers(&self) -> impl Iterator<Item = &Layer> {
        self.stem_count.layers().iter().map(|id| self.layer(*id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub unknown_layers: Vec<String>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn song_name(audio: &AudioRef) -> String {
    Path::new(&audio.filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(&audio.filename)
        .to_string()
}

fn transport_result<T>(result: Result<T, TransportError>) -> Result<T, EngineError> {
    result.map_err(|e| {
        tracing::warn!(error = %e, "transport call failed");
        EngineError::from(e)
    })
}

pub struct TimelineEngine {
    config: EngineConfig,
    transport: TransportController,
    viewport: Viewport,
    markers: MarkerStore,
    peaks: PeakData,
    peak_provider: Box<dyn PeakProvider>,
    store: Box<dyn ProjectStore>,
    song: SongInfo,
    settings: EngineSettings,
    drag: Option<DragSession>,
    next_drag: u64,
    waveform: WaveformCache,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: u64,
}

impl TimelineEngine {
    pub fn new(
        config: EngineConfig,
        transport: Box<dyn AudioTransport>,
        peak_provider: Box<dyn PeakProvider>,
        store: Box<dyn ProjectStore>,
    ) -> Self {
        let transport = TransportController::new(transport);
        let viewport = Viewport::new(
            transport.song_duration_ms(),
            config.viewport_width_px,
            config.min_pixels_per_second,
            config.max_pixels_per_second,
        );

        Self {
            config,
            transport,
            viewport,
            markers: MarkerStore::new(config.default_stem_count),
            peaks: PeakData::empty(),
            peak_provider,
            store,
            song: SongInfo {
                name: String::new(),
                bpm: config.default_bpm,
                audio: None,
                created_at: 0,
                modified_at: 0,
            },
            settings: EngineSettings {
                view_mode: ViewMode::default(),
                show_grid_lines: true,
                layer_specific_navigation: false,
                magnetic_snap: config.magnetic_snap,
            },
            drag: None,
            next_drag: 0,
            waveform: WaveformCache::new(),
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transport(&self) -> &TransportController {
        &self.transport
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    pub fn peaks(&self) -> &PeakData {
        &self.peaks
    }

    pub fn song(&self) -> &SongInfo {
        &self.song
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    pub fn time_context(&self) -> TimeContext {
        TimeContext::new(self.song.bpm)
    }

    pub fn needs_polling(&self) -> bool {
        self.transport.needs_polling()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            playback: self.transport.state(),
            current_ms: self.transport.current_ms(),
            ghost_ms: self.transport.ghost_ms(),
            song_duration_ms: self.transport.song_duration_ms(),
            song_loaded: self.transport.song_loaded(),
            viewport: ViewportSnapshot::from(&self.viewport),
            layers: self.markers.layers().to_vec(),
            active_layer: self.markers.active_layer(),
            stem_count: self.markers.stem_count(),
            settings: self.settings,
            repeat: self.transport.repeat(),
            loop_region: self.transport.loop_region(),
            can_redo: self.markers.undo_slot().is_some(),
            is_dragging: self.drag.is_some(),
            song: self.song.clone(),
            peaks: self.peaks.clone(),
        }
    }

    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&EngineSnapshot) + Send + 'static,
    {
        self.next_observer += 1;
        let id = ObserverId(self.next_observer);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    fn notify(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for (_, observer) in &mut self.observers {
            observer(&snapshot);
        }
    }

    // Song

    /// Load audio through the transport and reset markers and viewport for
    /// the new song. Returns the duration in milliseconds.
    pub fn load_song(&mut self, audio: AudioRef) -> Result<f64, EngineError> {
        self.drop_drag();
        let result = self.transport.load(&audio);
        let duration_ms = match result {
            Ok(duration_ms) => duration_ms,
            Err(e) => {
                self.notify();
                return transport_result(Err(e));
            }
        };

        self.peaks = self
            .peak_provider
            .load_peaks(&audio, duration_ms.round() as u64);
        self.waveform.clear();
        self.viewport.set_song_duration(duration_ms);
        self.viewport.fit_to_song();
        self.markers.clear_all();

        let now = now_ms();
        self.song = SongInfo {
            name: song_name(&audio),
            bpm: self.song.bpm,
            audio: Some(audio),
            created_at: now,
            modified_at: now,
        };

        self.notify();
        Ok(duration_ms)
    }

    pub fn set_song_name(&mut self, name: impl Into<String>) {
        self.song.name = name.into();
        self.notify();
    }

    /// Ignores non-positive or non-finite tempos.
    pub fn set_bpm(&mut self, bpm: f64) -> bool {
        if !bpm.is_finite() || bpm <= 0.0 {
            return false;
        }
        self.song.bpm = bpm;
        self.notify();
        true
    }

    // Transport

    fn start_playback(&mut self) -> Result<(), TransportError> {
        if self.transport.play()? == PlayOutcome::Restarted {
            self.viewport.set_start(0.0);
        }
        Ok(())
    }

    pub fn toggle_playback(&mut self) -> Result<(), EngineError> {
        let result = match self.transport.state() {
            PlaybackState::Playing => self.transport.pause().map(|_| ()),
            PlaybackState::Stopped => self.start_playback(),
            PlaybackState::Scrubbing => {
                let resume = !self.transport.resume_after_scrub();
                self.transport.set_resume_after_scrub(resume);
                Ok(())
            }
        };
        self.notify();
        transport_result(result)
    }

    pub fn play(&mut self) -> Result<(), EngineError> {
        let result = self.start_playback();
        self.notify();
        transport_result(result)
    }

    pub fn pause(&mut self) -> Result<(), EngineError> {
        let result = self.transport.pause().map(|_| ());
        self.notify();
        transport_result(result)
    }

    pub fn seek_to(&mut self, time_ms: f64) -> Result<(), EngineError> {
        let result = self.transport.seek_to(time_ms).map(|_| ());
        self.notify();
        transport_result(result)
    }

    pub fn set_ghost_time(&mut self, ghost_ms: Option<f64>) {
        self.transport.set_ghost(ghost_ms);
        self.notify();
    }

    /// Sample the transport once. Hosts call this every poll interval while
    /// [`needs_polling`](Self::needs_polling) holds.
    pub fn poll(&mut self) -> PollOutcome {
        let outcome = self.transport.poll();
        match outcome {
            PollOutcome::Idle => return outcome,
            PollOutcome::Advanced(time_ms) | PollOutcome::Looped(time_ms) => {
                self.viewport.follow_playhead(time_ms, true);
            }
            PollOutcome::Ended => {
                tracing::info!("playback reached end of track");
                // Last sample of the run still pages a locked window.
                self.viewport
                    .follow_playhead(self.transport.current_ms(), true);
            }
        }
        self.notify();
        outcome
    }

    /// Returns the new state.
    pub fn toggle_repeat(&mut self) -> bool {
        let repeat = !self.transport.repeat();
        self.transport.set_repeat(repeat);
        self.notify();
        repeat
    }

    /// Turn loop-marker mode on by capturing the navigation neighbours of the
    /// playhead as the loop region, or turn it off.
    pub fn toggle_loop_markers(&mut self) -> Option<LoopRegion> {
        let region = if self.transport.loop_region().is_some() {
            None
        } else {
            let current = self.transport.current_ms();
            let left = self
                .find_nearest(Direction::Left, current)
                .unwrap_or(0.0);
            let right = self
                .find_nearest(Direction::Right, current)
                .unwrap_or(self.transport.song_duration_ms());
            LoopRegion::new(left, right)
        };
        self.transport.set_loop_region(region);
        self.notify();
        region
    }

    pub fn skip_to_start(&mut self) -> Result<(), EngineError> {
        let result = self.transport.seek_to(0.0).map(|_| ());
        self.transport.set_ghost(None);
        self.viewport.set_start(0.0);
        self.notify();
        transport_result(result)
    }

    pub fn skip_to_end(&mut self) -> Result<(), EngineError> {
        let end = self.transport.song_duration_ms();
        let result = self.transport.seek_to(end).map(|_| ());
        self.transport.set_ghost(None);
        self.viewport.set_start(end);
        self.notify();
        transport_result(result)
    }

    // Markers

    pub fn navigation_scope(&self) -> NavigationScope {
        if self.settings.layer_specific_navigation {
            NavigationScope::ActiveLayer
        } else {
            NavigationScope::AllLayers
        }
    }

    fn find_nearest(&self, direction: Direction, current_ms: f64) -> Option<f64> {
        self.markers.find_nearest(
            direction,
            current_ms,
            self.navigation_scope(),
            self.transport.ghost_ms(),
            self.transport.song_duration_ms(),
        )
    }

    /// Toggle a marker on the active layer at the playhead.
    pub fn tap_marker(&mut self) -> Option<ToggleOutcome> {
        let at = self.transport.live_position_ms().round() as u64;
        self.toggle_marker_at(self.markers.active_layer(), at)
    }

    /// No-op without a loaded song. Adding a marker empties the redo slot.
    pub fn toggle_marker_at(&mut self, layer: LayerId, timestamp_ms: u64) -> Option<ToggleOutcome> {
        if !self.transport.song_loaded() {
            return None;
        }
        let outcome = self.markers.toggle_marker_at_time(layer, timestamp_ms);
        if outcome == ToggleOutcome::Added {
            self.markers.clear_undo_slot();
        }
        self.notify();
        Some(outcome)
    }

    pub fn add_marker(&mut self, layer: LayerId, timestamp_ms: u64) -> bool {
        if !self.transport.song_loaded() {
            return false;
        }
        self.markers.add_marker(layer, timestamp_ms);
        self.markers.clear_undo_slot();
        self.notify();
        true
    }

    pub fn remove_marker(&mut self, layer: LayerId, timestamp_ms: u64) -> usize {
        let removed = self.markers.remove_marker(layer, timestamp_ms);
        if removed > 0 {
            self.notify();
        }
        removed
    }

    /// Remove the closest marker before the playhead.
    pub fn undo_last_marker(&mut self) -> Option<RemovedMarker> {
        let current = self.transport.live_position_ms();
        let removed = self
            .markers
            .remove_last_marker_before(current, self.navigation_scope());
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    pub fn redo_last_marker(&mut self) -> Option<RemovedMarker> {
        let restored = self.markers.redo_last_removed();
        if restored.is_some() {
            self.notify();
        }
        restored
    }

    /// Seek to the nearest marker, ghost or song boundary in `direction`.
    pub fn navigate(&mut self, direction: Direction) -> Result<Option<f64>, EngineError> {
        if !self.transport.song_loaded() {
            return Ok(None);
        }
        let Some(target) = self.find_nearest(direction, self.transport.current_ms()) else {
            return Ok(None);
        };

        transport_result(self.transport.seek_to(target))?;
        self.transport.set_ghost(None);
        if !self.viewport.contains(target) {
            self.viewport.set_start(target);
        }
        self.notify();
        Ok(Some(target))
    }

    pub fn set_active_layer(&mut self, layer: LayerId) -> bool {
        let changed = self.markers.set_active_layer(layer);
        if changed {
            self.notify();
        }
        changed
    }

    pub fn set_stem_count(&mut self, stem_count: StemCount) {
        self.markers.set_stem_count(stem_count);
        self.notify();
    }

    pub fn toggle_visibility(&mut self, layer: LayerId) -> bool {
        let visible = self.markers.toggle_visibility(layer);
        self.notify();
        visible
    }

    pub fn update_annotation(&mut self, layer: LayerId, timestamp_ms: u64, text: &str) -> bool {
        let updated = self.markers.update_annotation(layer, timestamp_ms, text);
        if updated {
            self.notify();
        }
        updated
    }

    pub fn clear_layer(&mut self, layer: LayerId) {
        self.markers.clear_layer(layer);
        self.notify();
    }

    pub fn clear_all_markers(&mut self) {
        self.markers.clear_all();
        self.notify();
    }

    pub fn set_layer_specific_navigation(&mut self, enabled: bool) {
        self.settings.layer_specific_navigation = enabled;
        self.notify();
    }

    pub fn set_magnetic_snap(&mut self, enabled: bool) {
        self.settings.magnetic_snap = enabled;
        self.notify();
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.settings.view_mode = view_mode;
        self.notify();
    }

    pub fn set_show_grid_lines(&mut self, show: bool) {
        self.settings.show_grid_lines = show;
        self.notify();
    }

    // Viewport

    /// Manual window move; unlocks follow mode.
    pub fn set_viewport_start(&mut self, start_ms: f64) {
        self.viewport.unlock();
        self.viewport.set_start(start_ms);
        self.notify();
    }

    /// Manual window resize; unlocks follow mode.
    pub fn set_viewport_duration(&mut self, duration_ms: f64) {
        self.viewport.unlock();
        self.viewport.set_duration(duration_ms);
        self.notify();
    }

    pub fn set_viewport_width(&mut self, width_px: f64) {
        if self.viewport.set_width(width_px) {
            self.notify();
        }
    }

    pub fn fit_viewport_to_song(&mut self) {
        self.viewport.fit_to_song();
        self.notify();
    }

    pub fn lock_viewport(&mut self) {
        self.viewport.lock();
        self.notify();
    }

    /// One keyboard zoom step, anchored on the playhead when it is visible
    /// and on the window center otherwise.
    pub fn zoom(&mut self, direction: ZoomDirection) -> bool {
        let factor = match direction {
            ZoomDirection::In => self.config.zoom_in_factor,
            ZoomDirection::Out => self.config.zoom_out_factor,
        };
        let current = self.transport.current_ms();
        let anchor = if self.viewport.contains(current) {
            current
        } else {
            self.viewport.start_ms() + self.viewport.duration_ms() / 2.0
        };
        self.zoom_at(factor, anchor)
    }

    /// Continuous zoom, e.g. from a pinch gesture.
    pub fn zoom_at(&mut self, factor: f64, anchor_ms: f64) -> bool {
        let changed = self.viewport.zoom_at(factor, anchor_ms);
        if changed {
            self.notify();
        }
        changed
    }

    pub fn scroll_left(&mut self) -> bool {
        self.scroll(-SCROLL_STEP_RATIO)
    }

    pub fn scroll_right(&mut self) -> bool {
        self.scroll(SCROLL_STEP_RATIO)
    }

    fn scroll(&mut self, ratio: f64) -> bool {
        let moved = self.viewport.scroll_by_ratio(ratio);
        self.notify();
        moved
    }

    // Snapping

    fn snap_candidate(&self, time_ms: f64, ghost_ms: Option<f64>) -> f64 {
        if !self.settings.magnetic_snap {
            return time_ms;
        }
        let targets = snap::snap_targets(
            &self.time_context(),
            &self.markers,
            self.viewport.start_ms(),
            self.viewport.end_ms(),
            ghost_ms,
        );
        snap::resolve(time_ms, &targets, self.viewport.pixels_per_ms())
    }

    /// Resolve `time_ms` against the grid, visible markers and the ghost
    /// cursor. Returns the input unchanged while magnetic snap is off.
    pub fn snap_time(&self, time_ms: f64) -> f64 {
        self.snap_candidate(time_ms, self.transport.ghost_ms())
    }

    /// Visible grid line times, empty while grid lines are hidden.
    pub fn grid_lines(&self) -> Vec<f64> {
        if !self.settings.show_grid_lines {
            return Vec::new();
        }
        self.time_context()
            .grid_lines(self.viewport.start_ms(), self.viewport.end_ms())
    }

    // Drag sessions

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Start a drag. An unfinished earlier drag is ended first.
    pub fn begin_drag(&mut self, target: DragTarget, pointer_x: f64) -> Result<DragHandle, EngineError> {
        if self.drag.is_some() {
            if let Err(e) = self.finish_drag() {
                tracing::warn!(error = %e, "ending previous drag failed");
            }
        }

        if target == DragTarget::Playhead {
            transport_result(self.transport.begin_scrub())?;
        } else {
            self.viewport.unlock();
        }

        self.next_drag += 1;
        let handle = DragHandle(self.next_drag);
        let time_ms = target.time_at(&self.viewport, pointer_x);
        self.drag = Some(DragSession::begin(handle, target, &self.viewport, time_ms));
        if target == DragTarget::Playhead {
            self.scrub_to(time_ms);
        }

        self.notify();
        Ok(handle)
    }

    /// Returns false for a stale handle.
    pub fn update_drag(&mut self, handle: DragHandle, pointer_x: f64) -> bool {
        let Some(mut session) = self.drag.filter(|s| s.handle == handle) else {
            return false;
        };
        let time_ms = session.target.time_at(&self.viewport, pointer_x);

        if session.target == DragTarget::Playhead {
            self.scrub_to(time_ms);
        } else {
            session.apply_to_viewport(&mut self.viewport, time_ms);
            self.drag = Some(session);
        }

        self.notify();
        true
    }

    // Map, snap, move the playhead, then edge-scroll.
    fn scrub_to(&mut self, time_ms: f64) {
        if time_ms.is_nan() || !self.transport.song_loaded() {
            return;
        }
        // The ghost follows the pointer here, so it is not a snap target.
        let time_ms = self.snap_candidate(time_ms, None);
        self.transport.update_scrub(time_ms);
        self.transport.set_ghost(Some(time_ms));
        self.viewport.edge_auto_scroll(time_ms);
        if let Some(session) = self.drag.as_mut() {
            session.last_time_ms = self.transport.current_ms();
        }
    }

    /// Finish the drag identified by `handle`. Stale handles are ignored.
    pub fn end_drag(&mut self, handle: DragHandle) -> Result<(), EngineError> {
        if self.drag.map(|s| s.handle) != Some(handle) {
            return Ok(());
        }
        let result = self.finish_drag();
        self.notify();
        transport_result(result)
    }

    /// Interrupt the current drag, committing its last position.
    pub fn cancel_drag(&mut self) -> Result<(), EngineError> {
        if self.drag.is_none() {
            return Ok(());
        }
        let result = self.finish_drag();
        self.notify();
        transport_result(result)
    }

    fn finish_drag(&mut self) -> Result<(), TransportError> {
        match self.drag.take() {
            Some(session) if session.target == DragTarget::Playhead => {
                self.transport.end_scrub().map(|_| ())
            }
            _ => Ok(()),
        }
    }

    fn drop_drag(&mut self) {
        if let Err(e) = self.finish_drag() {
            tracing::warn!(error = %e, "dropping drag failed");
        }
    }

    // Waveform

    /// Waveform for the visible window, memoized across calls.
    pub fn visible_waveform(&mut self, height_px: f64) -> &WaveformPath {
        self.waveform.sample(
            &self.peaks,
            self.viewport.width_px(),
            height_px,
            self.viewport.start_ms(),
            self.viewport.duration_ms(),
        )
    }

    // Persistence

    pub fn to_project(&self) -> Project {
        Project {
            version: PROJECT_FORMAT_VERSION.to_string(),
            metadata: ProjectMetadata {
                name: self.song.name.clone(),
                bpm: self.song.bpm,
                duration_ms: self.transport.song_duration_ms().round() as u64,
                stem_count: self.markers.stem_count().as_u8(),
                created_at: self.song.created_at,
                modified_at: self.song.modified_at,
            },
            audio: self.song.audio.clone(),
            layers: self.markers.to_layer_data(),
            settings: ProjectSettings {
                view_mode: self.settings.view_mode,
                show_grid_lines: self.settings.show_grid_lines,
                layer_specific_navigation: self.settings.layer_specific_navigation,
            },
        }
    }

    pub fn save_project(&mut self, key: &str) -> Result<(), EngineError> {
        let now = now_ms();
        let previous = (self.song.created_at, self.song.modified_at);
        if self.song.created_at == 0 {
            self.song.created_at = now;
        }
        self.song.modified_at = now;

        let project = self.to_project();
        if let Err(e) = save_to_store(self.store.as_mut(), key, &project) {
            (self.song.created_at, self.song.modified_at) = previous;
            return Err(e.into());
        }

        tracing::info!(key, markers = self.markers.marker_count(), "project saved");
        Ok(())
    }

    /// Load and apply a stored project. Nothing changes when the record is
    /// missing or invalid.
    pub fn load_project(&mut self, key: &str) -> Result<(), EngineError> {
        let project = load_from_store(self.store.as_ref(), key)?;
        self.apply_project(project)?;
        tracing::info!(key, markers = self.markers.marker_count(), "project loaded");
        Ok(())
    }

    /// Replace the engine contents with `project`.
    ///
    /// Audio that cannot be loaded is not an error: the project opens with
    /// its recorded duration and placeholder peaks but no song loaded, as
    /// does a project without audio.
    pub fn apply_project(&mut self, project: Project) -> Result<(), EngineError> {
        let stem_count = StemCount::try_from(project.metadata.stem_count).map_err(|e| {
            ProjectError::Validation {
                reason: e.to_string(),
            }
        })?;
        let recorded_ms = project.metadata.duration_ms;
        if recorded_ms == 0 {
            return Err(ProjectError::Validation {
                reason: "zero duration".to_string(),
            }
            .into());
        }

        self.drop_drag();
        match &project.audio {
            Some(audio) => match self.transport.load(audio) {
                Ok(duration_ms) => {
                    self.peaks = self
                        .peak_provider
                        .load_peaks(audio, duration_ms.round() as u64);
                }
                Err(e) => {
                    tracing::warn!(uri = %audio.uri, error = %e, "project audio unavailable");
                    self.transport.unload();
                    self.transport.set_song_duration(recorded_ms as f64);
                    self.peaks = self.peak_provider.load_peaks(audio, recorded_ms);
                }
            },
            None => {
                self.transport.unload();
                self.transport.set_song_duration(recorded_ms as f64);
                self.peaks = PeakData::empty();
            }
        }

        self.waveform.clear();
        self.viewport
            .set_song_duration(self.transport.song_duration_ms());
        self.viewport.fit_to_song();
        self.markers.restore(&project.layers, stem_count);
        self.settings.view_mode = project.settings.view_mode;
        self.settings.show_grid_lines = project.settings.show_grid_lines;
        self.settings.layer_specific_navigation = project.settings.layer_specific_navigation;
        self.song = SongInfo {
            name: project.metadata.name,
            bpm: project.metadata.bpm,
            audio: project.audio,
            created_at: project.metadata.created_at,
            modified_at: project.metadata.modified_at,
        };

        self.notify();
        Ok(())
    }

    pub fn list_projects(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.store.keys()?)
    }

    pub fn delete_project(&mut self, key: &str) -> Result<bool, EngineError> {
        Ok(self.store.delete(key)?)
    }

    /// Merge markers from CSV text. The whole text is parsed before anything
    /// is applied, so a malformed row leaves the engine untouched.
    pub fn import_csv(&mut self, text: &str) -> Result<ImportSummary, EngineError> {
        let import = parse_marker_csv(text)?;
        self.markers.merge_imported(&import.markers);

        let summary = ImportSummary {
            imported: import.markers.len(),
            skipped: import.skipped_rows(),
            unknown_layers: import.unknown_layers,
        };
        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped,
            "markers imported"
        );
        self.notify();
        Ok(summary)
    }
}

impl std::fmt::Debug for TimelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineEngine")
            .field("transport", &self.transport)
            .field("viewport", &self.viewport)
            .field("song", &self.song)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}
