//! JSON views of engine state for the host's output stream.
//!
//! These are snapshots at a point in time; peak data is reduced to a count.

use serde::{Deserialize, Serialize};

use stemtap_core::{
    EngineSnapshot, ImportSummary, Layer, LoopRegion, PlaybackState, TimeContext, ViewMode,
    format_clock,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshotDto {
    pub playback_state: PlaybackStateDto,
    pub current_ms: f64,
    /// `m:ss.mmm`
    pub clock: String,
    /// `bar.beat.ms`
    pub position: String,
    pub ghost_ms: Option<f64>,
    pub song_duration_ms: f64,
    pub song_loaded: bool,
    pub song: SongDto,
    pub viewport: ViewportDto,
    pub layers: Vec<LayerDto>,
    pub active_layer: String,
    pub stem_count: u8,
    pub settings: SettingsDto,
    pub repeat: bool,
    pub loop_region: Option<LoopRegionDto>,
    pub can_redo: bool,
    pub is_dragging: bool,
    pub peak_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStateDto {
    Stopped,
    Playing,
    Scrubbing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongDto {
    pub name: String,
    pub bpm: f64,
    pub audio_uri: Option<String>,
    pub created_at: u64,
    pub modified_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportDto {
    pub start_ms: f64,
    pub duration_ms: f64,
    pub pixels_per_second: f64,
    pub width_px: f64,
    pub is_locked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDto {
    pub id: String,
    pub name: String,
    pub color: String,
    pub markers: Vec<u64>,
    pub annotations: Vec<AnnotationDto>,
    pub is_visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationDto {
    pub timestamp: u64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDto {
    pub view_mode: ViewMode,
    pub show_grid_lines: bool,
    pub layer_specific_navigation: bool,
    pub magnetic_snap: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopRegionDto {
    pub start_ms: f64,
    pub end_ms: f64,
}

/// Emitted by the poll loop on every playback update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickEvent {
    pub current_ms: f64,
    pub playback_state: PlaybackStateDto,
    pub viewport_start_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummaryDto {
    pub imported: usize,
    pub skipped: usize,
    pub unknown_layers: Vec<String>,
}

/// One line of output per input command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDto {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportSummaryDto>,
    pub snapshot: EngineSnapshotDto,
}

impl From<PlaybackState> for PlaybackStateDto {
    fn from(state: PlaybackState) -> Self {
        match state {
            PlaybackState::Stopped => PlaybackStateDto::Stopped,
            PlaybackState::Playing => PlaybackStateDto::Playing,
            PlaybackState::Scrubbing => PlaybackStateDto::Scrubbing,
        }
    }
}

impl From<LoopRegion> for LoopRegionDto {
    fn from(region: LoopRegion) -> Self {
        Self {
            start_ms: region.start_ms,
            end_ms: region.end_ms,
        }
    }
}

impl From<&Layer> for LayerDto {
    fn from(layer: &Layer) -> Self {
        Self {
            id: layer.id.as_str().to_string(),
            name: layer.name.clone(),
            color: layer.color.clone(),
            markers: layer.markers.clone(),
            annotations: layer
                .annotations
                .iter()
                .map(|a| AnnotationDto {
                    timestamp: a.timestamp_ms,
                    text: a.text.clone(),
                })
                .collect(),
            is_visible: layer.is_visible,
        }
    }
}

impl From<ImportSummary> for ImportSummaryDto {
    fn from(summary: ImportSummary) -> Self {
        Self {
            imported: summary.imported,
            skipped: summary.skipped,
            unknown_layers: summary.unknown_layers,
        }
    }
}

/// Only the layers of the selected stem set are included.
pub fn snapshot_to_dto(snapshot: &EngineSnapshot) -> EngineSnapshotDto {
    let time = TimeContext::new(snapshot.song.bpm);

    EngineSnapshotDto {
        playback_state: snapshot.playback.into(),
        current_ms: snapshot.current_ms,
        clock: format_clock(snapshot.current_ms),
        position: time.format_position(snapshot.current_ms).to_string(),
        ghost_ms: snapshot.ghost_ms,
        song_duration_ms: snapshot.song_duration_ms,
        song_loaded: snapshot.song_loaded,
        song: SongDto {
            name: snapshot.song.name.clone(),
            bpm: snapshot.song.bpm,
            audio_uri: snapshot.song.audio.as_ref().map(|a| a.uri.clone()),
            created_at: snapshot.song.created_at,
            modified_at: snapshot.song.modified_at,
        },
        viewport: ViewportDto {
            start_ms: snapshot.viewport.start_ms,
            duration_ms: snapshot.viewport.duration_ms,
            pixels_per_second: snapshot.viewport.pixels_per_second,
            width_px: snapshot.viewport.width_px,
            is_locked: snapshot.viewport.is_locked,
        },
        layers: snapshot.exposed_layers().map(LayerDto::from).collect(),
        active_layer: snapshot.active_layer.as_str().to_string(),
        stem_count: snapshot.stem_count.as_u8(),
        settings: SettingsDto {
            view_mode: snapshot.settings.view_mode,
            show_grid_lines: snapshot.settings.show_grid_lines,
            layer_specific_navigation: snapshot.settings.layer_specific_navigation,
            magnetic_snap: snapshot.settings.magnetic_snap,
        },
        repeat: snapshot.repeat,
        loop_region: snapshot.loop_region.map(LoopRegionDto::from),
        can_redo: snapshot.can_redo,
        is_dragging: snapshot.is_dragging,
        peak_count: snapshot.peaks.len(),
    }
}

pub fn tick_event(snapshot: &EngineSnapshot) -> TickEvent {
    TickEvent {
        current_ms: snapshot.current_ms,
        playback_state: snapshot.playback.into(),
        viewport_start_ms: snapshot.viewport.start_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock_transport::ClockTransport;
    use stemtap_core::{
        AudioRef, EngineConfig, LayerId, MemoryStore, StemCount, SyntheticPeaks, TimelineEngine,
    };

    #[test]
    fn test_snapshot_json_shape() {
        let mut engine = TimelineEngine::new(
            EngineConfig::default(),
            Box::new(ClockTransport::with_duration(180.0)),
            Box::new(SyntheticPeaks),
            Box::new(MemoryStore::new()),
        );
        engine
            .load_song(AudioRef::new("file:///music/song.mp3", "song.mp3"))
            .expect("load");
        engine.add_marker(LayerId::Drums, 2500);
        engine.update_annotation(LayerId::Drums, 2500, "fill");
        engine.seek_to(65_250.0).expect("seek");
        engine.set_stem_count(StemCount::Four);

        let dto = snapshot_to_dto(&engine.snapshot());
        let json = serde_json::to_value(&dto).expect("serialize");

        assert_eq!(json["playbackState"], "stopped");
        assert_eq!(json["clock"], "1:05.250");
        assert_eq!(json["position"], "33.3.250");
        assert_eq!(json["stemCount"], 4);
        assert_eq!(json["layers"].as_array().map(Vec::len), Some(4));
        assert_eq!(json["layers"][1]["id"], "drums");
        assert_eq!(json["layers"][1]["annotations"][0]["text"], "fill");
        assert_eq!(json["settings"]["viewMode"], "combined");
        assert_eq!(json["viewport"]["isLocked"], true);
        assert_eq!(json["song"]["name"], "song");
        assert!(json["loopRegion"].is_null());
    }

    #[test]
    fn test_response_omits_empty_fields() {
        let engine = TimelineEngine::new(
            EngineConfig::default(),
            Box::new(ClockTransport::new()),
            Box::new(SyntheticPeaks),
            Box::new(MemoryStore::new()),
        );
        let response = ResponseDto {
            ok: true,
            error: None,
            projects: None,
            import: None,
            snapshot: snapshot_to_dto(&engine.snapshot()),
        };
        let json = serde_json::to_value(&response).expect("serialize");

        assert!(json.get("error").is_none());
        assert!(json.get("projects").is_none());
        assert_eq!(json["snapshot"]["songLoaded"], false);
    }
}
