use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One of the six fixed annotation layers (instrument stems).
///
/// The set is closed: every layer exists for the lifetime of an engine, so
/// an invalid layer id cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerId {
    Vocals,
    Drums,
    Bass,
    Piano,
    Guitar,
    Other,
}

impl LayerId {
    /// All layers in canonical order.
    pub const ALL: [LayerId; 6] = [
        LayerId::Vocals,
        LayerId::Drums,
        LayerId::Bass,
        LayerId::Piano,
        LayerId::Guitar,
        LayerId::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerId::Vocals => "vocals",
            LayerId::Drums => "drums",
            LayerId::Bass => "bass",
            LayerId::Piano => "piano",
            LayerId::Guitar => "guitar",
            LayerId::Other => "other",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LayerId::Vocals => "Vocals",
            LayerId::Drums => "Drums",
            LayerId::Bass => "Bass",
            LayerId::Piano => "Piano",
            LayerId::Guitar => "Guitar",
            LayerId::Other => "Other",
        }
    }

    pub fn default_color(&self) -> &'static str {
        match self {
            LayerId::Vocals => "#FF6B6B",
            LayerId::Drums => "#4ECDC4",
            LayerId::Bass => "#45B7D1",
            LayerId::Piano => "#F7B731",
            LayerId::Guitar => "#A55EEA",
            LayerId::Other => "#26DE81",
        }
    }

    /// Position of this layer in [`LayerId::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown layer name: {0}")]
pub struct UnknownLayer(pub String);

impl FromStr for LayerId {
    type Err = UnknownLayer;

    /// Accepts either the id (`vocals`) or the display name (`Vocals`),
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        LayerId::ALL
            .into_iter()
            .find(|layer| {
                needle.eq_ignore_ascii_case(layer.as_str())
                    || needle.eq_ignore_ascii_case(layer.display_name())
            })
            .ok_or_else(|| UnknownLayer(needle.to_string()))
    }
}

/// Reference to the audio a project annotates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRef {
    pub uri: String,
    pub filename: String,
}

impl AudioRef {
    pub fn new(uri: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            filename: filename.into(),
        }
    }
}

pub fn secs_to_ms(seconds: f64) -> f64 {
    seconds * 1000.0
}

pub fn ms_to_secs(ms: f64) -> f64 {
    ms / 1000.0
}

/// Shared, immutable amplitude peaks for a whole song.
///
/// Peaks are normalized to `0.0..=1.0`. Cloning only bumps the reference
/// count, so snapshots and the waveform cache can hold the same buffer and
/// compare it by identity.
///
/// ```text
/// PeakData
/// ├─ peaks: Arc<[f32]> ────> Heap: [f32; N]
/// └─ duration_ms: u64
/// ```
#[derive(Clone)]
pub struct PeakData {
    peaks: Arc<[f32]>,
    duration_ms: u64,
}

impl PeakData {
    /// Create peak data, clamping every value into `0.0..=1.0`.
    /// Non-finite values become `0.0`.
    pub fn new(peaks: Vec<f32>, duration_ms: u64) -> Self {
        let peaks: Vec<f32> = peaks
            .into_iter()
            .map(|p| if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 })
            .collect();
        Self {
            peaks: Arc::from(peaks),
            duration_ms,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    /// Deterministic sine-based placeholder used when decoding is unavailable.
    pub fn synthetic(duration_ms: u64, count: usize) -> Self {
        let peaks = (0..count)
            .map(|i| {
                let t = i as f32 / count.max(1) as f32;
                let slow = (2.0 * PI * t * 3.0).sin().abs();
                let fast = (2.0 * PI * t * 97.0).sin().abs();
                0.15 + 0.6 * slow * (0.5 + 0.5 * fast)
            })
            .collect();
        Self::new(peaks, duration_ms)
    }

    #[inline]
    pub fn peaks(&self) -> &[f32] {
        &self.peaks
    }

    pub fn peaks_arc(&self) -> &Arc<[f32]> {
        &self.peaks
    }

    #[inline]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// True when both values share the same underlying buffer.
    pub fn ptr_eq(&self, other: &PeakData) -> bool {
        Arc::ptr_eq(&self.peaks, &other.peaks)
    }
}

impl fmt::Debug for PeakData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeakData")
            .field("len", &self.len())
            .field("duration_ms", &self.duration_ms)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("no audio loaded")]
    NotLoaded,

    #[error("failed to load '{uri}': {reason}")]
    Load { uri: String, reason: String },

    #[error("transport rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },
}

impl TransportError {
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        TransportError::Rejected {
            operation,
            reason: reason.into(),
        }
    }
}

/// External audio playback device.
///
/// All times at this boundary are in seconds. The transport only exposes a
/// pull-based position; callers sample `current_time` themselves. `seek_to`
/// keeps the current play/pause state of the device.
pub trait AudioTransport: Send {
    /// Load a source and return its duration in seconds.
    fn load(&mut self, source: &AudioRef) -> Result<f64, TransportError>;
    fn play(&mut self) -> Result<(), TransportError>;
    fn pause(&mut self) -> Result<(), TransportError>;
    fn seek_to(&mut self, seconds: f64) -> Result<(), TransportError>;
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
}

/// Source of waveform peaks for a loaded song.
///
/// Implementations never fail: when real peaks are unavailable they return a
/// placeholder such as [`PeakData::synthetic`].
pub trait PeakProvider: Send {
    fn load_peaks(&mut self, source: &AudioRef, duration_ms: u64) -> PeakData;
}

/// Number of placeholder peaks generated per second of audio.
pub const SYNTHETIC_PEAKS_PER_SECOND: u64 = 20;

/// Provider that always answers with synthetic peaks.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticPeaks;

impl PeakProvider for SyntheticPeaks {
    fn load_peaks(&mut self, _source: &AudioRef, duration_ms: u64) -> PeakData {
        let count = (duration_ms / 1000 * SYNTHETIC_PEAKS_PER_SECOND).max(1) as usize;
        PeakData::synthetic(duration_ms, count)
    }
}
