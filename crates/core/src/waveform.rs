//! Peak sampling for waveform rendering.
//!
//! [`sample_path`] maps a time window onto a slice of song-wide peaks and
//! produces one column per pixel when zoomed out (a min/max envelope) or one
//! column per peak when zoomed in (points joined by straight segments).

use std::ops::Range;

use stemtap_transport::PeakData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    /// More peaks than pixels: each column is a bucket of peaks.
    Envelope,
    /// Fewer peaks than pixels: each column is one peak.
    Interpolated,
}

/// One vertical slice of the rendered waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeColumn {
    pub x: f32,
    /// Quietest peak in the column. Peaks are absolute amplitudes in 0..1,
    /// so this is not a negative excursion.
    pub min: f32,
    /// Loudest peak in the column.
    pub max: f32,
    /// Indices into the full peak array covered by this column.
    pub samples: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveformPath {
    pub mode: SampleMode,
    pub columns: Vec<EnvelopeColumn>,
    pub width: f32,
    pub height: f32,
}

impl WaveformPath {
    fn empty(width: f32, height: f32) -> Self {
        Self {
            mode: SampleMode::Envelope,
            columns: Vec::new(),
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn center_y(&self) -> f32 {
        self.height / 2.0
    }

    /// Absolute-peak outline: each column's `max` is mirrored around the
    /// center line, and `min` does not contribute. The upper edge runs left
    /// to right, the lower edge returns right to left.
    pub fn outline(&self) -> Vec<(f32, f32)> {
        let center = self.center_y();
        let half = self.height / 2.0;

        let upper = self.columns.iter().map(|c| (c.x, center - c.max * half));
        let lower = self
            .columns
            .iter()
            .rev()
            .map(|c| (c.x, center + c.max * half));
        upper.chain(lower).collect()
    }
}

fn peak_range(
    len: usize,
    window_start: f64,
    window_duration: f64,
    total_duration: f64,
) -> Option<Range<usize>> {
    let valid = window_start.is_finite()
        && window_duration.is_finite()
        && total_duration.is_finite()
        && window_duration > 0.0
        && total_duration > 0.0;
    if !valid || len == 0 {
        return None;
    }

    let scale = len as f64 / total_duration;
    let start = (window_start.max(0.0) * scale).floor();
    let end = ((window_start + window_duration) * scale).ceil();
    let start = (start as usize).min(len);
    let end = (end.max(0.0) as usize).min(len);

    (start < end).then_some(start..end)
}

/// Sample `peaks` for the window `[window_start, window_start + window_duration]`
/// (milliseconds, relative to a song of `total_duration`).
///
/// Bad input never fails: an empty, zero-sized or out-of-range request
/// returns an empty path.
pub fn sample_path(
    peaks: &[f32],
    width_px: f64,
    height_px: f64,
    window_start: f64,
    window_duration: f64,
    total_duration: f64,
) -> WaveformPath {
    let width = if width_px.is_finite() { width_px.max(0.0) } else { 0.0 };
    let height = if height_px.is_finite() { height_px.max(0.0) } else { 0.0 };
    let empty = WaveformPath::empty(width as f32, height as f32);

    let pixels = width.floor() as usize;
    if pixels == 0 {
        return empty;
    }
    let Some(range) = peak_range(peaks.len(), window_start, window_duration, total_duration)
    else {
        return empty;
    };

    let visible = range.len();
    if visible > pixels {
        let columns = (0..pixels)
            .map(|px| {
                let first = range.start + px * visible / pixels;
                let last = range.start + (px + 1) * visible / pixels;
                let bucket = &peaks[first..last];
                let (min, max) = bucket
                    .iter()
                    .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &p| {
                        (lo.min(p), hi.max(p))
                    });
                EnvelopeColumn {
                    x: px as f32,
                    min,
                    max,
                    samples: first..last,
                }
            })
            .collect();

        WaveformPath {
            mode: SampleMode::Envelope,
            columns,
            width: width as f32,
            height: height as f32,
        }
    } else {
        let step = if visible > 1 {
            width / (visible - 1) as f64
        } else {
            0.0
        };
        let columns = range
            .clone()
            .enumerate()
            .map(|(i, idx)| EnvelopeColumn {
                x: (i as f64 * step) as f32,
                min: peaks[idx],
                max: peaks[idx],
                samples: idx..idx + 1,
            })
            .collect();

        WaveformPath {
            mode: SampleMode::Interpolated,
            columns,
            width: width as f32,
            height: height as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheKey {
    window_start: u64,
    window_duration: u64,
    width: u64,
    height: u64,
}

impl CacheKey {
    fn new(width: f64, height: f64, window_start: f64, window_duration: f64) -> Self {
        Self {
            window_start: window_start.to_bits(),
            window_duration: window_duration.to_bits(),
            width: width.to_bits(),
            height: height.to_bits(),
        }
    }
}

/// Memoizes the most recent [`sample_path`] result.
///
/// Keyed by window, pixel size and the identity of the peak buffer, so a
/// re-render with an unchanged viewport skips the resampling.
#[derive(Debug, Default)]
pub struct WaveformCache {
    entry: Option<(CacheKey, PeakData, WaveformPath)>,
}

impl WaveformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(
        &mut self,
        peaks: &PeakData,
        width_px: f64,
        height_px: f64,
        window_start: f64,
        window_duration: f64,
    ) -> &WaveformPath {
        let key = CacheKey::new(width_px, height_px, window_start, window_duration);
        let hit = matches!(&self.entry, Some((k, p, _)) if *k == key && p.ptr_eq(peaks));

        if !hit {
            self.entry = None;
        }

        let (_, _, path) = self.entry.get_or_insert_with(|| {
            let path = sample_path(
                peaks.peaks(),
                width_px,
                height_px,
                window_start,
                window_duration,
                peaks.duration_ms() as f64,
            );
            (key, peaks.clone(), path)
        });
        path
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}
