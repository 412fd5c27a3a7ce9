/// Beats between two adjacent snap grid lines.
pub const GRID_BEATS_PER_LINE: u32 = 8;

/// Bars are counted in 4/4.
pub const BEATS_PER_BAR: u32 = 4;

pub const DEFAULT_BPM: f64 = 120.0;

/// Tempo context for converting wall-clock milliseconds to musical time.
///
/// BPM is user supplied; a non-positive or non-finite value disables every
/// beat-derived feature (grid lines, musical positions) instead of failing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeContext {
    pub bpm: f64,
}

impl TimeContext {
    pub fn new(bpm: f64) -> Self {
        Self { bpm }
    }

    pub fn has_tempo(&self) -> bool {
        self.bpm.is_finite() && self.bpm > 0.0
    }

    pub fn beat_ms(&self) -> Option<f64> {
        self.has_tempo().then(|| 60_000.0 / self.bpm)
    }

    pub fn grid_spacing_ms(&self) -> Option<f64> {
        self.beat_ms().map(|beat| beat * GRID_BEATS_PER_LINE as f64)
    }

    pub fn ms_to_beats(&self, ms: f64) -> f64 {
        self.beat_ms().map_or(0.0, |beat| ms / beat)
    }

    pub fn beats_to_ms(&self, beats: f64) -> f64 {
        self.beat_ms().map_or(0.0, |beat| beats * beat)
    }

    /// Grid line times inside `[start_ms, end_ms]`, in ascending order.
    pub fn grid_lines(&self, start_ms: f64, end_ms: f64) -> Vec<f64> {
        let Some(spacing) = self.grid_spacing_ms() else {
            return Vec::new();
        };
        if !(start_ms.is_finite() && end_ms.is_finite()) || end_ms < start_ms || end_ms < 0.0 {
            return Vec::new();
        }

        let first = (start_ms.max(0.0) / spacing).ceil() as u64;
        let last = (end_ms / spacing).floor() as u64;
        (first..=last).map(|k| k as f64 * spacing).collect()
    }

    pub fn format_position(&self, ms: f64) -> MusicalPosition {
        let Some(beat_ms) = self.beat_ms() else {
            return MusicalPosition::default();
        };
        let ms = ms.max(0.0);
        let total_beats = (ms / beat_ms).floor();
        let bar = (total_beats / BEATS_PER_BAR as f64).floor() as u32 + 1;
        let beat = (total_beats % BEATS_PER_BAR as f64) as u32 + 1;
        let offset_ms = (ms - total_beats * beat_ms).floor() as u32;

        MusicalPosition {
            bar,
            beat,
            offset_ms,
        }
    }
}

impl Default for TimeContext {
    fn default() -> Self {
        Self::new(DEFAULT_BPM)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MusicalPosition {
    pub bar: u32,
    pub beat: u32,
    pub offset_ms: u32,
}

impl Default for MusicalPosition {
    fn default() -> Self {
        Self {
            bar: 1,
            beat: 1,
            offset_ms: 0,
        }
    }
}

impl std::fmt::Display for MusicalPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{:03}", self.bar, self.beat, self.offset_ms)
    }
}

/// Format milliseconds as `m:ss.mmm`.
pub fn format_clock(ms: f64) -> String {
    let total = if ms.is_finite() { ms.max(0.0).round() as u64 } else { 0 };
    let minutes = total / 60_000;
    let seconds = (total / 1000) % 60;
    let millis = total % 1000;
    format!("{minutes}:{seconds:02}.{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_and_grid_spacing() {
        let ctx = TimeContext::new(120.0);
        assert_eq!(ctx.beat_ms(), Some(500.0));
        assert_eq!(ctx.grid_spacing_ms(), Some(4000.0));
    }

    #[test]
    fn test_invalid_bpm_disables_grid() {
        for bpm in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let ctx = TimeContext::new(bpm);
            assert!(!ctx.has_tempo());
            assert!(ctx.grid_lines(0.0, 10_000.0).is_empty());
            assert_eq!(ctx.format_position(1234.0), MusicalPosition::default());
        }
    }

    #[test]
    fn test_grid_lines_in_window() {
        let ctx = TimeContext::new(120.0);
        assert_eq!(ctx.grid_lines(3000.0, 13000.0), vec![4000.0, 8000.0, 12000.0]);
        assert_eq!(ctx.grid_lines(0.0, 4000.0), vec![0.0, 4000.0]);
        assert!(ctx.grid_lines(4100.0, 7900.0).is_empty());
        assert!(ctx.grid_lines(5000.0, 1000.0).is_empty());
    }

    #[test]
    fn test_beats_roundtrip() {
        let ctx = TimeContext::new(90.0);
        let ms = ctx.beats_to_ms(6.0);
        assert!((ctx.ms_to_beats(ms) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_format_position() {
        let ctx = TimeContext::new(120.0);
        assert_eq!(ctx.format_position(0.0).to_string(), "1.1.000");
        assert_eq!(ctx.format_position(750.0).to_string(), "1.2.250");
        assert_eq!(ctx.format_position(2000.0).to_string(), "2.1.000");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "0:00.000");
        assert_eq!(format_clock(61_234.4), "1:01.234");
        assert_eq!(format_clock(-5.0), "0:00.000");
        assert_eq!(format_clock(f64::NAN), "0:00.000");
    }
}
