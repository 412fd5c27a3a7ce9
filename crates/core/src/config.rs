use crate::markers::StemCount;
use crate::time::DEFAULT_BPM;

/// Engine tunables. Hosts usually fill this from their own config file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub viewport_width_px: f64,
    /// Pixels-per-second multiplier for one zoom-in step.
    pub zoom_in_factor: f64,
    /// Pixels-per-second multiplier for one zoom-out step.
    pub zoom_out_factor: f64,
    pub min_pixels_per_second: f64,
    pub max_pixels_per_second: f64,
    pub magnetic_snap: bool,
    pub default_bpm: f64,
    pub default_stem_count: StemCount,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            viewport_width_px: 800.0,
            zoom_in_factor: 1.2,
            zoom_out_factor: 0.8,
            min_pixels_per_second: 0.5,
            max_pixels_per_second: 2000.0,
            magnetic_snap: true,
            default_bpm: DEFAULT_BPM,
            default_stem_count: StemCount::Six,
        }
    }
}
