//! The visible time window.
//!
//! Every setter re-clamps from scratch so that repeated or slightly
//! reordered gesture events cannot push the window out of bounds:
//!
//! ```text
//! 0 <= start_ms <= song_duration_ms - duration_ms
//! min(MIN_VIEWPORT_DURATION_MS, song) <= duration_ms <= song_duration_ms
//! ```

/// Floor for the visible window length.
pub const MIN_VIEWPORT_DURATION_MS: f64 = 1000.0;

/// Fraction of the window at either side that triggers edge auto-scroll.
pub const EDGE_ZONE_RATIO: f64 = 0.10;

/// Largest edge auto-scroll nudge per drag update, as a fraction of the
/// window duration.
pub const EDGE_SCROLL_MAX_STEP_RATIO: f64 = 0.02;

/// Keyboard scroll step as a fraction of the window duration.
pub const SCROLL_STEP_RATIO: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    start_ms: f64,
    duration_ms: f64,
    is_locked: bool,
    width_px: f64,
    song_duration_ms: f64,
    min_pps: f64,
    max_pps: f64,
    /// Whether the playhead was inside the window at the last follow check.
    playhead_inside: bool,
}

impl Viewport {
    /// Window showing the whole song, locked to the playhead.
    pub fn new(song_duration_ms: f64, width_px: f64, min_pps: f64, max_pps: f64) -> Self {
        let min_pps = if min_pps.is_finite() && min_pps > 0.0 { min_pps } else { 0.5 };
        let max_pps = if max_pps.is_finite() && max_pps >= min_pps { max_pps } else { min_pps };
        let mut viewport = Self {
            start_ms: 0.0,
            duration_ms: MIN_VIEWPORT_DURATION_MS,
            is_locked: true,
            width_px: 1.0,
            song_duration_ms: MIN_VIEWPORT_DURATION_MS,
            min_pps,
            max_pps,
            playhead_inside: true,
        };
        viewport.set_width(width_px);
        viewport.set_song_duration(song_duration_ms);
        viewport.fit_to_song();
        viewport
    }

    pub fn start_ms(&self) -> f64 {
        self.start_ms
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn end_ms(&self) -> f64 {
        self.start_ms + self.duration_ms
    }

    pub fn width_px(&self) -> f64 {
        self.width_px
    }

    pub fn song_duration_ms(&self) -> f64 {
        self.song_duration_ms
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    pub fn pixels_per_second(&self) -> f64 {
        if self.duration_ms <= 0.0 {
            return 0.0;
        }
        self.width_px / (self.duration_ms / 1000.0)
    }

    pub fn pixels_per_ms(&self) -> f64 {
        self.pixels_per_second() / 1000.0
    }

    pub fn min_duration_ms(&self) -> f64 {
        MIN_VIEWPORT_DURATION_MS.min(self.song_duration_ms)
    }

    fn max_start(&self) -> f64 {
        (self.song_duration_ms - self.duration_ms).max(0.0)
    }

    /// Returns true when the start moved. NaN is ignored.
    pub fn set_start(&mut self, start_ms: f64) -> bool {
        if start_ms.is_nan() {
            return false;
        }
        let clamped = start_ms.max(0.0).min(self.max_start());
        let changed = clamped != self.start_ms;
        self.start_ms = clamped;
        changed
    }

    /// Returns true when the duration moved. The start is re-clamped against
    /// the new duration.
    pub fn set_duration(&mut self, duration_ms: f64) -> bool {
        if duration_ms.is_nan() {
            return false;
        }
        let clamped = duration_ms.max(self.min_duration_ms()).min(self.song_duration_ms);
        let changed = clamped != self.duration_ms;
        self.duration_ms = clamped;
        self.set_start(self.start_ms);
        changed
    }

    /// Set both bounds at once, duration first.
    pub fn set_range(&mut self, start_ms: f64, duration_ms: f64) -> bool {
        let resized = self.set_duration(duration_ms);
        let moved = self.set_start(start_ms);
        resized || moved
    }

    /// Ignores non-positive or non-finite durations.
    pub fn set_song_duration(&mut self, song_duration_ms: f64) -> bool {
        if !song_duration_ms.is_finite() || song_duration_ms <= 0.0 {
            return false;
        }
        self.song_duration_ms = song_duration_ms;
        self.set_duration(self.duration_ms);
        true
    }

    pub fn set_width(&mut self, width_px: f64) -> bool {
        if !width_px.is_finite() || width_px <= 0.0 {
            return false;
        }
        self.width_px = width_px;
        true
    }

    pub fn fit_to_song(&mut self) {
        self.duration_ms = self.song_duration_ms;
        self.start_ms = 0.0;
        self.is_locked = true;
    }

    pub fn lock(&mut self) {
        self.is_locked = true;
    }

    pub fn unlock(&mut self) {
        self.is_locked = false;
    }

    pub fn contains(&self, time_ms: f64) -> bool {
        time_ms >= self.start_ms && time_ms <= self.end_ms()
    }

    /// Scale pixels-per-second by `factor` around the window center.
    pub fn zoom(&mut self, factor: f64) -> bool {
        self.zoom_at(factor, self.start_ms + self.duration_ms / 2.0)
    }

    /// Scale pixels-per-second by `factor`, keeping `anchor_ms` at the same
    /// relative position in the window. The zoom level is clamped to the
    /// configured pixels-per-second range.
    pub fn zoom_at(&mut self, factor: f64, anchor_ms: f64) -> bool {
        if !factor.is_finite() || factor <= 0.0 {
            return false;
        }
        let anchor_ms = if anchor_ms.is_finite() {
            anchor_ms
        } else {
            self.start_ms + self.duration_ms / 2.0
        };
        let ratio = ((anchor_ms - self.start_ms) / self.duration_ms).max(0.0).min(1.0);

        let pps = (self.pixels_per_second() * factor)
            .max(self.min_pps)
            .min(self.max_pps);
        let before = (self.start_ms, self.duration_ms);
        self.set_duration(self.width_px / pps * 1000.0);
        self.set_start(anchor_ms - ratio * self.duration_ms);
        before != (self.start_ms, self.duration_ms)
    }

    /// Nudge the window while a cursor is dragged near its edges.
    ///
    /// Inside the outer [`EDGE_ZONE_RATIO`] on either side the window moves
    /// toward the cursor by up to [`EDGE_SCROLL_MAX_STEP_RATIO`] of its
    /// duration, scaled from 0.1x at the zone's inner border to 1x at the
    /// window edge and beyond.
    pub fn edge_auto_scroll(&mut self, playhead_ms: f64) -> bool {
        if !playhead_ms.is_finite() || self.duration_ms <= 0.0 {
            return false;
        }
        let rel = (playhead_ms - self.start_ms) / self.duration_ms;

        let (depth, sign) = if rel < EDGE_ZONE_RATIO {
            ((EDGE_ZONE_RATIO - rel) / EDGE_ZONE_RATIO, -1.0)
        } else if rel > 1.0 - EDGE_ZONE_RATIO {
            ((rel - (1.0 - EDGE_ZONE_RATIO)) / EDGE_ZONE_RATIO, 1.0)
        } else {
            return false;
        };

        let speed = 0.1 + 0.9 * depth.max(0.0).min(1.0);
        let step = self.duration_ms * EDGE_SCROLL_MAX_STEP_RATIO * speed;
        self.set_start(self.start_ms + sign * step)
    }

    /// Page the window to the playhead while locked and playing; re-arm the
    /// lock once the playhead enters an unlocked window during playback.
    pub fn follow_playhead(&mut self, current_ms: f64, is_playing: bool) -> bool {
        let inside = self.contains(current_ms);
        let mut changed = false;

        if is_playing {
            if self.is_locked && !inside {
                changed = self.set_start(current_ms);
            } else if !self.is_locked && inside && !self.playhead_inside {
                self.is_locked = true;
                changed = true;
            }
        }

        self.playhead_inside = self.contains(current_ms);
        changed
    }

    /// Move by `ratio` of the window duration. Manual scrolling unlocks.
    pub fn scroll_by_ratio(&mut self, ratio: f64) -> bool {
        self.unlock();
        self.set_start(self.start_ms + ratio * self.duration_ms)
    }

    /// Time under a pointer at `x_px` in the zoomed waveform.
    pub fn time_at_x(&self, x_px: f64) -> f64 {
        self.start_ms + (x_px / self.width_px) * self.duration_ms
    }

    pub fn x_at_time(&self, time_ms: f64) -> f64 {
        (time_ms - self.start_ms) / self.duration_ms * self.width_px
    }

    /// Time under a pointer at `x_px` in the whole-song overview strip.
    pub fn overview_time_at_x(&self, x_px: f64) -> f64 {
        x_px / self.width_px * self.song_duration_ms
    }

    pub fn overview_x_at_time(&self, time_ms: f64) -> f64 {
        time_ms / self.song_duration_ms * self.width_px
    }
}
