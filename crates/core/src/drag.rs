//! Drag sessions shared by playhead scrubbing and viewport gestures.
//!
//! Every drag is `begin -> update* -> end`, with a target deciding how a
//! pointer x coordinate maps to time:
//!
//! ```text
//! Playhead            zoomed waveform   x / width * duration + start
//! ViewportWindow      overview strip    x / width * song
//! ViewportEdge(_)     overview strip    x / width * song
//! ```

use crate::viewport::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragTarget {
    /// Scrub the playhead over the zoomed waveform.
    Playhead,
    /// Move the visible window in the overview strip.
    ViewportWindow,
    /// Resize the visible window from one side in the overview strip.
    ViewportEdge(Edge),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerMapping {
    Viewport,
    Overview,
}

impl DragTarget {
    pub fn mapping(&self) -> PointerMapping {
        match self {
            DragTarget::Playhead => PointerMapping::Viewport,
            DragTarget::ViewportWindow | DragTarget::ViewportEdge(_) => PointerMapping::Overview,
        }
    }

    pub fn time_at(&self, viewport: &Viewport, pointer_x: f64) -> f64 {
        match self.mapping() {
            PointerMapping::Viewport => viewport.time_at_x(pointer_x),
            PointerMapping::Overview => viewport.overview_time_at_x(pointer_x),
        }
    }
}

/// Identifies one drag; updates carrying an older handle are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DragHandle(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DragSession {
    pub handle: DragHandle,
    pub target: DragTarget,
    /// Pointer time minus window start at grab, for window drags.
    pub grab_offset_ms: f64,
    pub last_time_ms: f64,
}

impl DragSession {
    pub fn begin(handle: DragHandle, target: DragTarget, viewport: &Viewport, time_ms: f64) -> Self {
        let grab_offset_ms = match target {
            // Grabbing outside the window centers it on the pointer.
            DragTarget::ViewportWindow if !viewport.contains(time_ms) => viewport.duration_ms() / 2.0,
            DragTarget::ViewportWindow => time_ms - viewport.start_ms(),
            _ => 0.0,
        };
        Self {
            handle,
            target,
            grab_offset_ms,
            last_time_ms: time_ms,
        }
    }

    /// Apply a window or edge drag to the viewport. Playhead drags are
    /// handled by the engine.
    pub fn apply_to_viewport(&mut self, viewport: &mut Viewport, time_ms: f64) -> bool {
        if time_ms.is_nan() {
            return false;
        }
        self.last_time_ms = time_ms;

        match self.target {
            DragTarget::Playhead => false,
            DragTarget::ViewportWindow => viewport.set_start(time_ms - self.grab_offset_ms),
            DragTarget::ViewportEdge(Edge::Start) => {
                let end = viewport.end_ms();
                let start = time_ms.max(0.0).min(end - viewport.min_duration_ms());
                viewport.set_range(start, end - start)
            }
            DragTarget::ViewportEdge(Edge::End) => {
                let start = viewport.start_ms();
                let end = time_ms
                    .min(viewport.song_duration_ms())
                    .max(start + viewport.min_duration_ms());
                viewport.set_range(start, end - start)
            }
        }
    }
}
