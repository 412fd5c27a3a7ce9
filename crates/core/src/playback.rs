use stemtap_transport::{AudioRef, AudioTransport, TransportError, ms_to_secs, secs_to_ms};

/// Distance from the end at which playback counts as finished.
pub const END_OF_TRACK_TOLERANCE_MS: f64 = 100.0;

/// Song length assumed before any audio is loaded.
pub const DEFAULT_SONG_DURATION_MS: f64 = 180_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    /// Playhead held by a drag; the device is paused.
    Scrubbing,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopRegion {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl LoopRegion {
    /// `None` unless `end_ms > start_ms`.
    pub fn new(start_ms: f64, end_ms: f64) -> Option<Self> {
        (start_ms.is_finite() && end_ms.is_finite() && end_ms > start_ms)
            .then_some(Self { start_ms, end_ms })
    }

    pub fn contains(&self, time_ms: f64) -> bool {
        time_ms >= self.start_ms && time_ms < self.end_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayOutcome {
    /// Nothing to do: no song, or already playing.
    Ignored,
    Started,
    /// Started over from 0 because the playhead sat at the end.
    Restarted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollOutcome {
    Idle,
    Advanced(f64),
    /// Jumped back to the given time (loop region or repeat).
    Looped(f64),
    /// Reached the end of the track and stopped.
    Ended,
}

/// Play/pause/scrub state machine in front of an [`AudioTransport`].
///
/// All device calls are made in sequence from `&mut self`. A failed play,
/// pause, seek or load leaves the controller in its pre-call state.
pub struct TransportController {
    transport: Box<dyn AudioTransport>,
    state: PlaybackState,
    current_ms: f64,
    ghost_ms: Option<f64>,
    song_duration_ms: f64,
    song_loaded: bool,
    resume_after_scrub: bool,
    repeat: bool,
    loop_region: Option<LoopRegion>,
}

impl TransportController {
    pub fn new(transport: Box<dyn AudioTransport>) -> Self {
        Self {
            transport,
            state: PlaybackState::Stopped,
            current_ms: 0.0,
            ghost_ms: None,
            song_duration_ms: DEFAULT_SONG_DURATION_MS,
            song_loaded: false,
            resume_after_scrub: false,
            repeat: false,
            loop_region: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn needs_polling(&self) -> bool {
        self.state.is_playing()
    }

    pub fn current_ms(&self) -> f64 {
        self.current_ms
    }

    /// Device position while playing, otherwise the stored playhead.
    /// Used where the last poll sample is too coarse, e.g. tapping a marker.
    pub fn live_position_ms(&self) -> f64 {
        if !self.state.is_playing() {
            return self.current_ms;
        }
        let reported = secs_to_ms(self.transport.current_time());
        if reported.is_finite() {
            self.clamp_time(reported)
        } else {
            self.current_ms
        }
    }

    pub fn ghost_ms(&self) -> Option<f64> {
        self.ghost_ms
    }

    pub fn song_duration_ms(&self) -> f64 {
        self.song_duration_ms
    }

    pub fn song_loaded(&self) -> bool {
        self.song_loaded
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn loop_region(&self) -> Option<LoopRegion> {
        self.loop_region
    }

    pub fn set_loop_region(&mut self, region: Option<LoopRegion>) {
        self.loop_region = region;
    }

    pub fn resume_after_scrub(&self) -> bool {
        self.resume_after_scrub
    }

    /// Only meaningful while scrubbing.
    pub fn set_resume_after_scrub(&mut self, resume: bool) {
        if self.state == PlaybackState::Scrubbing {
            self.resume_after_scrub = resume;
        }
    }

    fn clamp_time(&self, time_ms: f64) -> f64 {
        time_ms.max(0.0).min(self.song_duration_ms)
    }

    pub fn at_end_of_track(&self, time_ms: f64) -> bool {
        time_ms >= self.song_duration_ms - END_OF_TRACK_TOLERANCE_MS
    }

    /// Load a song into the device. Returns its duration in milliseconds.
    ///
    /// When the device rejects the file the current song stays loaded, only
    /// paused.
    pub fn load(&mut self, source: &AudioRef) -> Result<f64, TransportError> {
        if self.state.is_playing() {
            match self.transport.pause() {
                Ok(()) => {
                    self.settle_position();
                    self.state = PlaybackState::Stopped;
                }
                Err(e) => tracing::warn!(error = %e, "pause before load failed"),
            }
        }

        let duration_ms = secs_to_ms(self.transport.load(source)?);
        if !duration_ms.is_finite() || duration_ms <= 0.0 {
            // The device replaced the old song with something unplayable.
            self.unload();
            return Err(TransportError::Load {
                uri: source.uri.clone(),
                reason: "transport reported no duration".to_string(),
            });
        }

        self.reset_playhead();
        self.song_duration_ms = duration_ms;
        self.song_loaded = true;
        tracing::info!(uri = %source.uri, duration_ms, "song loaded");
        Ok(duration_ms)
    }

    /// Forget the current song. The device is paused if it was playing and
    /// song-dependent commands become no-ops until the next load.
    pub fn unload(&mut self) {
        if self.state.is_playing() {
            if let Err(e) = self.transport.pause() {
                tracing::warn!(error = %e, "pause before unload failed");
            }
        }
        self.reset_playhead();
        self.song_loaded = false;
    }

    fn reset_playhead(&mut self) {
        self.state = PlaybackState::Stopped;
        self.resume_after_scrub = false;
        self.current_ms = 0.0;
        self.ghost_ms = None;
        self.loop_region = None;
    }

    /// Set the song length without audio, e.g. from a project whose audio
    /// could not be opened.
    pub fn set_song_duration(&mut self, duration_ms: f64) {
        if duration_ms.is_finite() && duration_ms > 0.0 {
            self.song_duration_ms = duration_ms;
            self.current_ms = self.clamp_time(self.current_ms);
            self.ghost_ms = self.ghost_ms.map(|g| self.clamp_time(g));
        }
    }

    pub fn play(&mut self) -> Result<PlayOutcome, TransportError> {
        match self.state {
            PlaybackState::Playing => return Ok(PlayOutcome::Ignored),
            PlaybackState::Scrubbing => {
                self.resume_after_scrub = true;
                return Ok(PlayOutcome::Ignored);
            }
            PlaybackState::Stopped => {}
        }
        if !self.song_loaded {
            return Ok(PlayOutcome::Ignored);
        }

        let restart = self.at_end_of_track(self.current_ms);
        if restart {
            self.transport.seek_to(0.0)?;
            // The device is at 0 now, even if play fails below.
            self.current_ms = 0.0;
        }

        self.transport.play()?;

        self.state = PlaybackState::Playing;
        Ok(if restart {
            PlayOutcome::Restarted
        } else {
            PlayOutcome::Started
        })
    }

    /// Returns false when there was nothing to pause.
    pub fn pause(&mut self) -> Result<bool, TransportError> {
        match self.state {
            PlaybackState::Stopped => Ok(false),
            PlaybackState::Scrubbing => {
                let was_armed = self.resume_after_scrub;
                self.resume_after_scrub = false;
                Ok(was_armed)
            }
            PlaybackState::Playing => {
                self.transport.pause()?;
                self.settle_position();
                self.state = PlaybackState::Stopped;
                Ok(true)
            }
        }
    }

    fn settle_position(&mut self) {
        let reported = secs_to_ms(self.transport.current_time());
        if reported.is_finite() {
            self.current_ms = self.clamp_time(reported);
        }
    }

    /// Move the playhead. Clamped to the song; the device keeps its
    /// play/pause state across the seek. Returns false when ignored.
    pub fn seek_to(&mut self, time_ms: f64) -> Result<bool, TransportError> {
        if !self.song_loaded || time_ms.is_nan() {
            return Ok(false);
        }
        let target = self.clamp_time(time_ms);

        if self.state == PlaybackState::Scrubbing {
            // Committed by end_scrub.
            self.current_ms = target;
            return Ok(true);
        }

        self.transport.seek_to(ms_to_secs(target))?;
        self.current_ms = target;
        Ok(true)
    }

    pub fn set_ghost(&mut self, ghost_ms: Option<f64>) {
        self.ghost_ms = ghost_ms
            .filter(|g| !g.is_nan())
            .map(|g| self.clamp_time(g));
    }

    /// Take the playhead for a drag. Pauses the device if it was playing and
    /// remembers to resume. A repeated call, or a call without a song, is a
    /// no-op.
    pub fn begin_scrub(&mut self) -> Result<bool, TransportError> {
        if !self.song_loaded {
            return Ok(false);
        }
        match self.state {
            PlaybackState::Scrubbing => Ok(false),
            PlaybackState::Playing => {
                self.transport.pause()?;
                self.settle_position();
                self.resume_after_scrub = true;
                self.state = PlaybackState::Scrubbing;
                Ok(true)
            }
            PlaybackState::Stopped => {
                self.resume_after_scrub = false;
                self.state = PlaybackState::Scrubbing;
                Ok(true)
            }
        }
    }

    /// Move the scrub position without touching the device.
    pub fn update_scrub(&mut self, time_ms: f64) -> bool {
        if self.state != PlaybackState::Scrubbing || time_ms.is_nan() {
            return false;
        }
        self.current_ms = self.clamp_time(time_ms);
        true
    }

    /// Release the playhead: seek the device to the last scrub position and
    /// resume if playback was interrupted. Any failure leaves the controller
    /// stopped.
    pub fn end_scrub(&mut self) -> Result<PlaybackState, TransportError> {
        if self.state != PlaybackState::Scrubbing {
            return Ok(self.state);
        }
        let resume = std::mem::take(&mut self.resume_after_scrub);
        self.state = PlaybackState::Stopped;

        if !self.song_loaded {
            return Ok(self.state);
        }

        self.transport.seek_to(ms_to_secs(self.current_ms))?;
        if resume {
            self.transport.play()?;
            self.state = PlaybackState::Playing;
        }
        Ok(self.state)
    }

    /// Sample the device position while playing. Handles the loop region,
    /// repeat and end-of-track auto-pause.
    pub fn poll(&mut self) -> PollOutcome {
        if self.state != PlaybackState::Playing {
            return PollOutcome::Idle;
        }
        let reported = secs_to_ms(self.transport.current_time());
        if !reported.is_finite() {
            return PollOutcome::Idle;
        }
        let time_ms = self.clamp_time(reported);
        let at_end = self.at_end_of_track(time_ms);

        let loop_start = self
            .loop_region
            .filter(|region| time_ms >= region.end_ms || at_end)
            .map(|region| region.start_ms);
        if let Some(start_ms) = loop_start {
            match self.transport.seek_to(ms_to_secs(start_ms)) {
                Ok(()) => {
                    self.current_ms = start_ms;
                    return PollOutcome::Looped(start_ms);
                }
                Err(e) => tracing::warn!(error = %e, "loop seek failed"),
            }
        }

        if !at_end {
            self.current_ms = time_ms;
            return PollOutcome::Advanced(time_ms);
        }

        if self.repeat {
            match self.transport.seek_to(0.0) {
                Ok(()) => {
                    self.current_ms = 0.0;
                    return PollOutcome::Looped(0.0);
                }
                Err(e) => tracing::warn!(error = %e, "repeat seek failed"),
            }
        }

        if let Err(e) = self.transport.pause() {
            tracing::warn!(error = %e, "pause at end of track failed");
        }
        self.current_ms = self.song_duration_ms;
        self.state = PlaybackState::Stopped;
        tracing::debug!(duration_ms = self.song_duration_ms, "end of track");
        PollOutcome::Ended
    }
}

impl std::fmt::Debug for TransportController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportController")
            .field("state", &self.state)
            .field("current_ms", &self.current_ms)
            .field("ghost_ms", &self.ghost_ms)
            .field("song_duration_ms", &self.song_duration_ms)
            .field("song_loaded", &self.song_loaded)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    fn loaded(duration_secs: f64) -> (TransportController, MockTransport) {
        let mock = MockTransport::with_duration(duration_secs);
        let mut controller = TransportController::new(Box::new(mock.clone()));
        controller
            .load(&AudioRef::new("file:///song.mp3", "song.mp3"))
            .expect("load");
        mock.clear_calls();
        (controller, mock)
    }

    #[test]
    fn test_defaults_before_load() {
        let controller = TransportController::new(Box::new(MockTransport::default()));
        assert_eq!(controller.song_duration_ms(), DEFAULT_SONG_DURATION_MS);
        assert!(!controller.song_loaded());
        assert_eq!(controller.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_commands_without_song_are_noops() {
        let mock = MockTransport::default();
        let mut controller = TransportController::new(Box::new(mock.clone()));

        assert_eq!(controller.play(), Ok(PlayOutcome::Ignored));
        assert_eq!(controller.seek_to(1000.0), Ok(false));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_load_rejects_zero_duration() {
        let mock = MockTransport::with_duration(0.0);
        let mut controller = TransportController::new(Box::new(mock));
        let result = controller.load(&AudioRef::new("x", "x"));
        assert!(matches!(result, Err(TransportError::Load { .. })));
        assert!(!controller.song_loaded());
    }

    #[test]
    fn test_play_pause() {
        let (mut controller, mock) = loaded(180.0);

        assert_eq!(controller.play(), Ok(PlayOutcome::Started));
        assert!(controller.is_playing());
        assert_eq!(controller.play(), Ok(PlayOutcome::Ignored));

        mock.set_position(12.5);
        assert_eq!(controller.pause(), Ok(true));
        assert_eq!(controller.current_ms(), 12_500.0);
        assert_eq!(controller.pause(), Ok(false));
        assert_eq!(mock.calls(), vec!["play", "pause"]);
    }

    #[test]
    fn test_play_failure_rolls_back() {
        let (mut controller, mock) = loaded(180.0);
        controller.seek_to(42_000.0).expect("seek");
        mock.state().fail_play = true;

        assert!(controller.play().is_err());
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(controller.current_ms(), 42_000.0);
    }

    #[test]
    fn test_failed_restart_keeps_device_position() {
        let (mut controller, mock) = loaded(180.0);
        controller.seek_to(179_950.0).expect("seek");
        mock.state().fail_play = true;

        assert!(controller.play().is_err());
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(controller.current_ms(), 0.0);
        assert_eq!(mock.state().position_secs, 0.0);
    }

    #[test]
    fn test_failed_load_keeps_current_song() {
        let (mut controller, mock) = loaded(180.0);
        controller.play().expect("play");
        mock.set_position(5.0);
        mock.state().fail_load = true;

        assert!(controller.load(&AudioRef::new("file:///other.mp3", "other.mp3")).is_err());
        assert!(controller.song_loaded());
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(controller.current_ms(), 5_000.0);
        assert_eq!(controller.song_duration_ms(), 180_000.0);
        assert_eq!(controller.seek_to(7_000.0), Ok(true));
    }

    #[test]
    fn test_unload_pauses_and_ignores_commands() {
        let (mut controller, mock) = loaded(180.0);
        controller.play().expect("play");
        controller.unload();

        assert!(!controller.song_loaded());
        assert!(!mock.is_playing());
        assert_eq!(controller.play(), Ok(PlayOutcome::Ignored));
        assert_eq!(mock.calls(), vec!["play", "pause"]);
    }

    #[test]
    fn test_scrub_without_song_is_ignored() {
        let mock = MockTransport::default();
        let mut controller = TransportController::new(Box::new(mock.clone()));

        assert_eq!(controller.begin_scrub(), Ok(false));
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(!controller.update_scrub(9_000.0));
        assert_eq!(controller.current_ms(), 0.0);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_pause_failure_keeps_playing() {
        let (mut controller, mock) = loaded(180.0);
        controller.play().expect("play");
        mock.state().fail_pause = true;

        assert!(controller.pause().is_err());
        assert!(controller.is_playing());
    }

    #[test]
    fn test_play_at_end_restarts_from_zero() {
        let (mut controller, mock) = loaded(180.0);
        controller.seek_to(179_950.0).expect("seek");
        mock.clear_calls();

        assert_eq!(controller.play(), Ok(PlayOutcome::Restarted));
        assert_eq!(controller.current_ms(), 0.0);
        assert_eq!(mock.calls(), vec!["seek:0", "play"]);
    }

    #[test]
    fn test_seek_clamps_and_keeps_playing() {
        let (mut controller, mock) = loaded(180.0);
        controller.play().expect("play");

        controller.seek_to(-50.0).expect("seek");
        assert_eq!(controller.current_ms(), 0.0);
        controller.seek_to(500_000.0).expect("seek");
        assert_eq!(controller.current_ms(), 180_000.0);
        assert!(controller.is_playing());
        assert!(mock.is_playing());
    }

    #[test]
    fn test_seek_failure_keeps_position() {
        let (mut controller, mock) = loaded(180.0);
        controller.seek_to(1000.0).expect("seek");
        mock.state().fail_seek = true;

        assert!(controller.seek_to(5000.0).is_err());
        assert_eq!(controller.current_ms(), 1000.0);
    }

    #[test]
    fn test_scrub_while_playing_resumes() {
        let (mut controller, mock) = loaded(180.0);
        controller.play().expect("play");
        mock.set_position(10.0);

        assert_eq!(controller.begin_scrub(), Ok(true));
        assert_eq!(controller.begin_scrub(), Ok(false));
        assert!(!mock.is_playing());

        controller.update_scrub(42_000.0);
        controller.update_scrub(43_000.0);
        assert_eq!(controller.end_scrub(), Ok(PlaybackState::Playing));

        assert_eq!(mock.calls(), vec!["play", "pause", "seek:43", "play"]);
        assert_eq!(controller.current_ms(), 43_000.0);
    }

    #[test]
    fn test_scrub_while_stopped_stays_stopped() {
        let (mut controller, mock) = loaded(180.0);

        controller.begin_scrub().expect("begin");
        controller.update_scrub(5_000.0);
        assert_eq!(controller.end_scrub(), Ok(PlaybackState::Stopped));
        assert_eq!(mock.calls(), vec!["seek:5"]);
    }

    #[test]
    fn test_toggle_during_scrub_flips_resume() {
        let (mut controller, _mock) = loaded(180.0);
        controller.begin_scrub().expect("begin");

        assert_eq!(controller.play(), Ok(PlayOutcome::Ignored));
        assert!(controller.resume_after_scrub());
        assert_eq!(controller.pause(), Ok(true));
        assert!(!controller.resume_after_scrub());
    }

    #[test]
    fn test_end_scrub_failure_stops() {
        let (mut controller, mock) = loaded(180.0);
        controller.play().expect("play");
        controller.begin_scrub().expect("begin");
        mock.state().fail_play = true;

        assert!(controller.end_scrub().is_err());
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(!controller.needs_polling());
    }

    #[test]
    fn test_seek_during_scrub_defers_to_end() {
        let (mut controller, mock) = loaded(180.0);
        controller.begin_scrub().expect("begin");
        controller.seek_to(7_000.0).expect("seek");
        assert!(mock.calls().is_empty());
        controller.end_scrub().expect("end");
        assert_eq!(mock.calls(), vec!["seek:7"]);
    }

    #[test]
    fn test_poll_advances_only_while_playing() {
        let (mut controller, mock) = loaded(180.0);
        mock.set_position(3.0);
        assert_eq!(controller.poll(), PollOutcome::Idle);

        controller.play().expect("play");
        assert_eq!(controller.poll(), PollOutcome::Advanced(3000.0));
        assert_eq!(controller.current_ms(), 3000.0);
    }

    #[test]
    fn test_poll_end_of_track_snaps_and_stops() {
        let (mut controller, mock) = loaded(180.0);
        controller.play().expect("play");

        mock.set_position(179.95);
        assert_eq!(controller.poll(), PollOutcome::Ended);
        assert_eq!(controller.current_ms(), 180_000.0);
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(!mock.is_playing());
        assert_eq!(controller.poll(), PollOutcome::Idle);
    }

    #[test]
    fn test_poll_end_of_track_stops_even_if_pause_fails() {
        let (mut controller, mock) = loaded(180.0);
        controller.play().expect("play");
        mock.state().fail_pause = true;

        mock.set_position(180.0);
        assert_eq!(controller.poll(), PollOutcome::Ended);
        assert!(!controller.needs_polling());
    }

    #[test]
    fn test_repeat_restarts_at_end() {
        let (mut controller, mock) = loaded(180.0);
        controller.set_repeat(true);
        controller.play().expect("play");

        mock.set_position(179.99);
        assert_eq!(controller.poll(), PollOutcome::Looped(0.0));
        assert!(controller.is_playing());
        assert_eq!(mock.state().position_secs, 0.0);
    }

    #[test]
    fn test_loop_region_takes_priority() {
        let (mut controller, mock) = loaded(180.0);
        controller.set_repeat(true);
        controller.set_loop_region(LoopRegion::new(10_000.0, 20_000.0));
        controller.play().expect("play");

        mock.set_position(15.0);
        assert_eq!(controller.poll(), PollOutcome::Advanced(15_000.0));
        mock.set_position(20.0);
        assert_eq!(controller.poll(), PollOutcome::Looped(10_000.0));
        assert_eq!(controller.current_ms(), 10_000.0);
    }

    #[test]
    fn test_loop_region_requires_order() {
        assert!(LoopRegion::new(5.0, 5.0).is_none());
        assert!(LoopRegion::new(5.0, 1.0).is_none());
        assert!(LoopRegion::new(1.0, 5.0).is_some_and(|r| r.contains(1.0) && !r.contains(5.0)));
    }

    #[test]
    fn test_ghost_is_clamped_and_independent() {
        let (mut controller, _mock) = loaded(180.0);
        controller.set_ghost(Some(-10.0));
        assert_eq!(controller.ghost_ms(), Some(0.0));
        controller.set_ghost(Some(200_000.0));
        assert_eq!(controller.ghost_ms(), Some(180_000.0));
        assert_eq!(controller.current_ms(), 0.0);
        controller.set_ghost(None);
        assert_eq!(controller.ghost_ms(), None);
    }
}
