//! Wall-clock stand-in for an audio device.

use std::time::Instant;

use stemtap_decode::{probe_duration_secs, resolve_audio_path};
use stemtap_transport::{AudioRef, AudioTransport, TransportError};

/// Transport whose position advances with real time while playing.
///
/// Song length comes from probing the audio file, or from a fixed duration
/// when built with [`ClockTransport::with_duration`].
#[derive(Debug, Default)]
pub struct ClockTransport {
    fixed_duration_secs: Option<f64>,
    duration_secs: f64,
    /// Position at the last play/pause/seek.
    offset_secs: f64,
    /// Set while playing.
    started: Option<Instant>,
    loaded: bool,
}

impl ClockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every load reports `duration_secs` without touching the filesystem.
    pub fn with_duration(duration_secs: f64) -> Self {
        Self {
            fixed_duration_secs: Some(duration_secs),
            ..Self::default()
        }
    }

    pub fn is_playing(&self) -> bool {
        self.started.is_some()
    }

    fn position(&self) -> f64 {
        let elapsed = self
            .started
            .map(|start| start.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (self.offset_secs + elapsed).min(self.duration_secs)
    }

    fn ensure_loaded(&self, operation: &'static str) -> Result<(), TransportError> {
        if self.loaded {
            Ok(())
        } else {
            Err(TransportError::rejected(operation, "no audio loaded"))
        }
    }

    fn probe(source: &AudioRef) -> Result<f64, TransportError> {
        let load_error = |reason: String| TransportError::Load {
            uri: source.uri.clone(),
            reason,
        };
        let path = resolve_audio_path(source).ok_or_else(|| load_error("file not found".to_string()))?;
        probe_duration_secs(&path).map_err(|e| load_error(e.to_string()))
    }
}

impl AudioTransport for ClockTransport {
    fn load(&mut self, source: &AudioRef) -> Result<f64, TransportError> {
        let duration_secs = match self.fixed_duration_secs {
            Some(secs) => secs,
            None => Self::probe(source)?,
        };

        self.duration_secs = duration_secs;
        self.offset_secs = 0.0;
        self.started = None;
        self.loaded = true;
        Ok(duration_secs)
    }

    fn play(&mut self) -> Result<(), TransportError> {
        self.ensure_loaded("play")?;
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), TransportError> {
        self.offset_secs = self.position();
        self.started = None;
        Ok(())
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), TransportError> {
        self.ensure_loaded("seek")?;
        if !seconds.is_finite() {
            return Err(TransportError::rejected("seek", "non-finite position"));
        }
        self.offset_secs = seconds.max(0.0).min(self.duration_secs);
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.position()
    }

    fn duration(&self) -> f64 {
        self.duration_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn source() -> AudioRef {
        AudioRef::new("file:///music/song.mp3", "song.mp3")
    }

    #[test]
    fn test_requires_load() {
        let mut transport = ClockTransport::with_duration(10.0);
        assert!(transport.play().is_err());
        assert!(transport.seek_to(1.0).is_err());

        assert_eq!(transport.load(&source()), Ok(10.0));
        assert!(transport.play().is_ok());
    }

    #[test]
    fn test_advances_only_while_playing() {
        let mut transport = ClockTransport::with_duration(10.0);
        transport.load(&source()).expect("load");

        thread::sleep(Duration::from_millis(20));
        assert_eq!(transport.current_time(), 0.0);

        transport.play().expect("play");
        thread::sleep(Duration::from_millis(30));
        transport.pause().expect("pause");
        let paused_at = transport.current_time();
        assert!(paused_at >= 0.03);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(transport.current_time(), paused_at);
    }

    #[test]
    fn test_seek_clamps_and_keeps_state() {
        let mut transport = ClockTransport::with_duration(10.0);
        transport.load(&source()).expect("load");

        transport.seek_to(25.0).expect("seek");
        assert_eq!(transport.current_time(), 10.0);

        transport.play().expect("play");
        transport.seek_to(4.0).expect("seek");
        assert!(transport.is_playing());
        assert!(transport.current_time() >= 4.0);
        assert!(transport.seek_to(f64::NAN).is_err());
    }

    #[test]
    fn test_missing_file_fails_to_load() {
        let mut transport = ClockTransport::new();
        let result = transport.load(&AudioRef::new("file:///nonexistent/a.wav", "a.wav"));
        assert!(matches!(result, Err(TransportError::Load { .. })));
    }
}
