use std::sync::{Arc, Mutex, MutexGuard};

use stemtap_transport::{AudioRef, AudioTransport, TransportError};

#[derive(Debug, Default)]
pub struct MockState {
    pub position_secs: f64,
    pub duration_secs: f64,
    pub playing: bool,
    pub calls: Vec<String>,
    pub fail_load: bool,
    pub fail_play: bool,
    pub fail_pause: bool,
    pub fail_seek: bool,
}

/// Scripted transport. Clones share state, so a test keeps one handle
/// while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn with_duration(duration_secs: f64) -> Self {
        let mock = Self::default();
        mock.state().duration_secs = duration_secs;
        mock
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    pub fn set_position(&self, secs: f64) {
        self.state().position_secs = secs;
    }

    pub fn is_playing(&self) -> bool {
        self.state().playing
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

impl AudioTransport for MockTransport {
    fn load(&mut self, source: &AudioRef) -> Result<f64, TransportError> {
        let mut state = self.state();
        state.calls.push(format!("load:{}", source.uri));
        if state.fail_load {
            return Err(TransportError::Load {
                uri: source.uri.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        state.position_secs = 0.0;
        state.playing = false;
        Ok(state.duration_secs)
    }

    fn play(&mut self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.calls.push("play".to_string());
        if state.fail_play {
            return Err(TransportError::rejected("play", "scripted failure"));
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.calls.push("pause".to_string());
        if state.fail_pause {
            return Err(TransportError::rejected("pause", "scripted failure"));
        }
        state.playing = false;
        Ok(())
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), TransportError> {
        let mut state = self.state();
        state.calls.push(format!("seek:{seconds}"));
        if state.fail_seek {
            return Err(TransportError::rejected("seek", "scripted failure"));
        }
        state.position_secs = seconds;
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.state().position_secs
    }

    fn duration(&self) -> f64 {
        self.state().duration_secs
    }
}
