//! Background playback poll loop.
//!
//! While the engine is playing, a task samples the transport every
//! [`POLL_INTERVAL_MS`] and forwards a [`TickEvent`] for each update. The
//! task ends by itself once playback stops and is aborted whenever a command
//! stops playback first.

use std::sync::Arc;
use std::time::Duration;

use stemtap_core::PollOutcome;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::dto::{TickEvent, tick_event};
use crate::state::AppState;

pub const POLL_INTERVAL_MS: u64 = 50;

/// Spawn the poll task. Must be called from inside a tokio runtime.
pub fn start_poll_loop(state: Arc<AppState>, events: UnboundedSender<TickEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("poll loop started");
        let mut interval = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS));

        loop {
            interval.tick().await;

            // Skip this tick if a command holds the engine.
            let Some(mut engine) = state.try_engine() else {
                continue;
            };

            let outcome = engine.poll();
            if outcome != PollOutcome::Idle {
                let event = tick_event(&engine.snapshot());
                if events.send(event).is_err() {
                    break;
                }
            }
            if !engine.needs_polling() {
                break;
            }
        }
        tracing::debug!("poll loop stopped");
    })
}

/// Owner of the running poll task, if any.
#[derive(Debug, Default)]
pub struct PollLoop {
    handle: Option<JoinHandle<()>>,
}

impl PollLoop {
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start the task when playback needs polling, abort it otherwise.
    pub fn sync(&mut self, playing: bool, state: &Arc<AppState>, events: &UnboundedSender<TickEvent>) {
        if playing {
            if !self.is_running() {
                self.handle = Some(start_poll_loop(Arc::clone(state), events.clone()));
            }
        } else {
            self.stop();
        }
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock_transport::ClockTransport;
    use stemtap_core::{AudioRef, EngineConfig, MemoryStore, SyntheticPeaks, TimelineEngine};
    use tokio::sync::mpsc;

    fn state(duration_secs: f64) -> Arc<AppState> {
        let mut engine = TimelineEngine::new(
            EngineConfig::default(),
            Box::new(ClockTransport::with_duration(duration_secs)),
            Box::new(SyntheticPeaks),
            Box::new(MemoryStore::new()),
        );
        engine
            .load_song(AudioRef::new("file:///music/song.mp3", "song.mp3"))
            .expect("load");
        AppState::new(engine)
    }

    #[tokio::test]
    async fn test_loop_emits_ticks_while_playing() {
        let state = state(180.0);
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.engine().expect("lock").play().expect("play");

        let mut poll = PollLoop::default();
        poll.sync(true, &state, &tx);
        assert!(poll.is_running());

        let first = rx.recv().await.expect("tick");
        let second = rx.recv().await.expect("tick");
        assert!(second.current_ms >= first.current_ms);

        poll.sync(false, &state, &tx);
        assert!(!poll.is_running());
    }

    #[tokio::test]
    async fn test_loop_exits_at_end_of_track() {
        let state = state(0.15);
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.engine().expect("lock").play().expect("play");

        let handle = start_poll_loop(Arc::clone(&state), tx);
        handle.await.expect("poll task");

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        let last = last.expect("at least one tick");
        assert_eq!(last.current_ms, 150.0);
        assert!(!state.engine().expect("lock").needs_polling());
    }
}
