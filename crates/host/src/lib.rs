//! Headless host for the stemtap timeline engine.
//!
//! Wires the engine to a wall-clock transport, decoded peaks and a project
//! directory, and exposes it as text commands with JSON snapshots.

pub mod clock_transport;
pub mod commands;
pub mod config;
pub mod dto;
pub mod keybindings;
pub mod poll;
pub mod state;

pub use clock_transport::ClockTransport;
pub use commands::{Command, Reply, dispatch};
pub use config::Config;
pub use keybindings::Keymap;
pub use poll::{POLL_INTERVAL_MS, PollLoop};
pub use state::AppState;
