//! `stemtap`: line-driven timeline host.
//!
//! Reads one command per line from stdin (`play`, `tap`, `seek 5000`, or
//! `key <chord>` to go through the keymap) and prints a JSON response with
//! the engine snapshot. While playing, poll ticks are printed as
//! `{"tick": ...}` lines in between.

use anyhow::anyhow;
use serde::Serialize;
use stemtap_host::dto::{ResponseDto, TickEvent, snapshot_to_dto};
use stemtap_host::{AppState, Command, Config, Keymap, PollLoop, Reply, dispatch};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Serialize)]
struct TickLine<'a> {
    tick: &'a TickEvent,
}

fn resolve(keymap: &Keymap, line: &str) -> anyhow::Result<Command> {
    match line.strip_prefix("key ") {
        Some(chord) => keymap
            .lookup(chord)
            .cloned()
            .ok_or_else(|| anyhow!("no binding for '{}'", chord.trim())),
        None => line.parse(),
    }
}

async fn write_json(stdout: &mut Stdout, value: &impl Serialize) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    stdout.write_all(&line).await?;
    stdout.flush().await?;
    Ok(())
}

/// Run one input line. The flag is false once the host should exit.
fn handle_line(state: &AppState, keymap: &Keymap, line: &str) -> anyhow::Result<(ResponseDto, bool)> {
    let mut engine = state.engine()?;
    let mut response = ResponseDto {
        ok: true,
        error: None,
        projects: None,
        import: None,
        snapshot: snapshot_to_dto(&engine.snapshot()),
    };

    let result = resolve(keymap, line).and_then(|command| dispatch(&mut engine, command));
    let keep_running = match result {
        Ok(Reply::Done) => true,
        Ok(Reply::Projects(keys)) => {
            response.projects = Some(keys);
            true
        }
        Ok(Reply::Imported(summary)) => {
            response.import = Some(summary.into());
            true
        }
        Ok(Reply::Quit) => false,
        Err(e) => {
            tracing::debug!(line, error = %e, "command failed");
            response.ok = false;
            response.error = Some(format!("{e:#}"));
            true
        }
    };

    response.snapshot = snapshot_to_dto(&engine.snapshot());
    Ok((response, keep_running))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    let keymap = Keymap::new(&config.keybindings);
    let state = AppState::from_config(&config);
    tracing::info!(bindings = keymap.len(), "stemtap ready");

    let (tx, mut rx) = mpsc::unbounded_channel::<TickEvent>();
    let mut poll = PollLoop::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let (response, keep_running) = handle_line(&state, &keymap, line)?;
                let playing = state.engine()?.needs_polling();
                poll.sync(playing, &state, &tx);
                write_json(&mut stdout, &response).await?;

                if !keep_running {
                    break;
                }
            }
            Some(event) = rx.recv() => {
                write_json(&mut stdout, &TickLine { tick: &event }).await?;
            }
        }
    }

    poll.stop();
    tracing::info!("stemtap exiting");
    Ok(())
}
