//! Host commands and their mapping onto the engine.
//!
//! Commands arrive as text, either typed directly or resolved from a key
//! chord, and each maps to one [`TimelineEngine`] call.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, anyhow, bail};
use stemtap_core::{
    AudioRef, Direction, ImportSummary, LayerId, StemCount, TimelineEngine, ViewMode, ZoomDirection,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Transport
    TogglePlayback,
    Play,
    Pause,
    Seek(f64),
    Ghost(Option<f64>),
    SkipToStart,
    SkipToEnd,
    ToggleRepeat,
    ToggleLoopMarkers,
    // Markers
    TapMarker,
    ToggleMarkerAt { layer: LayerId, timestamp_ms: u64 },
    RemoveMarker { layer: LayerId, timestamp_ms: u64 },
    UndoMarker,
    RedoMarker,
    Navigate(Direction),
    Annotate { layer: LayerId, timestamp_ms: u64, text: String },
    SetActiveLayer(LayerId),
    ToggleVisibility(LayerId),
    ClearLayer(LayerId),
    ClearAll,
    SetStemCount(StemCount),
    // Viewport and settings
    Zoom(ZoomDirection),
    ScrollLeft,
    ScrollRight,
    FitViewport,
    SetWidth(f64),
    SetBpm(f64),
    SetSnap(bool),
    SetGridLines(bool),
    SetViewMode(ViewMode),
    SetLayerNavigation(bool),
    // Song and projects
    LoadSong(String),
    SaveProject(String),
    LoadProject(String),
    DeleteProject(String),
    ListProjects,
    ImportCsv(String),
    State,
    Quit,
}

/// What a dispatched command produced besides the state change.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Done,
    Projects(Vec<String>),
    Imported(ImportSummary),
    Quit,
}

fn arg<'a>(parts: &mut impl Iterator<Item = &'a str>, name: &str) -> anyhow::Result<&'a str> {
    parts.next().ok_or_else(|| anyhow!("missing {name}"))
}

fn parse_arg<'a, T>(parts: &mut impl Iterator<Item = &'a str>, name: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = arg(parts, name)?;
    raw.parse()
        .map_err(|e| anyhow!("invalid {name} '{raw}': {e}"))
}

fn parse_switch<'a>(parts: &mut impl Iterator<Item = &'a str>) -> anyhow::Result<bool> {
    match arg(parts, "on/off")? {
        "on" | "true" => Ok(true),
        "off" | "false" => Ok(false),
        other => bail!("expected on or off, got '{other}'"),
    }
}

fn parse_stem_count<'a>(parts: &mut impl Iterator<Item = &'a str>) -> anyhow::Result<StemCount> {
    let count: u8 = parse_arg(parts, "stem count")?;
    Ok(StemCount::try_from(count)?)
}

fn rest(parts: impl Iterator<Item = impl AsRef<str>>) -> String {
    parts
        .map(|p| p.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or_else(|| anyhow!("empty command"))?;

        let command = match name.to_ascii_lowercase().as_str() {
            "toggle" | "play-pause" => Command::TogglePlayback,
            "play" => Command::Play,
            "pause" => Command::Pause,
            "seek" => Command::Seek(parse_arg(&mut parts, "time")?),
            "ghost" => match arg(&mut parts, "time")? {
                "off" => Command::Ghost(None),
                raw => Command::Ghost(Some(
                    raw.parse().map_err(|e| anyhow!("invalid time '{raw}': {e}"))?,
                )),
            },
            "start" => Command::SkipToStart,
            "end" => Command::SkipToEnd,
            "repeat" => Command::ToggleRepeat,
            "loop" => Command::ToggleLoopMarkers,

            "tap" => Command::TapMarker,
            "tap-at" => Command::ToggleMarkerAt {
                layer: parse_arg(&mut parts, "layer")?,
                timestamp_ms: parse_arg(&mut parts, "time")?,
            },
            "remove" => Command::RemoveMarker {
                layer: parse_arg(&mut parts, "layer")?,
                timestamp_ms: parse_arg(&mut parts, "time")?,
            },
            "undo" => Command::UndoMarker,
            "redo" => Command::RedoMarker,
            "prev" => Command::Navigate(Direction::Left),
            "next" => Command::Navigate(Direction::Right),
            "annotate" => Command::Annotate {
                layer: parse_arg(&mut parts, "layer")?,
                timestamp_ms: parse_arg(&mut parts, "time")?,
                text: rest(&mut parts),
            },
            "layer" => Command::SetActiveLayer(parse_arg(&mut parts, "layer")?),
            "hide" | "show" | "toggle-layer" => {
                Command::ToggleVisibility(parse_arg(&mut parts, "layer")?)
            }
            "clear-layer" => Command::ClearLayer(parse_arg(&mut parts, "layer")?),
            "clear-all" => Command::ClearAll,
            "stems" => Command::SetStemCount(parse_stem_count(&mut parts)?),

            "zoom-in" => Command::Zoom(ZoomDirection::In),
            "zoom-out" => Command::Zoom(ZoomDirection::Out),
            "scroll-left" => Command::ScrollLeft,
            "scroll-right" => Command::ScrollRight,
            "fit" => Command::FitViewport,
            "width" => Command::SetWidth(parse_arg(&mut parts, "width")?),
            "bpm" => Command::SetBpm(parse_arg(&mut parts, "bpm")?),
            "snap" => Command::SetSnap(parse_switch(&mut parts)?),
            "grid" => Command::SetGridLines(parse_switch(&mut parts)?),
            "view" => Command::SetViewMode(match arg(&mut parts, "view mode")? {
                "combined" => ViewMode::Combined,
                "split" => ViewMode::Split,
                other => bail!("unknown view mode '{other}'"),
            }),
            "layer-nav" => Command::SetLayerNavigation(parse_switch(&mut parts)?),

            "load" => Command::LoadSong(rest(&mut parts)),
            "save" => Command::SaveProject(arg(&mut parts, "project key")?.to_string()),
            "open" => Command::LoadProject(arg(&mut parts, "project key")?.to_string()),
            "delete" => Command::DeleteProject(arg(&mut parts, "project key")?.to_string()),
            "projects" => Command::ListProjects,
            "import" => Command::ImportCsv(rest(&mut parts)),
            "state" => Command::State,
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command '{other}'"),
        };

        if matches!(&command, Command::LoadSong(p) | Command::ImportCsv(p) if p.is_empty()) {
            bail!("missing path");
        }
        Ok(command)
    }
}

fn audio_ref_for(path: &str) -> AudioRef {
    let filename = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string();
    let uri = if path.contains("://") {
        path.to_string()
    } else {
        format!("file://{path}")
    };
    AudioRef::new(uri, filename)
}

/// Run one command against the engine.
pub fn dispatch(engine: &mut TimelineEngine, command: Command) -> anyhow::Result<Reply> {
    match command {
        // ====================================================================
        // Transport
        // ====================================================================
        Command::TogglePlayback => engine.toggle_playback()?,
        Command::Play => engine.play()?,
        Command::Pause => engine.pause()?,
        Command::Seek(time_ms) => engine.seek_to(time_ms)?,
        Command::Ghost(time_ms) => engine.set_ghost_time(time_ms),
        Command::SkipToStart => engine.skip_to_start()?,
        Command::SkipToEnd => engine.skip_to_end()?,
        Command::ToggleRepeat => {
            engine.toggle_repeat();
        }
        Command::ToggleLoopMarkers => {
            engine.toggle_loop_markers();
        }

        // ====================================================================
        // Markers
        // ====================================================================
        Command::TapMarker => {
            if engine.tap_marker().is_none() {
                bail!("no song loaded");
            }
        }
        Command::ToggleMarkerAt {
            layer,
            timestamp_ms,
        } => {
            if engine.toggle_marker_at(layer, timestamp_ms).is_none() {
                bail!("no song loaded");
            }
        }
        Command::RemoveMarker {
            layer,
            timestamp_ms,
        } => {
            engine.remove_marker(layer, timestamp_ms);
        }
        Command::UndoMarker => {
            engine.undo_last_marker();
        }
        Command::RedoMarker => {
            engine.redo_last_marker();
        }
        Command::Navigate(direction) => {
            engine.navigate(direction)?;
        }
        Command::Annotate {
            layer,
            timestamp_ms,
            text,
        } => {
            if !engine.update_annotation(layer, timestamp_ms, &text) {
                bail!("no {} marker near {timestamp_ms}ms", layer.as_str());
            }
        }
        Command::SetActiveLayer(layer) => {
            if !engine.set_active_layer(layer) {
                bail!("layer {} is not part of the current stem set", layer.as_str());
            }
        }
        Command::ToggleVisibility(layer) => {
            engine.toggle_visibility(layer);
        }
        Command::ClearLayer(layer) => engine.clear_layer(layer),
        Command::ClearAll => engine.clear_all_markers(),
        Command::SetStemCount(count) => engine.set_stem_count(count),

        // ====================================================================
        // Viewport and settings
        // ====================================================================
        Command::Zoom(direction) => {
            engine.zoom(direction);
        }
        Command::ScrollLeft => {
            engine.scroll_left();
        }
        Command::ScrollRight => {
            engine.scroll_right();
        }
        Command::FitViewport => engine.fit_viewport_to_song(),
        Command::SetWidth(width_px) => engine.set_viewport_width(width_px),
        Command::SetBpm(bpm) => {
            if !engine.set_bpm(bpm) {
                bail!("invalid bpm {bpm}");
            }
        }
        Command::SetSnap(enabled) => engine.set_magnetic_snap(enabled),
        Command::SetGridLines(show) => engine.set_show_grid_lines(show),
        Command::SetViewMode(mode) => engine.set_view_mode(mode),
        Command::SetLayerNavigation(enabled) => engine.set_layer_specific_navigation(enabled),

        // ====================================================================
        // Song and projects
        // ====================================================================
        Command::LoadSong(path) => {
            engine.load_song(audio_ref_for(&path))?;
        }
        Command::SaveProject(key) => engine.save_project(&key)?,
        Command::LoadProject(key) => engine.load_project(&key)?,
        Command::DeleteProject(key) => {
            if !engine.delete_project(&key)? {
                bail!("project '{key}' not found");
            }
        }
        Command::ListProjects => return Ok(Reply::Projects(engine.list_projects()?)),
        Command::ImportCsv(path) => {
            let text = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            return Ok(Reply::Imported(engine.import_csv(&text)?));
        }
        Command::State => {}
        Command::Quit => return Ok(Reply::Quit),
    }
    Ok(Reply::Done)
}
