use std::collections::{BTreeMap, HashMap};

use crate::commands::Command;

/// Default chords and the command text they run.
pub const DEFAULT_KEYBINDINGS: &[(&str, &str)] = &[
    ("space", "toggle"),
    ("m", "tap"),
    ("cmd-z", "undo"),
    ("cmd-shift-z", "redo"),
    ("left", "prev"),
    ("right", "next"),
    ("shift-left", "scroll-left"),
    ("shift-right", "scroll-right"),
    ("=", "zoom-in"),
    ("-", "zoom-out"),
    ("home", "start"),
    ("end", "end"),
    ("r", "repeat"),
    ("l", "loop"),
];

fn normalize(chord: &str) -> String {
    chord.trim().to_ascii_lowercase()
}

/// Key chord lookup: the defaults with config overrides applied on top.
#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: HashMap<String, Command>,
}

impl Keymap {
    /// Overrides whose command text does not parse are skipped with a
    /// warning. An empty command text unbinds the chord.
    pub fn new(overrides: &BTreeMap<String, String>) -> Self {
        let mut bindings = HashMap::new();
        let defaults = DEFAULT_KEYBINDINGS.iter().map(|(k, c)| (*k, *c));
        let custom = overrides.iter().map(|(k, c)| (k.as_str(), c.as_str()));

        for (chord, text) in defaults.chain(custom) {
            let chord = normalize(chord);
            if text.trim().is_empty() {
                bindings.remove(&chord);
                continue;
            }
            match text.parse::<Command>() {
                Ok(command) => {
                    bindings.insert(chord, command);
                }
                Err(e) => tracing::warn!(chord = %chord, command = text, error = %e, "ignoring keybinding"),
            }
        }

        Self { bindings }
    }

    pub fn lookup(&self, chord: &str) -> Option<&Command> {
        self.bindings.get(&normalize(chord))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}
