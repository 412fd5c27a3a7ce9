use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use stemtap_core::{EngineConfig, StemCount};

/// `[engine]` table. Missing keys take the engine defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub viewport_width_px: f64,
    pub zoom_in_factor: f64,
    pub zoom_out_factor: f64,
    pub min_pixels_per_second: f64,
    pub max_pixels_per_second: f64,
    pub magnetic_snap: bool,
    pub default_bpm: f64,
    pub default_stem_count: u8,
}

impl Default for EngineSection {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            viewport_width_px: defaults.viewport_width_px,
            zoom_in_factor: defaults.zoom_in_factor,
            zoom_out_factor: defaults.zoom_out_factor,
            min_pixels_per_second: defaults.min_pixels_per_second,
            max_pixels_per_second: defaults.max_pixels_per_second,
            magnetic_snap: defaults.magnetic_snap,
            default_bpm: defaults.default_bpm,
            default_stem_count: defaults.default_stem_count.as_u8(),
        }
    }
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        let defaults = EngineConfig::default();
        let default_stem_count = match StemCount::try_from(self.default_stem_count) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring configured stem count");
                defaults.default_stem_count
            }
        };

        EngineConfig {
            viewport_width_px: self.viewport_width_px,
            zoom_in_factor: self.zoom_in_factor,
            zoom_out_factor: self.zoom_out_factor,
            min_pixels_per_second: self.min_pixels_per_second,
            max_pixels_per_second: self.max_pixels_per_second,
            magnetic_snap: self.magnetic_snap,
            default_bpm: self.default_bpm,
            default_stem_count,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where projects are stored. Defaults under the user data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<PathBuf>,
    #[serde(default)]
    pub engine: EngineSection,
    /// Key chord to command, e.g. `"ctrl-s" = "save current"`.
    #[serde(default)]
    pub keybindings: BTreeMap<String, String>,
}

impl Config {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("stemtap").join("config.toml"))
    }

    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Read `path`, falling back to defaults when it is missing or invalid.
    pub fn load_from(path: &Path) -> Self {
        let Ok(contents) = fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("no config directory on this platform"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn project_dir(&self) -> PathBuf {
        if let Some(dir) = &self.project_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|p| p.join("stemtap").join("projects"))
            .unwrap_or_else(|| PathBuf::from("projects"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join("config.toml"));
        assert_eq!(config, Config::default());
        assert_eq!(config.engine.to_engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_partial_engine_table() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "project_dir = \"/tmp/songs\"\n\n[engine]\nmagnetic_snap = false\ndefault_stem_count = 4\n\n[keybindings]\n\"ctrl-p\" = \"play\"\n",
        )
        .expect("write");

        let config = Config::load_from(&path);
        let engine = config.engine.to_engine_config();

        assert!(!engine.magnetic_snap);
        assert_eq!(engine.default_stem_count, StemCount::Four);
        assert_eq!(engine.viewport_width_px, 800.0);
        assert_eq!(config.project_dir(), PathBuf::from("/tmp/songs"));
        assert_eq!(config.keybindings.get("ctrl-p").map(String::as_str), Some("play"));
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[engine\nbroken").expect("write");
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_bad_stem_count_uses_default() {
        let section = EngineSection {
            default_stem_count: 3,
            ..EngineSection::default()
        };
        assert_eq!(section.to_engine_config().default_stem_count, StemCount::Six);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.engine.default_bpm = 96.0;
        config.keybindings.insert("x".to_string(), "tap".to_string());

        config.save_to(&path).expect("save");
        assert_eq!(Config::load_from(&path), config);
    }
}
