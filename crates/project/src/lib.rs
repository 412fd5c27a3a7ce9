mod import;
mod load;
mod save;
mod store;

use serde::{Deserialize, Serialize};

pub use import::{CsvImport, ImportedMarker, parse_marker_csv};
pub use load::decode_project;
pub use save::encode_project;
pub use store::{FileStore, MemoryStore, ProjectStore, load_from_store, save_to_store};
pub use stemtap_transport::{AudioRef, LayerId};

/// Format version written into every saved project.
pub const PROJECT_FORMAT_VERSION: &str = "1.0";

/// A persisted annotation project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub version: String,
    pub metadata: ProjectMetadata,
    #[serde(default)]
    pub audio: Option<AudioRef>,
    pub layers: Vec<LayerData>,
    #[serde(default)]
    pub settings: ProjectSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub name: String,
    pub bpm: f64,
    pub duration_ms: u64,
    pub stem_count: u8,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Milliseconds since the Unix epoch.
    pub modified_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerData {
    pub id: LayerId,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub markers: Vec<u64>,
    #[serde(default)]
    pub annotations: Vec<AnnotationData>,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationData {
    pub timestamp: u64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// All visible layers drawn over one waveform.
    #[default]
    Combined,
    /// One lane per visible layer.
    Split,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(default)]
    pub view_mode: ViewMode,
    #[serde(default = "default_visible")]
    pub show_grid_lines: bool,
    #[serde(default)]
    pub layer_specific_navigation: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::Combined,
            show_grid_lines: true,
            layer_specific_navigation: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid project: {reason}")]
    Validation { reason: String },

    #[error("CSV line {line}: {reason}")]
    Csv { line: usize, reason: String },

    #[error("Project '{0}' not found")]
    NotFound(String),

    #[error("Invalid project key '{0}'")]
    InvalidKey(String),
}

impl ProjectError {
    pub(crate) fn missing(field: &str) -> Self {
        ProjectError::Validation {
            reason: format!("missing required field '{field}'"),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_project() -> Project {
    Project {
        version: PROJECT_FORMAT_VERSION.to_string(),
        metadata: ProjectMetadata {
            name: "Test Song".to_string(),
            bpm: 120.0,
            duration_ms: 180_000,
            stem_count: 4,
            created_at: 1_700_000_000_000,
            modified_at: 1_700_000_500_000,
        },
        audio: Some(AudioRef::new("file:///music/test.mp3", "test.mp3")),
        layers: LayerId::ALL
            .iter()
            .map(|id| LayerData {
                id: *id,
                name: id.display_name().to_string(),
                color: id.default_color().to_string(),
                markers: if *id == LayerId::Drums {
                    vec![1000, 2000, 3000]
                } else {
                    vec![]
                },
                annotations: if *id == LayerId::Drums {
                    vec![AnnotationData {
                        timestamp: 2000,
                        text: "fill".to_string(),
                    }]
                } else {
                    vec![]
                },
                is_visible: *id != LayerId::Piano,
            })
            .collect(),
        settings: ProjectSettings {
            view_mode: ViewMode::Split,
            show_grid_lines: false,
            layer_specific_navigation: true,
        },
    }
}
