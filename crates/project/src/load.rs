use crate::{
    AudioRef, LayerData, Project, ProjectError, ProjectMetadata, ProjectSettings,
};
use serde::Deserialize;
use std::collections::HashSet;

/// Wire shape used before validation: every top-level field is optional so a
/// missing one is reported as a validation error instead of a parse error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProject {
    version: Option<String>,
    metadata: Option<ProjectMetadata>,
    #[serde(default)]
    audio: Option<AudioRef>,
    layers: Option<Vec<LayerData>>,
    #[serde(default)]
    settings: Option<ProjectSettings>,
}

fn validate(raw: RawProject) -> Result<Project, ProjectError> {
    let version = raw.version.ok_or_else(|| ProjectError::missing("version"))?;
    let metadata = raw.metadata.ok_or_else(|| ProjectError::missing("metadata"))?;
    let layers = raw.layers.ok_or_else(|| ProjectError::missing("layers"))?;

    if version.trim().is_empty() {
        return Err(ProjectError::Validation {
            reason: "empty version".to_string(),
        });
    }

    if !matches!(metadata.stem_count, 2 | 4 | 6) {
        return Err(ProjectError::Validation {
            reason: format!("unsupported stem count {}", metadata.stem_count),
        });
    }

    if metadata.duration_ms == 0 {
        return Err(ProjectError::Validation {
            reason: "zero duration".to_string(),
        });
    }

    if !metadata.bpm.is_finite() || metadata.bpm <= 0.0 {
        return Err(ProjectError::Validation {
            reason: format!("invalid bpm {}", metadata.bpm),
        });
    }

    let mut seen = HashSet::new();
    for layer in &layers {
        if !seen.insert(layer.id) {
            return Err(ProjectError::Validation {
                reason: format!("duplicate layer '{}'", layer.id),
            });
        }
    }

    Ok(Project {
        version,
        metadata,
        audio: raw.audio,
        layers,
        settings: raw.settings.unwrap_or_default(),
    })
}

/// Decode and validate a project record.
///
/// JSON is tried first; anything that does not look like JSON falls back to
/// MessagePack.
pub fn decode_project(bytes: &[u8]) -> Result<Project, ProjectError> {
    let raw = match serde_json::from_slice::<RawProject>(bytes) {
        Ok(raw) => raw,
        Err(json_err) => {
            let looks_like_json = bytes
                .iter()
                .find(|b| !b.is_ascii_whitespace())
                .is_some_and(|b| *b == b'{');
            if looks_like_json {
                return Err(json_err.into());
            }
            rmp_serde::decode::from_slice::<RawProject>(bytes)?
        }
    };

    validate(raw)
}
