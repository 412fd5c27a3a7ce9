use crate::{Project, ProjectError};

/// Encode a project as pretty-printed JSON.
pub fn encode_project(project: &Project) -> Result<Vec<u8>, ProjectError> {
    let bytes = serde_json::to_vec_pretty(project)?;
    tracing::debug!(name = %project.metadata.name, bytes = bytes.len(), "encoded project");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LayerId, sample_project};

    #[test]
    fn test_encode_project_is_pretty() {
        let bytes = encode_project(&sample_project()).expect("encode");
        let text = String::from_utf8(bytes).expect("utf8");

        assert!(text.starts_with("{\n"));
        assert!(text.contains("\"version\": \"1.0\""));
    }

    #[test]
    fn test_encoded_project_reads_back() {
        let bytes = encode_project(&sample_project()).expect("encode");
        let loaded: Project = serde_json::from_slice(&bytes).expect("decode");

        assert_eq!(loaded.metadata.name, "Test Song");
        assert_eq!(loaded.metadata.bpm, 120.0);
        assert_eq!(loaded.layers.len(), 6);
        let drums = loaded
            .layers
            .iter()
            .find(|l| l.id == LayerId::Drums)
            .expect("drums layer");
        assert_eq!(drums.markers, vec![1000, 2000, 3000]);
    }
}
