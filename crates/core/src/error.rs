use stemtap_project::ProjectError;
use stemtap_transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Project(#[from] ProjectError),
}
