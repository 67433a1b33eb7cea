use crate::types::{NodeId, ZoneId};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Image bounds are not available yet")]
    GeometryUnavailable,

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Source image unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Parent render not found: {0}")]
    ParentNotFound(NodeId),

    #[error("Render not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Zone not found: {0}")]
    ZoneNotFound(ZoneId),

    #[error("No previous version to return to")]
    NoPreviousVersion,

    #[error("No later version to move to")]
    NoNextVersion,

    #[error("Project already has an original render")]
    AlreadyHasRoot,

    #[error("Render {0} has descendants and cannot be deleted")]
    HasDescendants(NodeId),

    #[error("Cannot delete the current render: it has no parent to fall back to")]
    CannotDeleteCurrentRoot,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
