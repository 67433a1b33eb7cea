use atelier_core::error::CoreError;
use atelier_core::types::ProjectId;
use atelier_gateway::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Another operation is already in progress for project {0}")]
    OperationInProgress(ProjectId),

    #[error("Edit was cancelled")]
    Cancelled,

    #[error("Project has no current render")]
    NoCurrentRender,
}

impl EditError {
    /// Stable machine-readable code for event payloads and logs.
    pub fn code(&self) -> &'static str {
        match self {
            EditError::Core(CoreError::InvalidRegion(_)) => "INVALID_REGION",
            EditError::Core(CoreError::Validation(_)) => "VALIDATION_ERROR",
            EditError::Core(CoreError::SourceUnavailable(_)) => "SOURCE_UNAVAILABLE",
            EditError::Core(CoreError::ZoneNotFound(_) | CoreError::NodeNotFound(_)) => {
                "NOT_FOUND"
            }
            EditError::Core(CoreError::NoPreviousVersion | CoreError::NoNextVersion) => {
                "NO_SUCH_VERSION"
            }
            EditError::Core(
                CoreError::HasDescendants(_)
                | CoreError::CannotDeleteCurrentRoot
                | CoreError::AlreadyHasRoot,
            ) => "CONFLICT",
            EditError::Core(_) => "INTERNAL_ERROR",
            EditError::Gateway(e) => e.code(),
            EditError::OperationInProgress(_) => "OPERATION_IN_PROGRESS",
            EditError::Cancelled => "CANCELLED",
            EditError::NoCurrentRender => "NO_CURRENT_RENDER",
        }
    }
}
