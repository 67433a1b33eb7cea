//! Edit orchestration.
//!
//! [`EditOrchestrator`] turns a [`Directive`] into a generation request
//! against the current render of a [`Project`], and folds the result back
//! into the project's version graph. At most one graph-mutating operation
//! runs per project at a time.

pub mod directive;
pub mod error;
pub mod orchestrator;
pub mod preset;
pub mod project;

pub use directive::Directive;
pub use error::EditError;
pub use orchestrator::{EditOrchestrator, OrchestratorConfig};
pub use preset::ViewPreset;
pub use project::{Project, ProjectHandle, ProjectSnapshot};
