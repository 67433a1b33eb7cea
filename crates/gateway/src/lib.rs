//! Client side of the external generation and analysis services.
//!
//! The edit pipeline only sees the [`GenerationGateway`] and
//! [`AnalysisGateway`] traits; [`api`] provides the HTTP implementations and
//! [`source`] an [`ImageSource`](atelier_core::source::ImageSource) that
//! reads artifacts over HTTP or from disk.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod request;
pub mod source;

pub use api::{HttpAnalysisGateway, HttpGenerationGateway};
pub use config::{ConfigError, GatewayConfig};
pub use error::GatewayError;
pub use gateway::{AnalysisGateway, GenerationGateway};
pub use request::{
    DetectedItem, GeneratedArtifact, GenerationRequest, Placement, Reference, ReferenceRole,
    StructuredDescription,
};
