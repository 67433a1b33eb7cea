//! Core domain logic for the render-editing workspace.
//!
//! Pure geometry and region types, the crop and mask rasterizers, and the
//! per-project render version graph. Nothing in this crate talks to the
//! network; image bytes arrive through the [`source::ImageSource`] trait.

pub mod crop;
pub mod error;
pub mod geometry;
pub mod mask;
pub mod region;
pub mod source;
pub mod types;
pub mod version_graph;
pub mod zone;
