//! Edit request lifecycle.
//!
//! Every graph-mutating operation claims the project's single slot first, so
//! a second request while one is pending fails with
//! [`EditError::OperationInProgress`] instead of queueing. [`apply`] only
//! touches the version graph after the generation service has succeeded and
//! the request has not been cancelled; a failed or cancelled edit leaves the
//! graph exactly as it was.
//!
//! [`apply`]: EditOrchestrator::apply

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use atelier_core::crop::CropCache;
use atelier_core::mask::mask_for_source;
use atelier_core::source::ImageSource;
use atelier_core::types::{ArtifactRef, NodeId};
use atelier_core::version_graph::RenderNode;
use atelier_core::zone::Zone;
use atelier_events::{event_types, EventBus, StudioEvent};
use atelier_gateway::{
    AnalysisGateway, ConfigError, GenerationGateway, GenerationRequest, Reference, ReferenceRole,
};

use crate::directive::Directive;
use crate::error::EditError;
use crate::project::Project;

/// Default time budget for the optional analysis pass.
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 20;

/// Default cap on style references attached to a zone view.
pub const DEFAULT_MAX_STYLE_REFERENCES: usize = 3;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long a zone view waits for analysis before generating without it.
    pub analysis_timeout: Duration,
    pub max_style_references: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(DEFAULT_ANALYSIS_TIMEOUT_SECS),
            max_style_references: DEFAULT_MAX_STYLE_REFERENCES,
        }
    }
}

impl OrchestratorConfig {
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `ANALYSIS_TIMEOUT_SECS` | `20`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup. A zero
    /// timeout is rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("ANALYSIS_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    var: "ANALYSIS_TIMEOUT_SECS",
                    value: raw,
                })?;
            config.analysis_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Request and node text produced for one directive.
struct PreparedEdit {
    request: GenerationRequest,
    node_directive: String,
}

pub struct EditOrchestrator {
    generation: Arc<dyn GenerationGateway>,
    analysis: Option<Arc<dyn AnalysisGateway>>,
    images: Arc<dyn ImageSource>,
    crops: CropCache,
    events: Option<Arc<EventBus>>,
    config: OrchestratorConfig,
}

impl EditOrchestrator {
    pub fn new(generation: Arc<dyn GenerationGateway>, images: Arc<dyn ImageSource>) -> Self {
        Self {
            generation,
            analysis: None,
            images,
            crops: CropCache::default(),
            events: None,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_analysis(mut self, analysis: Arc<dyn AnalysisGateway>) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Create the project's original render.
    pub async fn seed(
        &self,
        project: &Project,
        artifact_ref: ArtifactRef,
        directive: impl Into<String>,
    ) -> Result<RenderNode, EditError> {
        let _slot = project.try_begin()?;
        let node = project
            .graph_mut()
            .await
            .create_root(artifact_ref, directive)?;

        tracing::info!(project_id = %project.id(), node_id = %node.id, "Original render created");
        self.publish_node(project, event_types::RENDER_CREATED, &node);
        Ok(node)
    }

    /// Run `directive` against the project's current render and append the
    /// result as a child of that render.
    pub async fn apply(
        &self,
        project: &Project,
        directive: Directive,
    ) -> Result<RenderNode, EditError> {
        let slot = project.try_begin()?;
        directive.validate(self.config.max_style_references)?;

        let source = project
            .read_graph(|g| g.current().cloned())
            .await
            .ok_or(EditError::NoCurrentRender)?;
        let kind = directive.kind();

        tracing::info!(
            project_id = %project.id(),
            source_id = %source.id,
            kind = kind.as_str(),
            "Applying edit",
        );

        let token = slot.token().clone();
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(EditError::Cancelled),
            result = self.generate(project, &source, &directive) => result,
        };

        let result = match outcome {
            Ok((artifact_ref, node_directive)) => {
                let mut graph = project.graph_mut().await;
                // A response that lands after cancellation is discarded. Past
                // this point cancel requests see nothing in flight.
                if !slot.disarm() {
                    Err(EditError::Cancelled)
                } else {
                    graph
                        .create_child(source.id, artifact_ref, node_directive, kind)
                        .map_err(EditError::from)
                }
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(node) => {
                tracing::info!(
                    project_id = %project.id(),
                    node_id = %node.id,
                    parent_id = %source.id,
                    kind = kind.as_str(),
                    "Render created",
                );
                self.publish_node(project, event_types::RENDER_CREATED, node);
            }
            Err(EditError::Cancelled) => {
                tracing::info!(project_id = %project.id(), kind = kind.as_str(), "Edit cancelled");
                self.publish(
                    StudioEvent::new(event_types::EDIT_CANCELLED, project.id())
                        .with_node(source.id)
                        .with_payload(serde_json::json!({ "kind": kind })),
                );
            }
            Err(e) => {
                tracing::error!(
                    project_id = %project.id(),
                    kind = kind.as_str(),
                    code = e.code(),
                    error = %e,
                    "Edit failed",
                );
                self.publish(
                    StudioEvent::new(event_types::EDIT_FAILED, project.id())
                        .with_node(source.id)
                        .with_payload(serde_json::json!({
                            "kind": kind,
                            "code": e.code(),
                            "message": e.to_string(),
                        })),
                );
            }
        }

        drop(slot);
        result
    }

    /// Like [`apply`](Self::apply), but cancels the edit once `shutdown`
    /// resolves and waits for it to wind down. An edit that is already
    /// committing still completes.
    pub async fn apply_until(
        &self,
        project: &Project,
        directive: Directive,
        shutdown: impl Future<Output = ()>,
    ) -> Result<RenderNode, EditError> {
        let apply = self.apply(project, directive);
        tokio::pin!(apply);
        tokio::select! {
            // Polling `apply` first claims the slot before any cancel.
            biased;
            result = &mut apply => result,
            () = shutdown => {
                self.cancel(project);
                apply.await
            }
        }
    }

    /// Cancel the project's in-flight operation. Returns `false` when nothing
    /// is running or the edit has already started committing its render.
    pub fn cancel(&self, project: &Project) -> bool {
        let cancelled = project.cancel_in_flight();
        if cancelled {
            tracing::info!(project_id = %project.id(), "Cancellation requested");
        }
        cancelled
    }

    /// Move the current pointer back to the parent render.
    pub async fn undo(&self, project: &Project) -> Result<RenderNode, EditError> {
        let _slot = project.try_begin()?;
        let node = project.graph_mut().await.undo()?;
        tracing::info!(project_id = %project.id(), node_id = %node.id, "Undo");
        self.publish_node(project, event_types::RENDER_UNDONE, &node);
        Ok(node)
    }

    /// Move the current pointer to the most recent child render.
    pub async fn redo(&self, project: &Project) -> Result<RenderNode, EditError> {
        let _slot = project.try_begin()?;
        let node = project.graph_mut().await.redo()?;
        tracing::info!(project_id = %project.id(), node_id = %node.id, "Redo");
        self.publish_node(project, event_types::RENDER_SELECTED, &node);
        Ok(node)
    }

    /// Make an older (or sibling) render current.
    pub async fn select(&self, project: &Project, node_id: NodeId) -> Result<RenderNode, EditError> {
        let _slot = project.try_begin()?;
        let node = project.graph_mut().await.select_existing(node_id)?;
        tracing::info!(project_id = %project.id(), node_id = %node.id, "Render selected");
        self.publish_node(project, event_types::RENDER_SELECTED, &node);
        Ok(node)
    }

    /// Delete a leaf render.
    pub async fn delete(&self, project: &Project, node_id: NodeId) -> Result<RenderNode, EditError> {
        let _slot = project.try_begin()?;
        let (node, current_id) = {
            let mut graph = project.graph_mut().await;
            let node = graph.delete_node(node_id)?;
            (node, graph.current_id())
        };
        tracing::info!(project_id = %project.id(), node_id = %node.id, "Render deleted");
        self.publish(
            StudioEvent::new(event_types::RENDER_DELETED, project.id())
                .with_node(node.id)
                .with_payload(serde_json::json!({ "current_id": current_id })),
        );
        Ok(node)
    }

    // ---- private helpers ----

    /// Build the request, call the generation service and return the new
    /// artifact with the text to record on the node.
    async fn generate(
        &self,
        project: &Project,
        source: &RenderNode,
        directive: &Directive,
    ) -> Result<(ArtifactRef, String), EditError> {
        let prepared = self.prepare(project, source, directive).await?;
        let artifact = self.generation.generate(&prepared.request).await?;
        Ok((artifact.artifact_ref, prepared.node_directive))
    }

    async fn prepare(
        &self,
        project: &Project,
        source: &RenderNode,
        directive: &Directive,
    ) -> Result<PreparedEdit, EditError> {
        let source_ref = source.artifact_ref.clone();
        let kind = directive.kind();

        let prepared = match directive {
            Directive::Global { text } => PreparedEdit {
                request: GenerationRequest::new(source_ref, text.clone(), kind),
                node_directive: text.clone(),
            },

            Directive::Selective {
                text,
                region,
                reference,
            } => {
                let bytes = self.images.load(&source_ref).await?;
                let mask = mask_for_source(bytes, region.clone()).await?.to_png()?;

                let mut request = GenerationRequest::new(source_ref, text.clone(), kind);
                request.region = Some(region.clone());
                request.mask_png = Some(mask);
                if let Some(reference) = reference {
                    request.references.push(Reference::Artifact {
                        role: ReferenceRole::Swatch,
                        artifact_ref: reference.clone(),
                    });
                }
                PreparedEdit {
                    request,
                    node_directive: text.clone(),
                }
            }

            Directive::ZoneView {
                text,
                zone_id,
                analyze,
                style_references,
                product_references,
            } => {
                let zone: Zone = project.with_zones(|zones| zones.get(*zone_id).cloned()).await?;
                let crop = self
                    .crops
                    .get_or_crop(self.images.as_ref(), &source_ref, zone.region())
                    .await?;
                let crop_png = crop.to_png()?;

                let base = if text.trim().is_empty() {
                    format!("Re-render the zone '{}'", zone.name())
                } else {
                    text.clone()
                };
                let prompt = match self.analyze_zone(project, &zone, &crop_png, *analyze).await {
                    Some(fragment) => format!("{base}\n\n{fragment}"),
                    None => base.clone(),
                };

                let mut request = GenerationRequest::new(source_ref, prompt, kind);
                request.region = Some(zone.region().clone());
                request.references.push(Reference::Raster {
                    role: ReferenceRole::ZoneCrop,
                    png: crop_png,
                });
                request.references.extend(style_references.iter().map(|r| {
                    Reference::Artifact {
                        role: ReferenceRole::Style,
                        artifact_ref: r.clone(),
                    }
                }));
                request.references.extend(product_references.iter().map(|r| {
                    Reference::Artifact {
                        role: ReferenceRole::Product,
                        artifact_ref: r.clone(),
                    }
                }));
                PreparedEdit {
                    request,
                    node_directive: base,
                }
            }

            Directive::Composite { text, placements } => {
                let node_directive = if text.trim().is_empty() {
                    format!("Composite of {} item(s)", placements.len())
                } else {
                    text.clone()
                };
                let mut request = GenerationRequest::new(source_ref, node_directive.clone(), kind);
                request.placements = placements.clone();
                PreparedEdit {
                    request,
                    node_directive,
                }
            }

            Directive::MultiView {
                text,
                preset,
                focus,
            } => {
                let node_directive = if text.trim().is_empty() {
                    format!("Multi-view grid ({})", preset.name())
                } else {
                    text.clone()
                };
                let mut request = GenerationRequest::new(source_ref, node_directive.clone(), kind);
                request.views = preset.views().to_vec();
                request.region = focus.clone();
                PreparedEdit {
                    request,
                    node_directive,
                }
            }
        };

        Ok(prepared)
    }

    /// Best-effort analysis of a zone crop. Failures and timeouts are logged
    /// and yield `None`.
    async fn analyze_zone(
        &self,
        project: &Project,
        zone: &Zone,
        crop_png: &[u8],
        requested: bool,
    ) -> Option<String> {
        if !requested {
            return None;
        }
        let Some(analysis) = &self.analysis else {
            tracing::debug!(project_id = %project.id(), "Analysis requested but no analysis service configured");
            return None;
        };

        let call = analysis.analyze(crop_png, Some(zone.name()));
        match tokio::time::timeout(self.config.analysis_timeout, call).await {
            Ok(Ok(description)) => description.to_prompt_fragment(),
            Ok(Err(e)) => {
                tracing::warn!(
                    project_id = %project.id(),
                    zone_id = %zone.id(),
                    error = %e,
                    "Zone analysis failed, generating without it",
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    project_id = %project.id(),
                    zone_id = %zone.id(),
                    timeout_ms = self.config.analysis_timeout.as_millis() as u64,
                    "Zone analysis timed out, generating without it",
                );
                None
            }
        }
    }

    fn publish_node(&self, project: &Project, event_type: &str, node: &RenderNode) {
        self.publish(
            StudioEvent::new(event_type, project.id())
                .with_node(node.id)
                .with_payload(serde_json::json!({
                    "kind": node.kind,
                    "parent_id": node.parent_id,
                    "artifact_ref": node.artifact_ref,
                })),
        );
    }

    fn publish(&self, event: StudioEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn only(var: &'static str, value: &'static str) -> impl Fn(&str) -> Option<String> {
        move |key| (key == var).then(|| value.to_string())
    }

    #[test]
    fn analysis_timeout_defaults_when_unset() {
        let config = OrchestratorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(
            config.analysis_timeout,
            Duration::from_secs(DEFAULT_ANALYSIS_TIMEOUT_SECS)
        );
        assert_eq!(config.max_style_references, DEFAULT_MAX_STYLE_REFERENCES);
    }

    #[test]
    fn analysis_timeout_is_read() {
        let config = OrchestratorConfig::from_lookup(only("ANALYSIS_TIMEOUT_SECS", " 5 ")).unwrap();
        assert_eq!(config.analysis_timeout, Duration::from_secs(5));
    }

    #[test]
    fn zero_or_garbage_timeout_is_rejected() {
        assert_matches!(
            OrchestratorConfig::from_lookup(only("ANALYSIS_TIMEOUT_SECS", "0")),
            Err(ConfigError::Invalid { var: "ANALYSIS_TIMEOUT_SECS", .. })
        );
        assert_matches!(
            OrchestratorConfig::from_lookup(only("ANALYSIS_TIMEOUT_SECS", "soon")),
            Err(ConfigError::Invalid { .. })
        );
    }
}
