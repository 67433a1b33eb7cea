//! `atelier-worker` -- applies one edit directive to a project file.
//!
//! Loads the project snapshot (or seeds a new project from an original
//! render), runs the directive through the edit pipeline against the
//! configured generation service, and writes the updated snapshot back.
//! Ctrl-C cancels the in-flight edit. An existing project file is left
//! unchanged; a project seeded in this run is still written out.
//!
//! # Environment variables
//!
//! | Variable                | Required | Default | Description                                  |
//! |-------------------------|----------|---------|----------------------------------------------|
//! | `GENERATION_API_URL`    | yes      | --      | Base URL of the generation service           |
//! | `ANALYSIS_API_URL`      | no       | --      | Base URL of the analysis service             |
//! | `GATEWAY_TIMEOUT_SECS`  | no       | `120`   | Per-request timeout for both services        |
//! | `ANALYSIS_TIMEOUT_SECS` | no       | `20`    | Budget for the optional zone analysis pass   |
//! | `PROJECT_FILE`          | yes      | --      | JSON project snapshot, created if missing    |
//! | `DIRECTIVE_FILE`        | yes      | --      | JSON directive to apply                      |
//! | `SEED_ARTIFACT`         | no       | --      | Original render used when seeding a project  |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_core::types::ArtifactRef;
use atelier_events::EventBus;
use atelier_gateway::source::HttpImageSource;
use atelier_gateway::{GatewayConfig, HttpAnalysisGateway, HttpGenerationGateway};
use atelier_pipeline::{
    Directive, EditError, EditOrchestrator, OrchestratorConfig, Project, ProjectHandle,
    ProjectSnapshot,
};

fn required_path(var: &str) -> anyhow::Result<PathBuf> {
    std::env::var(var)
        .map(PathBuf::from)
        .with_context(|| format!("{var} environment variable is required"))
}

async fn load_project(
    path: &Path,
    orchestrator: &EditOrchestrator,
) -> anyhow::Result<ProjectHandle> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let snapshot: ProjectSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        let project = Project::from_snapshot(snapshot)?;
        tracing::info!(project_id = %project.id(), path = %path.display(), "Project loaded");
        return Ok(project);
    }

    let Ok(seed) = std::env::var("SEED_ARTIFACT") else {
        bail!(
            "{} does not exist and SEED_ARTIFACT is not set",
            path.display()
        );
    };
    let project = Project::new();
    orchestrator
        .seed(&project, ArtifactRef::new(seed), "Original render")
        .await?;
    tracing::info!(project_id = %project.id(), "New project seeded");
    Ok(project)
}

async fn save_project(path: &Path, project: &Project) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&project.snapshot().await)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_worker=info,atelier_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let gateway_config = GatewayConfig::from_env()?;
    let orchestrator_config = OrchestratorConfig::from_env()?;
    let project_file = required_path("PROJECT_FILE")?;
    let directive_file = required_path("DIRECTIVE_FILE")?;

    let directive: Directive = serde_json::from_str(
        &tokio::fs::read_to_string(&directive_file)
            .await
            .with_context(|| format!("reading {}", directive_file.display()))?,
    )
    .with_context(|| format!("parsing {}", directive_file.display()))?;

    let events = Arc::new(EventBus::default());
    let mut orchestrator = EditOrchestrator::new(
        Arc::new(HttpGenerationGateway::from_config(&gateway_config)?),
        Arc::new(HttpImageSource::new(gateway_config.timeout)?),
    )
    .with_events(Arc::clone(&events))
    .with_config(orchestrator_config);
    if let Some(analysis) = HttpAnalysisGateway::from_config(&gateway_config)? {
        orchestrator = orchestrator.with_analysis(Arc::new(analysis));
    }

    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            tracing::info!(
                event_type = %event.event_type,
                project_id = %event.project_id,
                node_id = ?event.node_id,
                "Event",
            );
        }
    });

    let project = load_project(&project_file, &orchestrator).await?;

    tracing::info!(
        project_id = %project.id(),
        kind = directive.kind().as_str(),
        generation_url = %gateway_config.generation_api_url,
        "Starting atelier-worker",
    );

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        tracing::warn!("Interrupt received, cancelling edit");
    };
    let result = orchestrator.apply_until(&project, directive, shutdown).await;

    if result.is_err() && !tokio::fs::try_exists(&project_file).await.unwrap_or(false) {
        // A freshly seeded project is still worth keeping.
        save_project(&project_file, &project).await?;
    }

    match result {
        Ok(node) => {
            save_project(&project_file, &project).await?;
            tracing::info!(
                node_id = %node.id,
                artifact = %node.artifact_ref,
                path = %project_file.display(),
                "Edit applied, project saved",
            );
            Ok(())
        }
        Err(EditError::Cancelled) => {
            tracing::warn!("Edit cancelled, no render added");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
