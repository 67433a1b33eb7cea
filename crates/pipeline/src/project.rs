//! Per-project state: the version graph, the zones and the single
//! in-flight operation slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use atelier_core::error::CoreError;
use atelier_core::types::ProjectId;
use atelier_core::version_graph::{GraphSnapshot, VersionGraph};
use atelier_core::zone::{Zone, ZoneSet};

use crate::error::EditError;

/// Shared handle to a project. Each project owns its own graph; there is no
/// global registry.
pub type ProjectHandle = Arc<Project>;

pub struct Project {
    id: ProjectId,
    graph: Mutex<VersionGraph>,
    zones: Mutex<ZoneSet>,
    in_flight: AtomicBool,
    cancel: std::sync::Mutex<Option<CancellationToken>>,
}

/// Serializable state of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub id: ProjectId,
    pub graph: GraphSnapshot,
    #[serde(default)]
    pub zones: Vec<Zone>,
}

impl Project {
    pub fn new() -> ProjectHandle {
        Self::with_id(uuid::Uuid::now_v7())
    }

    pub fn with_id(id: ProjectId) -> ProjectHandle {
        Self::from_parts(id, VersionGraph::new(), ZoneSet::new())
    }

    /// Restore a project, validating the graph and the zones.
    pub fn from_snapshot(snapshot: ProjectSnapshot) -> Result<ProjectHandle, CoreError> {
        let graph = VersionGraph::from_snapshot(snapshot.graph)?;
        let zones = ZoneSet::from_zones(snapshot.zones)?;
        Ok(Self::from_parts(snapshot.id, graph, zones))
    }

    fn from_parts(id: ProjectId, graph: VersionGraph, zones: ZoneSet) -> ProjectHandle {
        Arc::new(Self {
            id,
            graph: Mutex::new(graph),
            zones: Mutex::new(zones),
            in_flight: AtomicBool::new(false),
            cancel: std::sync::Mutex::new(None),
        })
    }

    pub fn id(&self) -> ProjectId {
        self.id
    }

    pub async fn snapshot(&self) -> ProjectSnapshot {
        let graph = self.graph.lock().await.snapshot();
        let zones = self.zones.lock().await.to_vec();
        ProjectSnapshot {
            id: self.id,
            graph,
            zones,
        }
    }

    /// Read the version graph. Mutations go through the orchestrator.
    pub async fn read_graph<R>(&self, f: impl FnOnce(&VersionGraph) -> R) -> R {
        f(&*self.graph.lock().await)
    }

    /// Read or edit the project's zones.
    pub async fn with_zones<R>(&self, f: impl FnOnce(&mut ZoneSet) -> R) -> R {
        f(&mut *self.zones.lock().await)
    }

    /// Whether an operation currently holds the slot.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Trigger the in-flight operation's cancellation token. Returns `false`
    /// when nothing is running.
    pub fn cancel_in_flight(&self) -> bool {
        let guard = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Claim the operation slot, or fail immediately if it is taken.
    pub(crate) fn try_begin(&self) -> Result<EditSlot<'_>, EditError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EditError::OperationInProgress(self.id));
        }
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        Ok(EditSlot {
            project: self,
            token,
        })
    }

    pub(crate) async fn graph_mut(&self) -> MutexGuard<'_, VersionGraph> {
        self.graph.lock().await
    }
}

/// Holds a project's operation slot; releases it on drop, on every exit
/// path including panics and dropped futures.
pub(crate) struct EditSlot<'a> {
    project: &'a Project,
    token: CancellationToken,
}

impl EditSlot<'_> {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Detach the token from the project so later cancel requests report
    /// nothing running. Returns `false` if cancellation already happened.
    pub(crate) fn disarm(&self) -> bool {
        let mut guard = self.project.cancel.lock().unwrap_or_else(|e| e.into_inner());
        if self.token.is_cancelled() {
            return false;
        }
        *guard = None;
        true
    }
}

impl std::fmt::Debug for EditSlot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSlot")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl Drop for EditSlot<'_> {
    fn drop(&mut self) {
        *self.project.cancel.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.project.in_flight.store(false, Ordering::Release);
    }
}
