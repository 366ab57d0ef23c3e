use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::camera::CameraRecord;
use crate::cloud::{CloudClient, CloudError};
use crate::config::ConfigStore;
use crate::connection::{CheckOutcome, Connection, ConnectionError, ConnectionState, StatusCode};
use crate::hooks::HookRegistry;
use crate::probe::ReachabilityProbe;
use crate::reconcile::{ensure_webhook_category, reconcile_poll, ReconcileReport};
use crate::tree::{NodeRepository, TreeError, Upsert};
use crate::webhook::{HookOutcome, HookRequest, WebhookHandler};

pub struct InstanceState<R: NodeRepository> {
    pub tree: R,
    pub webhook: WebhookHandler,
}

pub type SharedInstance<R> = Arc<Mutex<InstanceState<R>>>;

pub fn shared_instance<R: NodeRepository>(tree: R) -> SharedInstance<R> {
    Arc::new(Mutex::new(InstanceState {
        tree,
        webhook: WebhookHandler::new(),
    }))
}

pub async fn ingest_webhook<R: NodeRepository>(instance: &SharedInstance<R>, request: &HookRequest) -> HookOutcome {
    let mut guard = instance.lock().await;
    let state = &mut *guard;
    let outcome = state.webhook.handle(request, &mut state.tree);

    let dirty = match &outcome {
        HookOutcome::Accepted(report) => report.changed(),
        // a push that failed part-way may still have written earlier keys
        HookOutcome::Failed(_) => true,
        _ => false,
    };
    if dirty {
        if let Err(err) = state.tree.flush() {
            warn!(error = %err, "failed to persist tree after webhook");
            return HookOutcome::Failed(err.to_string());
        }
    }

    outcome
}

/// One-shot diagnostic of the connection checks. Only the local hook route is
/// removed afterwards; the cloud webhook stays registered (the cloud drops
/// webhooks per app type, not per URL).
pub async fn check_connection<C: CloudClient, P: ReachabilityProbe>(
    connection: &mut Connection<C, P>,
    store: &dyn ConfigStore,
    hooks: &dyn HookRegistry,
) -> InstanceStatus {
    let status = match connection.establish(store, hooks).await {
        Ok(CheckOutcome::Ready(_)) => InstanceStatus::from(StatusCode::Ready),
        Ok(CheckOutcome::Deferred { callback_url }) => {
            info!(%callback_url, "callback url normalized, run check again");
            InstanceStatus::from(StatusCode::Inactive)
        }
        Err(err) => InstanceStatus::failed(err.status_code(), err.to_string()),
    };
    hooks.unregister(&connection.hook_path());
    status
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatus {
    pub code: u16,
    pub label: String,
    pub detail: Option<String>,
    pub cameras: usize,
    pub checked_at: Option<DateTime<Utc>>,
}

impl InstanceStatus {
    fn new(code: StatusCode, detail: Option<String>) -> Self {
        Self {
            code: code.code(),
            label: code.label().to_string(),
            detail,
            cameras: 0,
            checked_at: None,
        }
    }

    pub fn failed(code: StatusCode, detail: impl Into<String>) -> Self {
        let mut status = Self::new(code, Some(detail.into()));
        status.checked_at = Some(Utc::now());
        status
    }
}

impl From<StatusCode> for InstanceStatus {
    fn from(code: StatusCode) -> Self {
        let mut status = Self::new(code, None);
        status.checked_at = Some(Utc::now());
        status
    }
}

impl Default for InstanceStatus {
    fn default() -> Self {
        Self::new(StatusCode::Inactive, None)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<InstanceStatus>>,
}

impl StatusBoard {
    pub fn current(&self) -> InstanceStatus {
        self.inner
            .read()
            .map(|status| status.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn publish(&self, status: InstanceStatus) {
        match self.inner.write() {
            Ok(mut current) => *current = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("listing cameras failed: {0}")]
    ListCameras(#[from] CloudError),
    #[error("tree update failed: {0}")]
    Tree(#[from] TreeError),
}

impl BridgeError {
    /// Host diagnostic for this failure; `None` keeps the published code and
    /// only records the error as detail.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            BridgeError::Connection(err) => Some(err.status_code()),
            BridgeError::ListCameras(_) => Some(StatusCode::ConnectFailed),
            BridgeError::Tree(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Deferred,
    Reconciled { cameras: usize, report: ReconcileReport },
}

pub struct Bridge<C: CloudClient, P: ReachabilityProbe, R: NodeRepository> {
    connection: Connection<C, P>,
    store: Arc<dyn ConfigStore>,
    hooks: Arc<dyn HookRegistry>,
    instance: SharedInstance<R>,
    status: StatusBoard,
    cycles: u64,
}

impl<C: CloudClient, P: ReachabilityProbe, R: NodeRepository> Bridge<C, P, R> {
    pub fn new(
        connection: Connection<C, P>,
        store: Arc<dyn ConfigStore>,
        hooks: Arc<dyn HookRegistry>,
        instance: SharedInstance<R>,
    ) -> Self {
        Self {
            connection,
            store,
            hooks,
            instance,
            status: StatusBoard::default(),
            cycles: 0,
        }
    }

    pub fn status(&self) -> StatusBoard {
        self.status.clone()
    }

    pub fn instance(&self) -> SharedInstance<R> {
        Arc::clone(&self.instance)
    }

    pub fn connection_state(&self) -> &ConnectionState {
        self.connection.state()
    }

    pub fn hook_path(&self) -> String {
        self.connection.hook_path()
    }

    pub async fn tick(&mut self) -> Result<CycleOutcome, BridgeError> {
        self.cycles += 1;
        let started = Instant::now();

        let result = self.run_cycle().await;

        match &result {
            Ok(CycleOutcome::Deferred) => {
                info!(cycle = self.cycles, "cycle deferred after config normalization");
            }
            Ok(CycleOutcome::Reconciled { cameras, report }) => {
                info!(
                    cycle = self.cycles,
                    cameras,
                    created = report.created,
                    updated = report.updated,
                    elapsed_ms = %started.elapsed().as_millis(),
                    "cycle complete"
                );
            }
            Err(err) => {
                warn!(cycle = self.cycles, error = %err, "cycle aborted");
                match err.status_code() {
                    Some(code) => self.publish(code, Some(err.to_string()), 0),
                    None => self.annotate(err.to_string()),
                }
            }
        }

        result
    }

    async fn run_cycle(&mut self) -> Result<CycleOutcome, BridgeError> {
        let session = match self
            .connection
            .establish(self.store.as_ref(), self.hooks.as_ref())
            .await?
        {
            CheckOutcome::Deferred { .. } => return Ok(CycleOutcome::Deferred),
            CheckOutcome::Ready(session) => session,
        };

        self.publish(StatusCode::Ready, None, 0);
        {
            let mut state = self.instance.lock().await;
            if matches!(ensure_webhook_category(&mut state.tree)?, Upsert::Created(_)) {
                state.tree.flush()?;
            }
        }

        let cameras: Vec<CameraRecord> = self
            .connection
            .client_mut()
            .list_cameras()
            .await?
            .into_iter()
            .map(|camera| CameraRecord::from_cloud(camera, &session.config.lan_address))
            .collect();

        let report = {
            let mut state = self.instance.lock().await;
            let report = reconcile_poll(&mut state.tree, &cameras, session.config.refresh_interval)?;
            if report.changed() {
                state.tree.flush()?;
            }
            report
        };

        self.publish(StatusCode::Ready, None, cameras.len());
        Ok(CycleOutcome::Reconciled {
            cameras: cameras.len(),
            report,
        })
    }

    pub async fn shutdown(&mut self) {
        self.connection.teardown(self.hooks.as_ref()).await;
        self.publish(StatusCode::Inactive, None, 0);
        info!("instance shut down");
    }

    fn annotate(&self, detail: String) {
        let mut status = self.status.current();
        status.detail = Some(detail);
        status.checked_at = Some(Utc::now());
        self.status.publish(status);
    }

    fn publish(&self, code: StatusCode, detail: Option<String>, cameras: usize) {
        let mut status = InstanceStatus::new(code, detail);
        status.cameras = cameras;
        status.checked_at = Some(Utc::now());
        self.status.publish(status);
    }
}
