//! Application state container.
//!
//! `CoreState` is the single owner of the in-memory mirrors (reports, tips,
//! queue counter, connectivity, sync status, session) and the only caller of
//! the persistence stores. It is constructed explicitly, shared as
//! `Arc<CoreState>`, and bound to the application's lifetime through
//! [`CoreState::init`] / [`CoreState::dispose`].
//!
//! Every mutation of the report list persists the full list and recomputes
//! storage usage before the lock is released.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde::Serialize;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::{self, AppConfig};
use crate::db::repository::{OfflineQueue, ReportStore, StorageUsage, TipStore};
use crate::db::{KeyValueStore, StorageError};
use crate::journal::{self, LogError};
use crate::models::{
    NewSymptomReport, Session, SymptomReport, SyncStatus, Tip, TipDraft, UserProfile, UserRole,
};
use crate::persistence::Persistence;
use crate::seed::SeedData;
use crate::sync::{merge_queued, SyncCoordinator, SyncDelay, SyncOutcome, SyncTimings, TokioDelay};

/// Buffered state-change events per subscriber before the oldest are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 64;

const MAX_VILLAGE_LEN: usize = 100;
const MAX_SYMPTOMS_LEN: usize = 1_000;
const MAX_NOTES_LEN: usize = 2_000;

// ═══════════════════════════════════════════════════════════
// Events
// ═══════════════════════════════════════════════════════════

/// Change notification for UI subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum StateEvent {
    ReportsChanged { count: usize },
    QueueChanged { count: usize },
    TipsChanged { count: usize },
    ConnectivityChanged { online: bool },
    SyncStatusChanged(SyncStatus),
    SessionChanged { role: Option<UserRole> },
}

/// Where a new report went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportRoute {
    /// Written straight to the report store.
    Stored,
    /// Held in the offline queue until the next sync.
    Queued,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportReceipt {
    pub report: SymptomReport,
    pub route: ReportRoute,
}

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

struct StateInner {
    session: Session,
    symptoms_data: Vec<SymptomReport>,
    tips: Vec<Tip>,
    offline_queue_count: usize,
    is_online: bool,
    sync_status: SyncStatus,
    storage_usage: u64,
    last_report_id: i64,
}

pub struct CoreState {
    config: AppConfig,
    reports: ReportStore,
    queue: OfflineQueue,
    tip_store: TipStore,
    usage: StorageUsage,
    sync: SyncCoordinator,
    inner: RwLock<StateInner>,
    events: broadcast::Sender<StateEvent>,
    /// Connectivity listener, present between `init` and `dispose`.
    connectivity: Mutex<Option<ConnectivitySubscription>>,
}

impl CoreState {
    /// Mount the container: load persisted collections (seeding first runs),
    /// read the queue length, and write the loaded reports back.
    ///
    /// Starts offline; `init` records the real connectivity.
    pub fn new(store: Arc<dyn KeyValueStore>, config: AppConfig, seed: SeedData) -> Self {
        Self::with_sync_delay(store, config, seed, Arc::new(TokioDelay))
    }

    /// Same as [`CoreState::new`] with a custom delay strategy for the sync
    /// coordinator.
    pub fn with_sync_delay(
        store: Arc<dyn KeyValueStore>,
        config: AppConfig,
        seed: SeedData,
        delay: Arc<dyn SyncDelay>,
    ) -> Self {
        let persistence = Persistence::new(store);
        let reports = ReportStore::new(persistence.clone());
        let queue = OfflineQueue::new(persistence.clone());
        let tip_store = TipStore::new(persistence.clone());
        let usage = StorageUsage::new(persistence);

        let symptoms_data = reports.get_stored_reports(&seed.reports);
        let tips = tip_store.get_tips(&seed.tips);
        let queued = queue.get_queue();

        // Mirror is persisted on mount, so seeded data becomes durable
        reports.save_reports(&symptoms_data);
        tip_store.save_tips(&tips);

        let last_report_id = symptoms_data
            .iter()
            .chain(queued.iter())
            .map(|r| r.id)
            .max()
            .unwrap_or(0);

        let inner = StateInner {
            session: Session::default(),
            offline_queue_count: queued.len(),
            symptoms_data,
            tips,
            is_online: false,
            sync_status: SyncStatus::Idle,
            storage_usage: usage.get_usage(),
            last_report_id,
        };

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let sync = SyncCoordinator::new(delay, SyncTimings::from_config(&config));

        tracing::info!(
            reports = inner.symptoms_data.len(),
            queued = inner.offline_queue_count,
            usage_bytes = inner.storage_usage,
            "State container mounted"
        );

        Self {
            config,
            reports,
            queue,
            tip_store,
            usage,
            sync,
            inner: RwLock::new(inner),
            events,
            connectivity: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn read_inner(&self) -> Result<RwLockReadGuard<'_, StateInner>, CoreError> {
        self.inner.read().map_err(|_| CoreError::LockPoisoned)
    }

    fn write_inner(&self) -> Result<RwLockWriteGuard<'_, StateInner>, CoreError> {
        self.inner.write().map_err(|_| CoreError::LockPoisoned)
    }

    fn emit(&self, event: StateEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Bind to the connectivity signal for the container's lifetime.
    ///
    /// Records the current connectivity and, if already online, starts a
    /// drain whose handle is returned. A previous subscription is replaced.
    pub fn init(
        self: &Arc<Self>,
        mut connectivity: watch::Receiver<bool>,
    ) -> Option<JoinHandle<Result<SyncOutcome, CoreError>>> {
        let online = *connectivity.borrow_and_update();
        self.set_online_flag(online);

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let weak: Weak<CoreState> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    changed = connectivity.changed() => {
                        if changed.is_err() {
                            tracing::debug!("Connectivity signal dropped, listener exiting");
                            break;
                        }
                        let online = *connectivity.borrow_and_update();
                        let Some(state) = weak.upgrade() else { break };
                        state.handle_connectivity_change(online);
                    }
                }
            }
        });

        let previous = self
            .connectivity
            .lock()
            .ok()
            .and_then(|mut slot| slot.replace(ConnectivitySubscription::new(shutdown_tx, handle)));
        drop(previous);

        tracing::info!(online, "State container initialised");
        online.then(|| self.spawn_sync())
    }

    /// Stop listening for connectivity changes and wait for the listener to
    /// exit. In-flight syncs run to completion.
    pub async fn dispose(&self) {
        let subscription = self.connectivity.lock().ok().and_then(|mut slot| slot.take());
        if let Some(subscription) = subscription {
            subscription.shutdown().await;
            tracing::info!("State container disposed");
        }
    }

    /// Apply a connectivity edge. Going online spawns a drain of the offline
    /// queue, whose handle is returned.
    pub fn handle_connectivity_change(
        self: &Arc<Self>,
        online: bool,
    ) -> Option<JoinHandle<Result<SyncOutcome, CoreError>>> {
        let was_online = self.set_online_flag(online);
        if online && !was_online {
            tracing::info!("Connectivity restored");
            Some(self.spawn_sync())
        } else {
            if !online && was_online {
                tracing::info!("Connectivity lost, new reports will be queued");
            }
            None
        }
    }

    /// Update the online flag, returning the previous value.
    fn set_online_flag(&self, online: bool) -> bool {
        let previous = match self.inner.write() {
            Ok(mut inner) => std::mem::replace(&mut inner.is_online, online),
            Err(_) => return online,
        };
        if previous != online {
            self.emit(StateEvent::ConnectivityChanged { online });
        }
        previous
    }

    fn spawn_sync(self: &Arc<Self>) -> JoinHandle<Result<SyncOutcome, CoreError>> {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            let result = state.sync_offline_queue().await;
            if let Err(ref e) = result {
                tracing::warn!("Offline queue sync failed: {e}");
            }
            result
        })
    }

    // ── Sync ────────────────────────────────────────────────

    /// Drain the offline queue into the report store.
    ///
    /// Skipped when the queue is empty, ignored while another drain is in
    /// flight. Queued reports are re-read at commit time so anything queued
    /// during the delay is merged too.
    pub async fn sync_offline_queue(&self) -> Result<SyncOutcome, CoreError> {
        if self.queue.is_empty() {
            self.reconcile_queue_count()?;
            return Ok(SyncOutcome::NothingToSync);
        }

        let Some(guard) = self.sync.try_begin() else {
            tracing::debug!("Sync trigger ignored, a sync is already in flight");
            return Ok(SyncOutcome::AlreadyInFlight);
        };
        let generation = guard.generation();

        self.set_sync_status(SyncStatus::Syncing)?;
        tracing::info!(
            queued = self.queue.len(),
            delay_ms = self.sync.timings().drain_delay.as_millis() as u64,
            "Offline queue sync started"
        );

        self.sync.wait_drain().await;
        let merged = self.commit_offline_queue()?;
        drop(guard);

        self.sync.wait_synced_display().await;
        if self.sync.generation() == generation {
            let mut inner = self.write_inner()?;
            if inner.sync_status == SyncStatus::Synced {
                inner.sync_status = SyncStatus::Idle;
                drop(inner);
                self.emit(StateEvent::SyncStatusChanged(SyncStatus::Idle));
            }
        }

        Ok(SyncOutcome::Synced { merged })
    }

    /// Merge the queue into the report list, persist it, then clear the
    /// queue. A crash between the two writes leaves the reports in both
    /// places; the next sync then duplicates them rather than losing them.
    ///
    /// The queue is only cleared once the merged list is durably written. A
    /// refused write keeps the queue and the previous list, and returns the
    /// status to idle.
    fn commit_offline_queue(&self) -> Result<usize, CoreError> {
        let mut inner = self.write_inner()?;

        let queued = self.queue.get_queue();
        let merged = queued.len();
        let combined = merge_queued(queued, &inner.symptoms_data);
        if let Err(e) = self.reports.try_save_reports(&combined) {
            tracing::warn!(error = %e, queued = merged, "Sync commit failed, offline queue kept");
            inner.sync_status = SyncStatus::Idle;
            inner.offline_queue_count = merged;
            drop(inner);
            self.emit(StateEvent::SyncStatusChanged(SyncStatus::Idle));
            return Err(CoreError::Storage(e));
        }
        inner.symptoms_data = combined;
        self.queue.clear_queue();

        inner.offline_queue_count = 0;
        inner.sync_status = SyncStatus::Synced;
        inner.storage_usage = self.usage.get_usage();
        let count = inner.symptoms_data.len();
        drop(inner);

        tracing::info!(merged, total = count, "Offline queue merged");
        self.emit(StateEvent::ReportsChanged { count });
        self.emit(StateEvent::QueueChanged { count: 0 });
        self.emit(StateEvent::SyncStatusChanged(SyncStatus::Synced));
        Ok(merged)
    }

    /// Bring the queue counter back in line with the persisted queue, which
    /// can fall behind when an enqueue write was refused.
    fn reconcile_queue_count(&self) -> Result<(), CoreError> {
        let actual = self.queue.len();
        let mut inner = self.write_inner()?;
        if inner.offline_queue_count == actual {
            return Ok(());
        }
        tracing::debug!(
            counted = inner.offline_queue_count,
            actual,
            "Queue counter out of step with store"
        );
        inner.offline_queue_count = actual;
        drop(inner);
        self.emit(StateEvent::QueueChanged { count: actual });
        Ok(())
    }

    fn set_sync_status(&self, status: SyncStatus) -> Result<(), CoreError> {
        self.write_inner()?.sync_status = status;
        self.emit(StateEvent::SyncStatusChanged(status));
        Ok(())
    }

    // ── Session ─────────────────────────────────────────────

    pub fn login(&self, role: UserRole, profile: Option<UserProfile>) -> Result<(), CoreError> {
        let mut inner = self.write_inner()?;
        inner.session = Session {
            role: Some(role),
            profile,
        };
        drop(inner);
        tracing::info!(role = %role, "Signed in");
        self.emit(StateEvent::SessionChanged { role: Some(role) });
        Ok(())
    }

    pub fn logout(&self) -> Result<(), CoreError> {
        self.write_inner()?.session = Session::default();
        tracing::info!("Signed out");
        self.emit(StateEvent::SessionChanged { role: None });
        Ok(())
    }

    fn require_role(inner: &StateInner, role: UserRole) -> Result<(), CoreError> {
        if inner.session.has_role(role) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(role))
        }
    }

    // ── Reports ─────────────────────────────────────────────

    /// Record a new report. Online it goes to the front of the report store;
    /// offline it is queued and the queue counter goes up by one.
    pub fn report_symptom(&self, data: NewSymptomReport) -> Result<ReportReceipt, CoreError> {
        validate_new_report(&data)?;

        let mut inner = self.write_inner()?;
        let id = next_report_id(&mut inner);
        let report = data.into_report(id);

        let route = if inner.is_online {
            inner.symptoms_data.insert(0, report.clone());
            self.reports.save_reports(&inner.symptoms_data);
            ReportRoute::Stored
        } else {
            self.queue.enqueue(report.clone());
            inner.offline_queue_count += 1;
            ReportRoute::Queued
        };
        inner.storage_usage = self.usage.get_usage();

        let event = match route {
            ReportRoute::Stored => StateEvent::ReportsChanged {
                count: inner.symptoms_data.len(),
            },
            ReportRoute::Queued => StateEvent::QueueChanged {
                count: inner.offline_queue_count,
            },
        };
        drop(inner);

        tracing::info!(id, route = ?route, "Symptom report recorded");
        self.emit(event);
        Ok(ReportReceipt { report, route })
    }

    /// Mark one report resolved. Health workers only; resolving twice is a
    /// no-op at the data level.
    pub fn resolve_symptom(&self, id: i64) -> Result<SymptomReport, CoreError> {
        let mut inner = self.write_inner()?;
        Self::require_role(&inner, UserRole::HealthWorker)?;

        let report = inner
            .symptoms_data
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(CoreError::NotFound {
                entity_type: "symptom report",
                id: id.to_string(),
            })?;
        report.resolved = true;
        let resolved = report.clone();

        self.reports.save_reports(&inner.symptoms_data);
        inner.storage_usage = self.usage.get_usage();
        let count = inner.symptoms_data.len();
        drop(inner);

        tracing::info!(id, "Symptom report resolved");
        self.emit(StateEvent::ReportsChanged { count });
        Ok(resolved)
    }

    // ── Health log ──────────────────────────────────────────

    /// Pretty-printed JSON of the current report list.
    pub fn export_log_json(&self) -> Result<String, CoreError> {
        let inner = self.read_inner()?;
        Ok(journal::serialize_log(&inner.symptoms_data)?)
    }

    /// Write `health_log_<date>.json` into `dir`, returning its path.
    pub fn export_log(&self, dir: &Path) -> Result<PathBuf, CoreError> {
        let json = self.export_log_json()?;
        let path = dir.join(journal::export_file_name(chrono::Local::now().date_naive()));

        std::fs::create_dir_all(dir).map_err(LogError::Io)?;
        std::fs::write(&path, json).map_err(LogError::Io)?;

        tracing::info!(path = %path.display(), "Health log exported");
        Ok(path)
    }

    /// Replace the report list with the contents of a health log file.
    /// On any validation failure the current list is left untouched.
    pub async fn restore_log(&self, path: &Path) -> Result<usize, CoreError> {
        let text = tokio::fs::read_to_string(path).await.map_err(LogError::Io)?;
        let restored = journal::parse_log(&text)?;
        let count = restored.len();

        let mut inner = self.write_inner()?;
        if let Some(max_id) = restored.iter().map(|r| r.id).max() {
            inner.last_report_id = inner.last_report_id.max(max_id);
        }
        inner.symptoms_data = restored;
        self.reports.save_reports(&inner.symptoms_data);
        inner.storage_usage = self.usage.get_usage();
        drop(inner);

        tracing::info!(count, path = %path.display(), "Health log restored");
        self.emit(StateEvent::ReportsChanged { count });
        Ok(count)
    }

    /// Wipe every report and the offline queue.
    pub fn clear_log(&self) -> Result<(), CoreError> {
        let mut inner = self.write_inner()?;
        inner.symptoms_data.clear();
        self.reports.save_reports(&inner.symptoms_data);
        self.queue.clear_queue();
        inner.offline_queue_count = 0;
        inner.storage_usage = self.usage.get_usage();
        drop(inner);

        tracing::info!("Health log cleared");
        self.emit(StateEvent::ReportsChanged { count: 0 });
        self.emit(StateEvent::QueueChanged { count: 0 });
        Ok(())
    }

    // ── Tips ────────────────────────────────────────────────

    pub fn add_tip(&self, draft: TipDraft) -> Result<Tip, CoreError> {
        validate_tip(&draft)?;
        let mut inner = self.write_inner()?;
        Self::require_role(&inner, UserRole::HealthWorker)?;

        let tip = draft.into_tip(uuid::Uuid::new_v4().to_string());
        inner.tips.push(tip.clone());
        self.commit_tips(inner);
        Ok(tip)
    }

    pub fn update_tip(&self, id: &str, draft: TipDraft) -> Result<Tip, CoreError> {
        validate_tip(&draft)?;
        let mut inner = self.write_inner()?;
        Self::require_role(&inner, UserRole::HealthWorker)?;

        let slot = inner
            .tips
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| CoreError::NotFound {
                entity_type: "tip",
                id: id.to_string(),
            })?;
        *slot = draft.into_tip(id);
        let tip = slot.clone();
        self.commit_tips(inner);
        Ok(tip)
    }

    pub fn delete_tip(&self, id: &str) -> Result<(), CoreError> {
        let mut inner = self.write_inner()?;
        Self::require_role(&inner, UserRole::HealthWorker)?;

        let before = inner.tips.len();
        inner.tips.retain(|t| t.id != id);
        if inner.tips.len() == before {
            return Err(CoreError::NotFound {
                entity_type: "tip",
                id: id.to_string(),
            });
        }
        self.commit_tips(inner);
        Ok(())
    }

    fn commit_tips(&self, mut inner: RwLockWriteGuard<'_, StateInner>) {
        self.tip_store.save_tips(&inner.tips);
        inner.storage_usage = self.usage.get_usage();
        let count = inner.tips.len();
        drop(inner);
        self.emit(StateEvent::TipsChanged { count });
    }

    // ── Snapshots ───────────────────────────────────────────

    pub fn symptoms(&self) -> Vec<SymptomReport> {
        self.read_inner()
            .map(|inner| inner.symptoms_data.clone())
            .unwrap_or_default()
    }

    pub fn tips(&self) -> Vec<Tip> {
        self.read_inner()
            .map(|inner| inner.tips.clone())
            .unwrap_or_default()
    }

    /// Reports held in the offline queue right now.
    pub fn queued_reports(&self) -> Vec<SymptomReport> {
        self.queue.get_queue()
    }

    pub fn offline_queue_count(&self) -> usize {
        self.read_inner()
            .map(|inner| inner.offline_queue_count)
            .unwrap_or(0)
    }

    pub fn is_online(&self) -> bool {
        self.read_inner().map(|inner| inner.is_online).unwrap_or(false)
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.read_inner()
            .map(|inner| inner.sync_status)
            .unwrap_or_default()
    }

    pub fn storage_usage(&self) -> u64 {
        self.read_inner()
            .map(|inner| inner.storage_usage)
            .unwrap_or(0)
    }

    pub fn session(&self) -> Session {
        self.read_inner()
            .map(|inner| inner.session.clone())
            .unwrap_or_default()
    }

    /// Default export location under the configured data directory.
    pub fn exports_dir(&self) -> PathBuf {
        config::exports_dir(&self.config.data_dir)
    }
}

/// Ids follow the wall clock in milliseconds and never repeat or go back.
fn next_report_id(inner: &mut StateInner) -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let id = now.max(inner.last_report_id + 1);
    inner.last_report_id = id;
    id
}

fn validate_new_report(data: &NewSymptomReport) -> Result<(), CoreError> {
    if data.village.trim().is_empty() {
        return Err(CoreError::Validation("Village is required".into()));
    }
    if data.symptoms.trim().is_empty() {
        return Err(CoreError::Validation("Symptoms are required".into()));
    }
    if data.village.chars().count() > MAX_VILLAGE_LEN {
        return Err(CoreError::Validation("Village name too long".into()));
    }
    if data.symptoms.chars().count() > MAX_SYMPTOMS_LEN {
        return Err(CoreError::Validation("Symptom description too long".into()));
    }
    let notes_len = |n: &Option<String>| n.as_ref().map_or(0, |s| s.chars().count());
    if notes_len(&data.notes) > MAX_NOTES_LEN || notes_len(&data.notes_en) > MAX_NOTES_LEN {
        return Err(CoreError::Validation(format!(
            "Notes must be {MAX_NOTES_LEN} characters or fewer"
        )));
    }
    Ok(())
}

fn validate_tip(draft: &TipDraft) -> Result<(), CoreError> {
    if draft.title.trim().is_empty() {
        return Err(CoreError::Validation("Tip title is required".into()));
    }
    if draft.steps.iter().any(|s| s.trim().is_empty()) {
        return Err(CoreError::Validation("Tip steps cannot be blank".into()));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Connectivity subscription
// ═══════════════════════════════════════════════════════════

/// Running connectivity listener. Dropping it signals the listener to stop.
pub struct ConnectivitySubscription {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ConnectivitySubscription {
    fn new(shutdown_tx: oneshot::Sender<()>, handle: JoinHandle<()>) -> Self {
        Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    fn signal(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Signal the listener and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.signal();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ConnectivitySubscription {
    fn drop(&mut self) {
        self.signal();
    }
}

// ═══════════════════════════════════════════════════════════
// Error types
// ═══════════════════════════════════════════════════════════

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("This action requires the {0} role")]
    Forbidden(UserRole),
    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: &'static str, id: String },
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Log(#[from] LogError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Internal lock error")]
    LockPoisoned,
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OFFLINE_QUEUE_KEY, REPORTS_KEY};
    use crate::connectivity::ConnectivitySignal;
    use crate::db::SqliteStore;
    use crate::persistence::tests::BrokenStore;
    use crate::sync::NoDelay;
    use std::time::{Duration, Instant};

    fn test_config(delay_ms: u64, display_ms: u64) -> AppConfig {
        AppConfig {
            data_dir: std::env::temp_dir(),
            sync_delay: Duration::from_millis(delay_ms),
            synced_display: Duration::from_millis(display_ms),
            storage_quota_bytes: None,
        }
    }

    fn memory_store() -> Arc<SqliteStore> {
        Arc::new(SqliteStore::in_memory(None).unwrap())
    }

    /// Container over a fresh in-memory store with zero-length delays.
    fn state_with(store: Arc<SqliteStore>, seed: SeedData) -> Arc<CoreState> {
        Arc::new(CoreState::with_sync_delay(
            store,
            test_config(0, 0),
            seed,
            Arc::new(NoDelay),
        ))
    }

    fn empty_state() -> Arc<CoreState> {
        state_with(memory_store(), SeedData::empty())
    }

    fn online_state() -> Arc<CoreState> {
        let state = empty_state();
        state.set_online_flag(true);
        state
    }

    fn ziro_fever() -> NewSymptomReport {
        NewSymptomReport::new("Ziro", "Fever")
    }

    fn stored_reports(state: &CoreState) -> Vec<SymptomReport> {
        state.reports.get_stored_reports(&[])
    }

    fn drain_events(rx: &mut broadcast::Receiver<StateEvent>) -> Vec<StateEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn statuses(events: &[StateEvent]) -> Vec<SyncStatus> {
        events
            .iter()
            .filter_map(|e| match e {
                StateEvent::SyncStatusChanged(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    async fn wait_for_status(rx: &mut broadcast::Receiver<StateEvent>, want: SyncStatus) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(StateEvent::SyncStatusChanged(s)) = rx.recv().await {
                    if s == want {
                        return;
                    }
                }
            }
        })
        .await
        .expect("status not reached in time");
    }

    // ── Mount ───────────────────────────────────────────────

    #[test]
    fn mount_seeds_empty_store_and_persists_it() {
        let store = memory_store();
        let state = state_with(store.clone(), SeedData::defaults());

        assert_eq!(state.symptoms(), crate::seed::default_reports());
        assert_eq!(state.tips(), crate::seed::default_tips());
        assert!(store.get(REPORTS_KEY).unwrap().is_some());
        assert!(state.storage_usage() > 0);
    }

    #[test]
    fn mount_prefers_persisted_reports_over_seed() {
        let store = memory_store();
        let first = state_with(store.clone(), SeedData::empty());
        first.set_online_flag(true);
        first.report_symptom(ziro_fever()).unwrap();

        let second = state_with(store, SeedData::defaults());
        assert_eq!(second.symptoms().len(), 1);
        assert_eq!(second.symptoms()[0].village, "Ziro");
    }

    #[test]
    fn mount_reads_queue_length() {
        let store = memory_store();
        let first = state_with(store.clone(), SeedData::empty());
        first.report_symptom(ziro_fever()).unwrap();
        first.report_symptom(ziro_fever()).unwrap();

        let second = state_with(store, SeedData::empty());
        assert_eq!(second.offline_queue_count(), 2);
        assert!(!second.is_online());
        assert_eq!(second.sync_status(), SyncStatus::Idle);
    }

    #[test]
    fn mount_over_broken_store_still_works() {
        let state = CoreState::with_sync_delay(
            Arc::new(BrokenStore),
            test_config(0, 0),
            SeedData::defaults(),
            Arc::new(NoDelay),
        );
        assert_eq!(state.symptoms(), crate::seed::default_reports());
        assert_eq!(state.storage_usage(), 0);
    }

    // ── Reporting ───────────────────────────────────────────

    #[test]
    fn online_report_goes_to_front_of_store() {
        let state = state_with(memory_store(), SeedData::defaults());
        state.set_online_flag(true);

        let receipt = state.report_symptom(ziro_fever()).unwrap();
        assert_eq!(receipt.route, ReportRoute::Stored);

        let stored = stored_reports(&state);
        assert_eq!(stored[0].id, receipt.report.id);
        assert_eq!(stored.len(), crate::seed::default_reports().len() + 1);
        assert_eq!(state.offline_queue_count(), 0);
    }

    #[test]
    fn offline_report_only_reaches_queue() {
        let state = empty_state();
        let before = stored_reports(&state);

        let receipt = state.report_symptom(ziro_fever()).unwrap();
        assert_eq!(receipt.route, ReportRoute::Queued);
        assert_eq!(stored_reports(&state), before);
        assert!(state.symptoms().is_empty());
        assert_eq!(state.queued_reports(), vec![receipt.report]);
        assert_eq!(state.offline_queue_count(), 1);

        state.report_symptom(ziro_fever()).unwrap();
        assert_eq!(state.offline_queue_count(), 2);
    }

    #[test]
    fn report_ids_strictly_increase() {
        let state = online_state();
        let a = state.report_symptom(ziro_fever()).unwrap().report.id;
        let b = state.report_symptom(ziro_fever()).unwrap().report.id;
        let c = state.report_symptom(ziro_fever()).unwrap().report.id;
        assert!(a < b && b < c);
    }

    #[test]
    fn new_report_is_stamped_just_now_and_unresolved() {
        let state = online_state();
        let report = state.report_symptom(ziro_fever()).unwrap().report;
        assert_eq!(report.reported_at, "Just now");
        assert!(!report.resolved);
    }

    #[test]
    fn report_requires_village_and_symptoms() {
        let state = online_state();
        let err = state.report_symptom(NewSymptomReport::new("  ", "Fever")).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        let err = state.report_symptom(NewSymptomReport::new("Ziro", "")).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(state.symptoms().is_empty());
    }

    #[test]
    fn report_recomputes_usage() {
        let state = empty_state();
        let before = state.storage_usage();
        state.report_symptom(ziro_fever()).unwrap();
        assert!(state.storage_usage() > before);
    }

    // ── Resolve ─────────────────────────────────────────────

    #[test]
    fn resolve_requires_health_worker() {
        let state = online_state();
        let id = state.report_symptom(ziro_fever()).unwrap().report.id;

        assert!(matches!(
            state.resolve_symptom(id),
            Err(CoreError::Forbidden(UserRole::HealthWorker))
        ));
        state.login(UserRole::Villager, None).unwrap();
        assert!(matches!(state.resolve_symptom(id), Err(CoreError::Forbidden(_))));
        assert!(!state.symptoms()[0].resolved);
    }

    #[test]
    fn resolve_is_idempotent_and_persisted() {
        let state = online_state();
        let id = state.report_symptom(ziro_fever()).unwrap().report.id;
        state.report_symptom(NewSymptomReport::new("Tezu", "Rash")).unwrap();
        state.login(UserRole::HealthWorker, None).unwrap();

        assert!(state.resolve_symptom(id).unwrap().resolved);
        assert!(state.resolve_symptom(id).unwrap().resolved);

        let stored = stored_reports(&state);
        let resolved: Vec<bool> = stored.iter().map(|r| r.resolved).collect();
        assert_eq!(resolved, vec![false, true]);
    }

    #[test]
    fn resolve_unknown_id_is_not_found() {
        let state = online_state();
        state.login(UserRole::HealthWorker, None).unwrap();
        assert!(matches!(
            state.resolve_symptom(12345),
            Err(CoreError::NotFound { .. })
        ));
    }

    // ── Sync ────────────────────────────────────────────────

    #[tokio::test]
    async fn sync_with_empty_queue_does_nothing() {
        let state = online_state();
        let mut rx = state.subscribe();
        let outcome = state.sync_offline_queue().await.unwrap();
        assert_eq!(outcome, SyncOutcome::NothingToSync);
        assert!(statuses(&drain_events(&mut rx)).is_empty());
        assert_eq!(state.sync_status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn sync_prepends_queue_in_fifo_order() {
        let state = state_with(memory_store(), SeedData::defaults());
        let previous = state.symptoms();

        let a = state.report_symptom(NewSymptomReport::new("A", "Fever")).unwrap().report;
        let b = state.report_symptom(NewSymptomReport::new("B", "Fever")).unwrap().report;
        let c = state.report_symptom(NewSymptomReport::new("C", "Fever")).unwrap().report;

        state.set_online_flag(true);
        let outcome = state.sync_offline_queue().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Synced { merged: 3 });

        let mut expected = vec![a, b, c];
        expected.extend(previous);
        assert_eq!(state.symptoms(), expected);
        assert_eq!(stored_reports(&state), expected);
        assert!(state.queued_reports().is_empty());
        assert_eq!(state.offline_queue_count(), 0);
    }

    #[tokio::test]
    async fn sync_clears_queue_key() {
        let store = memory_store();
        let state = state_with(store.clone(), SeedData::empty());
        state.report_symptom(ziro_fever()).unwrap();
        assert!(store.get(OFFLINE_QUEUE_KEY).unwrap().is_some());

        state.sync_offline_queue().await.unwrap();
        assert!(store.get(OFFLINE_QUEUE_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn sync_emits_status_sequence() {
        let state = empty_state();
        state.report_symptom(ziro_fever()).unwrap();
        let mut rx = state.subscribe();

        assert_eq!(state.sync_status(), SyncStatus::Idle);
        state.sync_offline_queue().await.unwrap();

        let seen = statuses(&drain_events(&mut rx));
        assert_eq!(
            seen,
            vec![SyncStatus::Syncing, SyncStatus::Synced, SyncStatus::Idle]
        );
        assert_eq!(state.sync_status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn syncing_lasts_at_least_the_drain_delay() {
        let state = Arc::new(CoreState::new(
            memory_store(),
            test_config(80, 10),
            SeedData::empty(),
        ));
        state.report_symptom(ziro_fever()).unwrap();
        let mut rx = state.subscribe();

        let task = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.sync_offline_queue().await })
        };

        wait_for_status(&mut rx, SyncStatus::Syncing).await;
        let entered = Instant::now();
        assert_eq!(state.sync_status(), SyncStatus::Syncing);
        assert_eq!(state.offline_queue_count(), 1);

        wait_for_status(&mut rx, SyncStatus::Synced).await;
        assert!(entered.elapsed() >= Duration::from_millis(70));

        task.await.unwrap().unwrap();
        assert_eq!(state.sync_status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn second_trigger_while_syncing_is_ignored() {
        let state = Arc::new(CoreState::new(
            memory_store(),
            test_config(100, 0),
            SeedData::empty(),
        ));
        state.report_symptom(ziro_fever()).unwrap();
        let mut rx = state.subscribe();

        let first = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.sync_offline_queue().await })
        };
        wait_for_status(&mut rx, SyncStatus::Syncing).await;

        let second = state.sync_offline_queue().await.unwrap();
        assert_eq!(second, SyncOutcome::AlreadyInFlight);

        assert_eq!(first.await.unwrap().unwrap(), SyncOutcome::Synced { merged: 1 });
        assert_eq!(state.symptoms().len(), 1, "report must not be duplicated");
    }

    #[tokio::test]
    async fn report_queued_during_drain_is_merged_not_lost() {
        let state = Arc::new(CoreState::new(
            memory_store(),
            test_config(80, 0),
            SeedData::empty(),
        ));
        let first = state.report_symptom(NewSymptomReport::new("A", "Fever")).unwrap().report;
        let mut rx = state.subscribe();

        let task = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.sync_offline_queue().await })
        };
        wait_for_status(&mut rx, SyncStatus::Syncing).await;
        // Still offline, so this one is queued mid-drain
        let late = state.report_symptom(NewSymptomReport::new("B", "Rash")).unwrap().report;

        assert_eq!(task.await.unwrap().unwrap(), SyncOutcome::Synced { merged: 2 });
        assert_eq!(state.symptoms(), vec![first, late]);
        assert_eq!(state.offline_queue_count(), 0);
    }

    // ── Connectivity lifecycle ──────────────────────────────

    #[tokio::test]
    async fn example_scenario_offline_then_online() {
        let state = empty_state();
        let signal = ConnectivitySignal::new(false);
        assert!(state.init(signal.subscribe()).is_none());
        let mut rx = state.subscribe();

        let report = state
            .report_symptom(NewSymptomReport::new("Ziro", "Fever"))
            .unwrap()
            .report;
        assert_eq!(state.queued_reports(), vec![report.clone()]);
        assert_eq!(state.offline_queue_count(), 1);
        assert!(stored_reports(&state).is_empty());

        signal.set_online(true);
        wait_for_status(&mut rx, SyncStatus::Idle).await;

        assert!(state.is_online());
        assert_eq!(stored_reports(&state), vec![report]);
        assert!(state.queued_reports().is_empty());
        assert_eq!(state.offline_queue_count(), 0);

        let seen = statuses(&drain_events(&mut rx));
        assert!(seen.is_empty(), "only one sync cycle expected, saw {seen:?}");
        state.dispose().await;
    }

    #[tokio::test]
    async fn init_while_online_drains_existing_queue() {
        let store = memory_store();
        let offline = state_with(store.clone(), SeedData::empty());
        offline.report_symptom(ziro_fever()).unwrap();
        drop(offline);

        let state = state_with(store, SeedData::empty());
        let mut rx = state.subscribe();
        let signal = ConnectivitySignal::new(true);
        let startup = state.init(signal.subscribe()).expect("online init drains");

        wait_for_status(&mut rx, SyncStatus::Idle).await;
        assert_eq!(startup.await.unwrap().unwrap(), SyncOutcome::Synced { merged: 1 });
        assert_eq!(state.symptoms().len(), 1);
        assert_eq!(state.offline_queue_count(), 0);
        state.dispose().await;
    }

    #[tokio::test]
    async fn going_offline_routes_new_reports_to_queue() {
        let state = empty_state();
        let signal = ConnectivitySignal::new(true);
        state.init(signal.subscribe());
        let mut rx = state.subscribe();

        signal.set_online(false);
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(StateEvent::ConnectivityChanged { online: false }) = rx.recv().await {
                    return;
                }
            }
        })
        .await
        .unwrap();

        let receipt = state.report_symptom(ziro_fever()).unwrap();
        assert_eq!(receipt.route, ReportRoute::Queued);
        state.dispose().await;
    }

    #[tokio::test]
    async fn dispose_stops_listening() {
        let state = empty_state();
        let signal = ConnectivitySignal::new(false);
        state.init(signal.subscribe());
        state.dispose().await;

        signal.set_online(true);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!state.is_online());

        // Second dispose is safe (no-op)
        state.dispose().await;
    }

    #[tokio::test]
    async fn listener_does_not_keep_state_alive() {
        let state = empty_state();
        let signal = ConnectivitySignal::new(false);
        state.init(signal.subscribe());

        let weak = Arc::downgrade(&state);
        drop(state);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn connectivity_change_returns_sync_handle_only_on_reconnect() {
        let state = empty_state();
        state.report_symptom(ziro_fever()).unwrap();

        assert!(state.handle_connectivity_change(false).is_none());
        let handle = state.handle_connectivity_change(true).expect("sync spawned");
        assert_eq!(handle.await.unwrap().unwrap(), SyncOutcome::Synced { merged: 1 });
        assert!(state.handle_connectivity_change(true).is_none());
    }

    // ── Health log ──────────────────────────────────────────

    #[tokio::test]
    async fn export_then_restore_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(memory_store(), SeedData::defaults());
        let exported = state.symptoms();

        let path = state.export_log(dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("health_log_") && name.ends_with(".json"));

        state.clear_log().unwrap();
        assert!(state.symptoms().is_empty());

        let count = state.restore_log(&path).await.unwrap();
        assert_eq!(count, exported.len());
        assert_eq!(state.symptoms(), exported);
        assert_eq!(stored_reports(&state), exported);
    }

    #[tokio::test]
    async fn restore_rejects_non_array_and_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"id": 1, "symptoms": "Fever"}"#).unwrap();

        let state = state_with(memory_store(), SeedData::defaults());
        let before = state.symptoms();

        let err = state.restore_log(&path).await.unwrap_err();
        assert!(matches!(err, CoreError::Log(LogError::NotAnArray)));
        assert!(err.to_string().starts_with("Invalid file format"));
        assert_eq!(state.symptoms(), before);
    }

    #[tokio::test]
    async fn restore_rejects_entry_missing_symptoms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"[{"id": 1, "symptoms": "Fever"}, {"id": 2, "village": "Ziro"}]"#)
            .unwrap();

        let state = state_with(memory_store(), SeedData::defaults());
        let before = state.symptoms();

        let err = state.restore_log(&path).await.unwrap_err();
        assert!(matches!(err, CoreError::Log(LogError::MissingField { .. })));
        assert_eq!(state.symptoms(), before);
        assert_eq!(stored_reports(&state), before);
    }

    #[tokio::test]
    async fn restore_missing_file_is_io_error() {
        let state = empty_state();
        let err = state
            .restore_log(Path::new("/nonexistent/health_log.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Log(LogError::Io(_))));
    }

    #[tokio::test]
    async fn restored_ids_keep_new_ids_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.json");
        let far_future = i64::MAX / 2;
        std::fs::write(&path, format!(r#"[{{"id": {far_future}, "symptoms": "Fever"}}]"#)).unwrap();

        let state = online_state();
        state.restore_log(&path).await.unwrap();
        let id = state.report_symptom(ziro_fever()).unwrap().report.id;
        assert!(id > far_future);
    }

    #[test]
    fn clear_wipes_reports_and_queue() {
        let state = state_with(memory_store(), SeedData::defaults());
        state.report_symptom(ziro_fever()).unwrap();
        assert_eq!(state.offline_queue_count(), 1);

        state.clear_log().unwrap();

        let seed = crate::seed::default_reports();
        assert!(state.reports.get_stored_reports(&seed).is_empty());
        assert!(state.queued_reports().is_empty());
        assert_eq!(state.offline_queue_count(), 0);
        assert!(state.symptoms().is_empty());
    }

    // ── Tips ────────────────────────────────────────────────

    fn draft(title: &str) -> TipDraft {
        TipDraft {
            icon: "droplet".into(),
            title: title.into(),
            description: "Keep the well covered.".into(),
            steps: vec!["Fit a lid".into()],
        }
    }

    #[test]
    fn tip_mutations_require_health_worker() {
        let state = empty_state();
        assert!(matches!(state.add_tip(draft("Cover wells")), Err(CoreError::Forbidden(_))));
        state.login(UserRole::Villager, None).unwrap();
        assert!(matches!(state.add_tip(draft("Cover wells")), Err(CoreError::Forbidden(_))));
        assert!(state.tips().is_empty());
    }

    #[test]
    fn tip_crud_overwrites_persisted_collection() {
        let store = memory_store();
        let state = state_with(store.clone(), SeedData::empty());
        state
            .login(
                UserRole::HealthWorker,
                Some(UserProfile {
                    name: "Asha".into(),
                    village: "Ziro".into(),
                    phone: None,
                }),
            )
            .unwrap();

        let tip = state.add_tip(draft("Cover wells")).unwrap();
        let updated = state.update_tip(&tip.id, draft("Cover wells and tanks")).unwrap();
        assert_eq!(updated.id, tip.id);

        let reloaded = state_with(store.clone(), SeedData::empty());
        assert_eq!(reloaded.tips(), vec![updated]);

        state.delete_tip(&tip.id).unwrap();
        assert!(state.tips().is_empty());
        assert!(matches!(state.delete_tip(&tip.id), Err(CoreError::NotFound { .. })));
        assert!(matches!(
            state.update_tip("missing", draft("x")),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn blank_tip_title_is_rejected() {
        let state = empty_state();
        state.login(UserRole::HealthWorker, None).unwrap();
        assert!(matches!(state.add_tip(draft(" ")), Err(CoreError::Validation(_))));
    }

    // ── Session ─────────────────────────────────────────────

    #[test]
    fn login_and_logout_update_session() {
        let state = empty_state();
        let mut rx = state.subscribe();
        assert!(!state.session().is_authenticated());

        state.login(UserRole::Villager, None).unwrap();
        assert!(state.session().has_role(UserRole::Villager));

        state.logout().unwrap();
        assert!(!state.session().is_authenticated());

        assert_eq!(
            drain_events(&mut rx),
            vec![
                StateEvent::SessionChanged { role: Some(UserRole::Villager) },
                StateEvent::SessionChanged { role: None },
            ]
        );
    }

    // ── Storage pressure ────────────────────────────────────

    #[tokio::test]
    async fn refused_commit_keeps_offline_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let queue_bytes = {
            let store = Arc::new(SqliteStore::open(&path, None).unwrap());
            let state = state_with(store.clone(), SeedData::empty());
            state.report_symptom(ziro_fever()).unwrap();
            let raw = store.get(OFFLINE_QUEUE_KEY).unwrap().unwrap();
            crate::db::utf16_byte_len(&raw)
        };

        // Room for "[]" reports, "[]" tips and the queue, but not for the
        // merged reports while the queue is still held
        let quota = 4 + 4 + queue_bytes + 2;
        let store = Arc::new(SqliteStore::open(&path, Some(quota)).unwrap());
        let state = state_with(store.clone(), SeedData::empty());
        assert_eq!(state.offline_queue_count(), 1);

        let err = state.sync_offline_queue().await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Storage(StorageError::QuotaExceeded { .. })
        ));
        assert_eq!(state.sync_status(), SyncStatus::Idle);
        assert_eq!(state.offline_queue_count(), 1);
        assert!(state.symptoms().is_empty());
        assert_eq!(store.get(REPORTS_KEY).unwrap().as_deref(), Some("[]"));
        assert_eq!(state.queued_reports().len(), 1);
        drop(state);
        drop(store);

        let reopened = state_with(
            Arc::new(SqliteStore::open(&path, None).unwrap()),
            SeedData::empty(),
        );
        assert_eq!(reopened.offline_queue_count(), 1);
        assert_eq!(
            reopened.sync_offline_queue().await.unwrap(),
            SyncOutcome::Synced { merged: 1 }
        );
        assert_eq!(reopened.symptoms().len(), 1);
    }

    #[tokio::test]
    async fn interrupted_commit_duplicates_instead_of_losing() {
        let store = memory_store();
        let previous = NewSymptomReport::new("Tezu", "Rash").into_report(1);
        let queued = NewSymptomReport::new("Ziro", "Fever").into_report(2);

        // Merged list written, queue key never removed
        let reports = vec![queued.clone(), previous.clone()];
        store
            .set(REPORTS_KEY, &serde_json::to_string(&reports).unwrap())
            .unwrap();
        store
            .set(OFFLINE_QUEUE_KEY, &serde_json::to_string(&[queued.clone()]).unwrap())
            .unwrap();

        let state = state_with(store.clone(), SeedData::defaults());
        assert_eq!(state.offline_queue_count(), 1);

        let outcome = state.sync_offline_queue().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Synced { merged: 1 });

        let stored = stored_reports(&state);
        assert_eq!(stored, vec![queued.clone(), queued.clone(), previous]);
        assert_eq!(stored.iter().filter(|r| r.id == queued.id).count(), 2);
        assert!(store.get(OFFLINE_QUEUE_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn dropped_enqueue_counter_resets_on_sync() {
        // Exactly the two "[]" collections written on mount
        let store = Arc::new(SqliteStore::in_memory(Some(8)).unwrap());
        let state = state_with(store, SeedData::empty());
        let mut rx = state.subscribe();

        let receipt = state.report_symptom(ziro_fever()).unwrap();
        assert_eq!(receipt.route, ReportRoute::Queued);
        assert_eq!(state.offline_queue_count(), 1);
        assert!(state.queued_reports().is_empty());

        assert_eq!(
            state.sync_offline_queue().await.unwrap(),
            SyncOutcome::NothingToSync
        );
        assert_eq!(state.offline_queue_count(), 0);
        assert_eq!(
            drain_events(&mut rx).last(),
            Some(&StateEvent::QueueChanged { count: 0 })
        );
    }

    #[test]
    fn quota_exceeded_write_is_absorbed() {
        // Room for the empty collections written on mount, not for a report
        let store = Arc::new(SqliteStore::in_memory(Some(16)).unwrap());
        let state = state_with(store.clone(), SeedData::empty());
        state.set_online_flag(true);

        let receipt = state.report_symptom(ziro_fever()).unwrap();
        assert_eq!(state.symptoms(), vec![receipt.report]);
        // The in-memory mirror has it, the store silently does not
        assert_eq!(store.get(REPORTS_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn core_error_display() {
        assert_eq!(CoreError::LockPoisoned.to_string(), "Internal lock error");
        assert_eq!(
            CoreError::Forbidden(UserRole::HealthWorker).to_string(),
            "This action requires the health_worker role"
        );
    }
}
