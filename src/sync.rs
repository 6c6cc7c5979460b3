//! Offline queue drain: moves reports captured without connectivity into the
//! report store once the device is back online.
//!
//! The coordinator owns the timing and the re-entrancy guard; the state
//! container owns the data and drives the status machine:
//!
//! `idle → syncing` (trigger) `→ synced` (after the drain delay, once the merge
//! is committed) `→ idle` (after the display delay, cosmetic only).
//!
//! The drain delay stands in for a backend round-trip. It is injected through
//! [`SyncDelay`] so tests can run with [`NoDelay`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::config::AppConfig;
use crate::models::SymptomReport;

// ═══════════════════════════════════════════════════════════════════════════
// Delay strategy
// ═══════════════════════════════════════════════════════════════════════════

/// How the coordinator waits out its delays.
pub trait SyncDelay: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Real wall-clock waits on the tokio timer.
pub struct TokioDelay;

impl SyncDelay for TokioDelay {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Completes immediately regardless of the requested duration.
pub struct NoDelay;

impl SyncDelay for NoDelay {
    fn sleep(&self, _duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(futures_util::future::ready(()))
    }
}

/// Delays applied around a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimings {
    /// Wait between entering `syncing` and committing the merge.
    pub drain_delay: Duration,
    /// How long `synced` stays visible before returning to `idle`.
    pub synced_display: Duration,
}

impl SyncTimings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            drain_delay: config.sync_delay,
            synced_display: config.synced_display,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Outcome
// ═══════════════════════════════════════════════════════════════════════════

/// What a sync trigger ended up doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Queue was empty at the check; status untouched.
    NothingToSync,
    /// Another drain was still running; this trigger was ignored.
    AlreadyInFlight,
    /// Queue merged into the report store.
    Synced { merged: usize },
}

// ═══════════════════════════════════════════════════════════════════════════
// Coordinator
// ═══════════════════════════════════════════════════════════════════════════

pub struct SyncCoordinator {
    delay: Arc<dyn SyncDelay>,
    timings: SyncTimings,
    in_flight: AtomicBool,
    /// Bumped on every drain that starts; lets a stale display timer see
    /// that a newer drain has taken over the status.
    generation: AtomicU64,
}

impl SyncCoordinator {
    pub fn new(delay: Arc<dyn SyncDelay>, timings: SyncTimings) -> Self {
        Self {
            delay,
            timings,
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    pub fn timings(&self) -> SyncTimings {
        self.timings
    }

    /// Whether a drain is between its trigger and its commit.
    #[cfg(test)]
    fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Claim the coordinator for one drain. `None` while another drain holds it.
    pub fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        Some(InFlightGuard {
            flag: &self.in_flight,
            generation,
        })
    }

    /// Simulated backend round-trip before the merge commits.
    pub async fn wait_drain(&self) {
        self.delay.sleep(self.timings.drain_delay).await;
    }

    /// Display window for the `synced` status.
    pub async fn wait_synced_display(&self) {
        self.delay.sleep(self.timings.synced_display).await;
    }
}

/// Holds the coordinator's in-flight flag; released on drop.
pub struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    generation: u64,
}

impl InFlightGuard<'_> {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Queued reports go in front of the existing ones, in their queued order,
/// so the oldest offline report sits right before the previous newest.
/// No deduplication.
pub fn merge_queued(queued: Vec<SymptomReport>, existing: &[SymptomReport]) -> Vec<SymptomReport> {
    let mut merged = queued;
    merged.extend_from_slice(existing);
    merged
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
