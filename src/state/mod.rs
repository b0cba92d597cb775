//! Shared State Module
//!
//! Live run progress, fed from the event bus. Workers never read it; it
//! exists for progress logging while the run is in flight.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::network::event_bus::spawn_event_handler;
use crate::network::{Event, EventBus};
use crate::utils::helpers::safe_div;

/// Progress of one worker as seen through its events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerProgress {
    pub planned: u32,
    pub successful: u32,
    pub failed: u32,
    pub volume: u64,
    pub finished: bool,
}

pub struct FleetProgress {
    pub workers: DashMap<usize, WorkerProgress>,
    pub total_workers: AtomicUsize,
    pub completed_workers: AtomicUsize,
    pub successful: AtomicU64,
    pub failed: AtomicU64,
    pub wallets_funded: AtomicU64,
    pub last_update: AtomicI64,
    pub shutdown_requested: RwLock<bool>,
}

impl FleetProgress {
    pub fn new(total_workers: usize) -> Self {
        Self {
            workers: DashMap::new(),
            total_workers: AtomicUsize::new(total_workers),
            completed_workers: AtomicUsize::new(0),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            wallets_funded: AtomicU64::new(0),
            last_update: AtomicI64::new(0),
            shutdown_requested: RwLock::new(false),
        }
    }

    pub fn apply(&self, event: &Event) {
        self.last_update
            .store(chrono::Utc::now().timestamp_millis(), Ordering::SeqCst);

        match event {
            Event::WorkerStarted { worker_id, planned, .. } => {
                self.workers.insert(
                    *worker_id,
                    WorkerProgress {
                        planned: *planned,
                        ..Default::default()
                    },
                );
            }
            Event::OperationFinished {
                worker_id,
                success,
                amount_in,
                ..
            } => {
                let mut entry = self.workers.entry(*worker_id).or_default();
                if *success {
                    entry.successful += 1;
                    entry.volume += amount_in;
                    self.successful.fetch_add(1, Ordering::SeqCst);
                } else {
                    entry.failed += 1;
                    self.failed.fetch_add(1, Ordering::SeqCst);
                }
            }
            Event::WorkerFinished { worker_id, .. } => {
                self.workers.entry(*worker_id).or_default().finished = true;
                self.completed_workers.fetch_add(1, Ordering::SeqCst);
            }
            Event::WalletFunded { .. } => {
                self.wallets_funded.fetch_add(1, Ordering::SeqCst);
            }
            Event::ShutdownRequested => {
                *self.shutdown_requested.write() = true;
            }
        }
    }

    pub fn completion_pct(&self) -> f64 {
        safe_div(
            self.completed_workers.load(Ordering::SeqCst) as f64,
            self.total_workers.load(Ordering::SeqCst) as f64,
        ) * 100.0
    }

    /// Success rate over operations finished so far
    pub fn overall_success_pct(&self) -> f64 {
        let ok = self.successful.load(Ordering::SeqCst) as f64;
        let failed = self.failed.load(Ordering::SeqCst) as f64;
        safe_div(ok, ok + failed) * 100.0
    }

    pub fn snapshot(&self, worker_id: usize) -> Option<WorkerProgress> {
        self.workers.get(&worker_id).map(|p| p.clone())
    }
}

/// Log a progress line every time a worker finishes
pub fn spawn_progress_monitor(bus: &EventBus, progress: Arc<FleetProgress>) -> JoinHandle<()> {
    spawn_event_handler(bus, "progress", move |event| {
        let progress = progress.clone();
        async move {
            progress.apply(&event);
            if let Event::WorkerFinished {
                worker_id,
                successful,
                failed,
                ..
            } = event
            {
                info!(
                    "Worker {} completed: {} ok / {} failed | Progress: {}/{} ({:.1}%) | Overall success: {:.1}%",
                    worker_id,
                    successful,
                    failed,
                    progress.completed_workers.load(Ordering::SeqCst),
                    progress.total_workers.load(Ordering::SeqCst),
                    progress.completion_pct(),
                    progress.overall_success_pct()
                );
            }
        }
    })
}
