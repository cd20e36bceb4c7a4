//! Timers around the periodic checks: an hourly loop gated on startup
//! readiness and connectivity, and a debouncer for recomputation bursts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::periodic_checks::{CheckReport, PeriodicChecksService};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub check_interval: Duration,
    pub debounce: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60 * 60),
            debounce: Duration::from_millis(500),
        }
    }
}

/// Decides when a periodic check may run.
///
/// The first run waits for both the UI and the storage sync to report
/// ready. While offline, runs are suppressed and at most one is queued
/// for when connectivity returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckGate {
    ui_ready: bool,
    storage_synced: bool,
    offline: bool,
    deferred: bool,
}

impl CheckGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ui_ready && self.storage_synced
    }

    pub fn has_deferred_run(&self) -> bool {
        self.deferred
    }

    /// Returns `true` when this completes readiness and a run should start.
    pub fn mark_ui_ready(&mut self) -> bool {
        let was_ready = self.is_ready();
        self.ui_ready = true;
        self.became_ready(was_ready)
    }

    /// Returns `true` when this completes readiness and a run should start.
    pub fn mark_storage_synced(&mut self) -> bool {
        let was_ready = self.is_ready();
        self.storage_synced = true;
        self.became_ready(was_ready)
    }

    /// Returns `true` when going back online releases the deferred run.
    pub fn set_offline(&mut self, offline: bool) -> bool {
        self.offline = offline;
        if !offline && self.deferred && self.is_ready() {
            self.deferred = false;
            return true;
        }
        false
    }

    /// Whether a timer tick or manual trigger may run now.
    pub fn request_run(&mut self) -> bool {
        if !self.is_ready() {
            return false;
        }
        if self.offline {
            self.deferred = true;
            return false;
        }
        true
    }

    fn became_ready(&mut self, was_ready: bool) -> bool {
        !was_ready && self.is_ready() && self.request_run()
    }
}

/// Inputs to a running [`PeriodicScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerSignal {
    UiReady,
    StorageSynced,
    Offline(bool),
    RunNow,
}

/// Runs [`PeriodicChecksService::run`] on a fixed interval.
pub struct PeriodicScheduler {
    checks: Arc<PeriodicChecksService>,
    config: SchedulerConfig,
    reports: broadcast::Sender<CheckReport>,
}

/// Control side of a spawned scheduler. Dropping it stops the loop.
pub struct SchedulerHandle {
    signals: mpsc::UnboundedSender<SchedulerSignal>,
    reports: broadcast::Sender<CheckReport>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn send(&self, signal: SchedulerSignal) {
        // The loop only exits once every handle is gone.
        let _ = self.signals.send(signal);
    }

    pub fn ui_ready(&self) {
        self.send(SchedulerSignal::UiReady);
    }

    pub fn storage_synced(&self) {
        self.send(SchedulerSignal::StorageSynced);
    }

    pub fn set_offline(&self, offline: bool) {
        self.send(SchedulerSignal::Offline(offline));
    }

    pub fn run_now(&self) {
        self.send(SchedulerSignal::RunNow);
    }

    /// Reports of every completed run.
    pub fn subscribe(&self) -> broadcast::Receiver<CheckReport> {
        self.reports.subscribe()
    }

    /// Stop the loop and wait for an in-flight run to finish.
    pub async fn shutdown(self) {
        drop(self.signals);
        let _ = self.task.await;
    }
}

impl PeriodicScheduler {
    pub fn new(checks: Arc<PeriodicChecksService>, config: SchedulerConfig) -> Self {
        let (reports, _) = broadcast::channel(16);
        Self {
            checks,
            config,
            reports,
        }
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (signals, rx) = mpsc::unbounded_channel();
        let reports = self.reports.clone();
        let task = tokio::spawn(self.run(rx));
        SchedulerHandle {
            signals,
            reports,
            task,
        }
    }

    async fn run(self, mut signals: mpsc::UnboundedReceiver<SchedulerSignal>) {
        let period = self.config.check_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut gate = CheckGate::new();
        tracing::info!(interval = ?period, "periodic scheduler started");

        loop {
            let should_run = tokio::select! {
                _ = ticker.tick() => gate.request_run(),
                signal = signals.recv() => match signal {
                    Some(SchedulerSignal::UiReady) => gate.mark_ui_ready(),
                    Some(SchedulerSignal::StorageSynced) => gate.mark_storage_synced(),
                    Some(SchedulerSignal::Offline(offline)) => gate.set_offline(offline),
                    Some(SchedulerSignal::RunNow) => gate.request_run(),
                    None => {
                        tracing::info!("periodic scheduler shutting down");
                        return;
                    }
                },
            };

            if should_run {
                self.run_checks().await;
            } else if gate.has_deferred_run() {
                tracing::debug!("offline, periodic check deferred");
            }
        }
    }

    async fn run_checks(&self) {
        match self.checks.run().await {
            Ok(report) => {
                let _ = self.reports.send(report);
            }
            Err(e) => tracing::error!(error = %e, "periodic check failed"),
        }
    }
}

/// Coalesces bursts of triggers into one call of `action`, fired once no
/// trigger has arrived for the debounce delay. A run already in progress is
/// not cancelled.
pub struct Debouncer {
    tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl Debouncer {
    pub fn spawn<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let task = tokio::spawn(async move {
            let mut pending = false;
            loop {
                if pending {
                    tokio::select! {
                        msg = rx.recv() => {
                            if msg.is_none() {
                                action().await;
                                return;
                            }
                        }
                        _ = tokio::time::sleep(delay) => {
                            pending = false;
                            action().await;
                        }
                    }
                } else {
                    match rx.recv().await {
                        Some(()) => pending = true,
                        None => return,
                    }
                }
            }
        });
        Self { tx, task }
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Flush a pending trigger and stop.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.task.await;
    }
}
