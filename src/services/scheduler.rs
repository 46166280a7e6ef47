//! Background reconciliation loop.
//!
//! A scheduler watches one population of installations (a [`StalenessProfile`]),
//! sweeps it on every tick for installations whose readings are stale, and
//! reconciles new installations as soon as the change feed announces them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::staleness::select_due;
use crate::domain::models::{
    ChangeEvent, ChangeFilter, ChangeKind, InstallationStatus, SchedulerConfig, StalenessProfile,
};
use crate::domain::ports::{ChangeFeed, InstallationFilters, InstallationRepository};
use crate::services::reconciliation::{ReconcileOutcome, ReconcileReport, ReconciliationEngine};
use crate::services::single_flight::SingleFlight;

/// Result of one scheduled attempt.
#[derive(Debug, Clone)]
pub enum Attempt {
    Completed(ReconcileReport),
    /// Another attempt for the same installation is still running
    AlreadyInFlight,
}

/// Tally of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub considered: usize,
    pub due: usize,
    pub classified: usize,
    pub no_data: usize,
    pub deferred: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SweepSummary {
    fn record(&mut self, result: &DomainResult<Attempt>) {
        match result {
            Ok(Attempt::Completed(report)) => match report.outcome {
                ReconcileOutcome::Classified { .. } => self.classified += 1,
                ReconcileOutcome::NoData => self.no_data += 1,
                ReconcileOutcome::Deferred { .. } => self.deferred += 1,
                ReconcileOutcome::AlreadyVerified => self.skipped += 1,
            },
            Ok(Attempt::AlreadyInFlight) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Handle to stop a running scheduler
///
/// Stopping prevents new ticks; attempts already running finish normally.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
}

impl SchedulerHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token observed by the scheduler loop, for tying it to a parent scope.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

pub struct ReconciliationScheduler {
    engine: Arc<ReconciliationEngine>,
    installations: Arc<dyn InstallationRepository>,
    feed: Arc<dyn ChangeFeed>,
    profile: StalenessProfile,
    tick: Duration,
    max_concurrent: usize,
    flights: SingleFlight<Uuid>,
    cancel: CancellationToken,
}

impl ReconciliationScheduler {
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        installations: Arc<dyn InstallationRepository>,
        feed: Arc<dyn ChangeFeed>,
        profile: StalenessProfile,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            engine,
            installations,
            feed,
            profile,
            tick: Duration::from_secs(config.tick_interval_secs.max(1)),
            max_concurrent: config.max_concurrent.max(1),
            flights: SingleFlight::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Share a single-flight registry with other schedulers in the process.
    pub fn with_flights(mut self, flights: SingleFlight<Uuid>) -> Self {
        self.flights = flights;
        self
    }

    /// Stop when `parent` is cancelled.
    pub fn with_parent_token(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            cancel: self.cancel.clone(),
        }
    }

    pub fn profile(&self) -> &StalenessProfile {
        &self.profile
    }

    pub fn flights(&self) -> &SingleFlight<Uuid> {
        &self.flights
    }

    /// Reconcile one installation unless an attempt for it is already running.
    pub async fn attempt(&self, id: Uuid) -> DomainResult<Attempt> {
        let Some(_guard) = self.flights.try_acquire(id) else {
            debug!(installation_id = %id, "reconciliation already in flight");
            return Ok(Attempt::AlreadyInFlight);
        };
        let report = self.engine.reconcile(id).await?;
        Ok(Attempt::Completed(report))
    }

    fn candidate_filters(&self) -> InstallationFilters {
        match &self.profile {
            StalenessProfile::InstallerSession { installer_id, .. } => InstallationFilters {
                status: Some(InstallationStatus::Pending),
                installed_by: Some(installer_id.clone()),
                ..Default::default()
            },
            StalenessProfile::Dashboard { team_id, .. } => InstallationFilters {
                team_id: team_id.clone(),
                ..InstallationFilters::non_terminal()
            },
        }
    }

    fn feed_filter(&self) -> ChangeFilter {
        let (team_id, installed_by) = match &self.profile {
            StalenessProfile::InstallerSession { installer_id, .. } => {
                (None, Some(installer_id.clone()))
            }
            StalenessProfile::Dashboard { team_id, .. } => (team_id.clone(), None),
        };
        ChangeFilter {
            kinds: vec![ChangeKind::InstallationCreated],
            team_id,
            installed_by,
        }
    }

    /// Reconcile every in-scope installation that is due, with bounded concurrency.
    #[instrument(skip(self), fields(profile = self.profile.name()), err)]
    pub async fn sweep(&self) -> DomainResult<SweepSummary> {
        let candidates = self.installations.list(self.candidate_filters()).await?;
        let in_scope: Vec<_> = candidates
            .into_iter()
            .filter(|i| self.profile.in_scope(i))
            .collect();
        let due: Vec<Uuid> = select_due(&in_scope, Utc::now(), self.profile.window())
            .into_iter()
            .map(|i| i.id)
            .collect();

        let mut summary = SweepSummary {
            considered: in_scope.len(),
            due: due.len(),
            ..Default::default()
        };

        let results: Vec<DomainResult<Attempt>> = stream::iter(due)
            .map(|id| self.attempt(id))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        for result in &results {
            if let Err(e) = result {
                warn!(error = %e, "scheduled reconciliation failed");
            }
            summary.record(result);
        }

        debug!(?summary, "sweep finished");
        Ok(summary)
    }

    /// Run until the handle is stopped.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events = self.feed.subscribe(self.feed_filter());
        let mut feed_open = true;

        info!(profile = self.profile.name(), tick = ?self.tick, "reconciliation scheduler started");
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!(profile = self.profile.name(), "reconciliation scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "reconciliation sweep failed");
                    }
                }
                event = events.next(), if feed_open => {
                    match event {
                        Some(ChangeEvent::InstallationCreated(installation))
                            if self.profile.in_scope(&installation) =>
                        {
                            let scheduler = Arc::clone(&self);
                            tokio::spawn(async move {
                                if let Err(e) = scheduler.attempt(installation.id).await {
                                    warn!(error = %e, "reconciliation of new installation failed");
                                }
                            });
                        }
                        Some(_) => {}
                        None => {
                            warn!("change feed closed; continuing with ticks only");
                            feed_open = false;
                        }
                    }
                }
            }
        }
    }

    /// Spawn [`ReconciliationScheduler::run`] on the runtime.
    pub fn spawn(self: Arc<Self>) -> (SchedulerHandle, JoinHandle<()>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }
}
