//! Composition root: owns the shared state and the three periodic tasks
//! (refresh, reminder scan, rotation) and exposes the command surface a UI
//! shell drives.
//!
//! Every mutation of registry, override store, scheduler, or rotation state
//! happens under one `tokio::sync::Mutex`. Network I/O and notifier hand-off
//! run outside it so a slow fetch never stalls the other timers.
use chrono::{DateTime, Local, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::canvas::{AssignmentSource, FetchError};
use crate::config::Config;
use crate::display;
use crate::model::{Assignment, NotificationEvent};
use crate::notify::NotifierSink;
use crate::registry::AssignmentRegistry;
use crate::rotation::RotationController;
use crate::scheduler::NotificationScheduler;
use crate::store::{OverrideStore, StoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine has been shut down")]
    ShutDown,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Timer cadence and policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub horizon_days: u32,
    pub refresh_interval: Duration,
    pub notify_interval: Duration,
    pub rotation_interval: Duration,
    pub fetch_timeout: Duration,
    pub notify_dismissed: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            horizon_days: 14,
            refresh_interval: Duration::from_secs(30 * 60),
            notify_interval: Duration::from_secs(60),
            rotation_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(20),
            notify_dismissed: true,
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            horizon_days: cfg.app.days_ahead,
            refresh_interval: cfg.refresh_interval(),
            notify_interval: cfg.notify_interval(),
            rotation_interval: cfg.rotation_interval(),
            fetch_timeout: cfg.fetch_timeout(),
            notify_dismissed: cfg.app.notify_dismissed,
        }
    }
}

/// Outcome of the most recent fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Loading,
    Ready {
        fetched_at: DateTime<Utc>,
        count: usize,
    },
    Failed {
        at: DateTime<Utc>,
        error: FetchError,
    },
}

impl FetchStatus {
    /// Human-readable error for display, if the last fetch failed.
    pub fn error_message(&self) -> Option<String> {
        match self {
            FetchStatus::Failed { error, .. } => Some(error.to_string()),
            _ => None,
        }
    }
}

/// Consistent read of everything a UI shell renders, taken under one lock.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub active: Vec<(Assignment, String)>,
    pub dismissed: Vec<(Assignment, String)>,
    pub current: Option<Assignment>,
    pub status: FetchStatus,
}

struct State {
    registry: AssignmentRegistry,
    store: OverrideStore,
    scheduler: NotificationScheduler,
    rotation: RotationController,
    status: FetchStatus,
}

struct Inner {
    settings: EngineSettings,
    source: Arc<dyn AssignmentSource>,
    sink: Arc<dyn NotifierSink>,
    state: Mutex<State>,
    // Serializes reminder delivery so two scans never hand off the same key.
    delivery: Mutex<()>,
    refresh_requested: Notify,
    cancel: CancellationToken,
}

pub struct Engine {
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        source: Arc<dyn AssignmentSource>,
        sink: Arc<dyn NotifierSink>,
        store: OverrideStore,
    ) -> Self {
        let registry = AssignmentRegistry::new(store.map().clone());
        let scheduler = NotificationScheduler::new(settings.notify_dismissed);
        let state = State {
            registry,
            store,
            scheduler,
            rotation: RotationController::new(),
            status: FetchStatus::Loading,
        };
        Self {
            inner: Arc::new(Inner {
                settings,
                source,
                sink,
                state: Mutex::new(state),
                delivery: Mutex::new(()),
                refresh_requested: Notify::new(),
                cancel: CancellationToken::new(),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Spawn the refresh, reminder and rotation tasks. The first refresh runs
    /// immediately.
    pub async fn start(&self) -> Result<(), EngineError> {
        self.inner.ensure_running()?;
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            return Ok(());
        }

        let inner = self.inner.clone();
        tasks.push(tokio::spawn(async move { inner.refresh_loop().await }));

        let inner = self.inner.clone();
        let period = inner.settings.notify_interval;
        tasks.push(spawn_periodic(inner, period, "reminder", |inner| async move {
            if let Err(err) = inner.check_notifications_at(Utc::now()).await {
                debug!(%err, "reminder scan skipped");
            }
        }));

        let inner = self.inner.clone();
        let period = inner.settings.rotation_interval;
        tasks.push(spawn_periodic(inner, period, "rotation", |inner| async move {
            inner.rotate().await;
        }));

        info!(
            refresh = ?self.inner.settings.refresh_interval,
            reminders = ?self.inner.settings.notify_interval,
            rotation = ?self.inner.settings.rotation_interval,
            "engine started"
        );
        Ok(())
    }

    /// Stop all timers and wait for them to exit. An in-flight fetch that
    /// completes afterwards is discarded.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for res in futures::future::join_all(handles).await {
            if let Err(err) = res {
                warn!(?err, "engine task ended abnormally");
            }
        }
        info!("engine stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Ask the refresh task to fetch now instead of waiting for its timer.
    pub fn refresh_now(&self) {
        self.inner.refresh_requested.notify_one();
    }

    /// Fetch and replace the registry inline. Returns the new canonical count.
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        self.inner.refresh_at(now).await
    }

    /// Run one reminder scan; returns the events the sink accepted.
    pub async fn check_notifications_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationEvent>, EngineError> {
        self.inner.check_notifications_at(now).await
    }

    /// Advance the rotation pointer by one.
    pub async fn rotate(&self) {
        self.inner.rotate().await;
    }

    pub async fn active_view(&self) -> Vec<Assignment> {
        self.inner.state.lock().await.registry.active_view().to_vec()
    }

    pub async fn dismissed_view(&self) -> Vec<Assignment> {
        self.inner.state.lock().await.registry.dismissed_view().to_vec()
    }

    /// Display name for a known assignment id.
    pub async fn display_name(&self, id: &str) -> Option<String> {
        let st = self.inner.state.lock().await;
        st.registry.get(id).map(|a| st.registry.display_name(a))
    }

    /// Assignment currently in rotation, projected onto the live active view.
    pub async fn current(&self) -> Option<Assignment> {
        let mut st = self.inner.state.lock().await;
        let State {
            registry, rotation, ..
        } = &mut *st;
        rotation.current(registry.active_view()).cloned()
    }

    pub async fn status(&self) -> FetchStatus {
        self.inner.state.lock().await.status.clone()
    }

    pub async fn snapshot(&self) -> Snapshot {
        let mut st = self.inner.state.lock().await;
        let State {
            registry,
            rotation,
            status,
            ..
        } = &mut *st;
        let named = |list: &[Assignment]| {
            list.iter()
                .map(|a| (a.clone(), registry.display_name(a)))
                .collect::<Vec<_>>()
        };
        Snapshot {
            active: named(registry.active_view()),
            dismissed: named(registry.dismissed_view()),
            current: rotation.current(registry.active_view()).cloned(),
            status: status.clone(),
        }
    }

    /// Panel label for `now`, with day boundaries in the local time zone.
    pub async fn panel_text(&self, now: DateTime<Utc>) -> String {
        self.panel_text_in(now, &Local).await
    }

    pub async fn panel_text_in<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        let mut st = self.inner.state.lock().await;
        let State {
            registry,
            rotation,
            status,
            ..
        } = &mut *st;
        match rotation.current(registry.active_view()) {
            Some(a) => display::panel_label(
                &registry.display_name(a),
                &display::format_due_short(a.due_at, now, tz),
            ),
            None => match status {
                FetchStatus::Loading => display::LOADING_TEXT.to_string(),
                FetchStatus::Failed { .. } => display::FETCH_ERROR_TEXT.to_string(),
                FetchStatus::Ready { .. } => display::EMPTY_TEXT.to_string(),
            },
        }
    }

    pub async fn dismiss(&self, id: &str) -> Result<(), EngineError> {
        self.set_dismissed(id, true).await
    }

    pub async fn restore(&self, id: &str) -> Result<(), EngineError> {
        self.set_dismissed(id, false).await
    }

    #[instrument(skip(self))]
    async fn set_dismissed(&self, id: &str, dismissed: bool) -> Result<(), EngineError> {
        self.inner.ensure_running()?;
        let mut st = self.inner.state.lock().await;
        let res = st.store.set_dismissed(id, dismissed);
        st.resync_overrides();
        match res {
            Ok(changed) => {
                if changed {
                    info!(id, dismissed, "override updated");
                }
                Ok(())
            }
            Err(err) => {
                warn!(%err, id, "override kept in memory but not persisted");
                Err(err.into())
            }
        }
    }

    /// Set or clear the custom display name. Passing the computed default
    /// name clears the override as well.
    #[instrument(skip(self))]
    pub async fn set_custom_name(&self, id: &str, name: Option<&str>) -> Result<(), EngineError> {
        self.inner.ensure_running()?;
        let mut st = self.inner.state.lock().await;
        let name = name.map(str::trim).filter(|n| {
            st.registry
                .get(id)
                .map_or(true, |a| a.default_display_name() != *n)
        });
        let res = st.store.set_custom_name(id, name);
        st.resync_overrides();
        match res {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(%err, id, "custom name kept in memory but not persisted");
                Err(err.into())
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl State {
    fn resync_overrides(&mut self) {
        let map = self.store.map().clone();
        self.registry.apply_overrides(&map);
    }
}

impl Inner {
    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            Err(EngineError::ShutDown)
        } else {
            Ok(())
        }
    }

    async fn refresh_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.settings.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {}
                _ = self.refresh_requested.notified() => {
                    debug!("manual refresh requested");
                    interval.reset();
                }
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                res = self.refresh_at(Utc::now()) => {
                    if let Err(err) = res {
                        warn!(%err, "refresh failed; keeping previous assignments");
                    }
                }
            }
        }
        debug!("refresh task exiting");
    }

    #[instrument(skip_all)]
    async fn refresh_at(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        self.ensure_running()?;
        let timeout = self.settings.fetch_timeout;
        let fetched = match tokio::time::timeout(
            timeout,
            self.source.fetch(now, self.settings.horizon_days),
        )
        .await
        {
            Ok(res) => res,
            Err(_) => Err(FetchError::Timeout(timeout)),
        };

        let mut st = self.state.lock().await;
        // The engine may have been torn down while the request was in flight.
        self.ensure_running()?;
        match fetched {
            Ok(assignments) => {
                let count = assignments.len();
                st.registry.replace(assignments);
                st.status = FetchStatus::Ready {
                    fetched_at: now,
                    count,
                };
                info!(
                    count,
                    active = st.registry.active_view().len(),
                    "assignments refreshed"
                );
                Ok(count)
            }
            Err(error) => {
                st.status = FetchStatus::Failed {
                    at: now,
                    error: error.clone(),
                };
                Err(error.into())
            }
        }
    }

    async fn check_notifications_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationEvent>, EngineError> {
        self.ensure_running()?;
        let _delivery = self.delivery.lock().await;
        let pending = {
            let st = self.state.lock().await;
            st.scheduler.pending(now, &st.registry)
        };

        let mut delivered = Vec::with_capacity(pending.len());
        for item in pending {
            match self.sink.notify(&item.event).await {
                Ok(()) => {
                    self.state.lock().await.scheduler.mark_fired(item.key.clone());
                    info!(
                        id = %item.key.assignment_id,
                        threshold = item.key.threshold.as_str(),
                        "reminder delivered"
                    );
                    delivered.push(item.event);
                }
                Err(err) => {
                    warn!(
                        %err,
                        id = %item.key.assignment_id,
                        threshold = item.key.threshold.as_str(),
                        "reminder not delivered; will retry next scan"
                    );
                }
            }
        }
        Ok(delivered)
    }

    async fn rotate(&self) {
        let mut st = self.state.lock().await;
        let State {
            registry, rotation, ..
        } = &mut *st;
        rotation.tick(registry.active_view());
    }
}

fn spawn_periodic<F, Fut>(
    inner: Arc<Inner>,
    period: Duration,
    name: &'static str,
    mut f: F,
) -> JoinHandle<()>
where
    F: FnMut(Arc<Inner>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so the first run
        // happens one period after start.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = inner.cancel.cancelled() => break,
                _ = interval.tick() => f(inner.clone()).await,
            }
        }
        debug!(task = name, "periodic task exiting");
    })
}
