//! Control loop driving every stored `ApprovalRequest` toward its desired state.
//!
//! Keys enter the [`WorkQueue`] from the resync task (new generations), from
//! [`ControllerHandle::notify`], and from requeues after each attempt. A pool
//! of workers pulls keys and runs one reconciliation attempt per key.

mod backoff;
mod queue;


pub use backoff::ItemBackoff;
pub use queue::WorkQueue;

use crate::config::Config;
use crate::connector::{Connector, ProviderConnector};
use crate::diagnostics::health;
use crate::error::{ReconcileError, StoreError};
use crate::observability::{Observer, ObserverEvent, ObserverMetric, create_observer};
use crate::reconciler::ApprovalRequestExternal;
use crate::resource::{
    ApprovalRequest, ApprovalRequestStatus, DeletionPolicy, SyncCondition, set_synced,
};
use crate::store::{FileStore, StateStore};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

const COMPONENT: &str = "controller";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The record no longer exists in the store.
    Gone,
    /// Deletion finished and the record was discarded.
    Finalized,
    /// Archive was issued; the next attempt confirms it.
    Deleting,
    Created,
    /// The external entity was archived by someone else and is not re-created.
    ArchivedExternally,
    Observed,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub workers: usize,
    pub poll_interval: Duration,
    pub reconcile_timeout: Duration,
    pub resync_interval: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.controller.workers.max(1),
            poll_interval: Duration::from_secs(config.controller.poll_interval_secs),
            reconcile_timeout: Duration::from_secs(config.controller.reconcile_timeout_secs),
            resync_interval: Duration::from_secs(config.controller.resync_interval_secs.max(1)),
            initial_backoff: Duration::from_millis(config.reliability.initial_backoff_ms),
            max_backoff: Duration::from_secs(config.reliability.max_backoff_secs),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Cheap, cloneable access to a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    queue: Arc<WorkQueue>,
    shutdown: CancellationToken,
}

impl ControllerHandle {
    /// Reconcile `key` as soon as a worker is free.
    pub fn notify(&self, key: &str) {
        self.queue.add(key);
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

pub struct Controller {
    store: Arc<dyn StateStore>,
    connector: Arc<dyn Connector>,
    observer: Arc<dyn Observer>,
    queue: Arc<WorkQueue>,
    settings: ControllerSettings,
    shutdown: CancellationToken,
}

impl Controller {
    pub fn new(
        store: Arc<dyn StateStore>,
        connector: Arc<dyn Connector>,
        observer: Arc<dyn Observer>,
        settings: ControllerSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let backoff = ItemBackoff::new(settings.initial_backoff, settings.max_backoff);
        Self {
            store,
            connector,
            observer,
            queue: Arc::new(WorkQueue::new(backoff)),
            settings,
            shutdown,
        }
    }

    /// Wire the file store, provider connector and observer named in `config`.
    pub fn from_config(config: &Config, shutdown: CancellationToken) -> Self {
        let store = Arc::new(FileStore::new(config.store_path()));
        let connector = Arc::new(ProviderConnector::new(config.providers.clone()));
        let observer: Arc<dyn Observer> = Arc::from(create_observer(&config.observability));
        Self::new(
            store,
            connector,
            observer,
            ControllerSettings::from_config(config),
            shutdown,
        )
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            queue: Arc::clone(&self.queue),
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Run workers and the resync trigger until the shutdown token fires.
    /// Workers finish their current attempt before this returns.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let mut seen = HashMap::new();
        self.resync(&mut seen).await?;
        health::mark_component_ok(COMPONENT);
        tracing::info!(
            workers = self.settings.workers,
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            "controller started"
        );

        let mut tasks = Vec::with_capacity(self.settings.workers + 1);
        for worker in 0..self.settings.workers {
            tasks.push(tokio::spawn(Arc::clone(&self).worker(worker)));
        }
        tasks.push(tokio::spawn(Arc::clone(&self).resync_loop(seen)));

        self.shutdown.cancelled().await;
        self.queue.shutdown();
        for task in tasks {
            if let Err(error) = task.await {
                tracing::warn!(%error, "controller task ended abnormally");
            }
        }

        self.observer.flush();
        tracing::info!("controller stopped");
        Ok(())
    }

    async fn worker(self: Arc<Self>, worker: usize) {
        while let Some(key) = self.queue.get().await {
            self.process(&key).await;
            self.queue.done(&key);
        }
        tracing::debug!(worker, "worker stopped");
    }

    async fn resync_loop(self: Arc<Self>, mut seen: HashMap<String, u64>) {
        let mut interval = tokio::time::interval(self.settings.resync_interval);
        interval.tick().await;

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            match self.resync(&mut seen).await {
                Ok(_) => health::mark_component_ok(COMPONENT),
                Err(error) => {
                    health::mark_component_error(COMPONENT, &error);
                    self.observer.record_event(&ObserverEvent::Error {
                        component: COMPONENT.into(),
                        message: error.to_string(),
                    });
                }
            }
        }
    }

    /// Enqueue every stored key whose generation has not been seen yet.
    pub(crate) async fn resync(&self, seen: &mut HashMap<String, u64>) -> Result<usize, StoreError> {
        let resources = self.store.list().await?;
        let mut live = HashSet::with_capacity(resources.len());
        let mut enqueued = 0;

        for resource in &resources {
            live.insert(resource.name.as_str());
            if seen.get(&resource.name) != Some(&resource.generation) {
                seen.insert(resource.name.clone(), resource.generation);
                self.queue.add(&resource.name);
                enqueued += 1;
            }
        }
        seen.retain(|name, _| live.contains(name.as_str()));

        if enqueued > 0 {
            tracing::debug!(enqueued, "resync enqueued changed resources");
        }
        self.observer
            .record_metric(&ObserverMetric::QueueDepth(self.queue.len() as u64));
        Ok(enqueued)
    }

    /// One attempt for `key` plus the scheduling decision that follows it.
    async fn process(&self, key: &str) {
        let attempt = Uuid::new_v4();
        let span = tracing::info_span!("reconcile", key, %attempt);

        async {
            self.observer.record_event(&ObserverEvent::ReconcileStart {
                key: key.to_string(),
            });
            let started = std::time::Instant::now();
            let result = self.reconcile(key).await;
            let duration = started.elapsed();
            self.observer
                .record_metric(&ObserverMetric::ReconcileLatency(duration));

            match result {
                Ok(outcome) => {
                    self.record_end(key, duration, &outcome.to_string(), true);
                    self.queue.forget(key);
                    match outcome {
                        ReconcileOutcome::Gone | ReconcileOutcome::Finalized => {
                            health::forget_resource(key);
                        }
                        // The service may report the archive late.
                        ReconcileOutcome::Deleting => {
                            self.requeue(key, self.settings.initial_backoff);
                        }
                        ReconcileOutcome::Created
                        | ReconcileOutcome::ArchivedExternally
                        | ReconcileOutcome::Observed => {
                            self.requeue(key, self.settings.poll_interval);
                        }
                    }
                }
                Err(error) if !error.is_retryable() => {
                    tracing::debug!(%error, "reconcile stopped");
                    self.record_end(key, duration, "cancelled", false);
                }
                Err(error) => {
                    tracing::warn!(%error, "reconcile failed");
                    self.record_end(key, duration, "error", false);
                    self.observer.record_event(&ObserverEvent::Error {
                        component: COMPONENT.into(),
                        message: format!("{key}: {error}"),
                    });
                    let after = self.queue.add_rate_limited(key);
                    self.observer.record_event(&ObserverEvent::Requeue {
                        key: key.to_string(),
                        after,
                        rate_limited: true,
                    });
                }
            }
        }
        .instrument(span)
        .await;
    }

    fn record_end(&self, key: &str, duration: Duration, outcome: &str, success: bool) {
        health::record_reconcile(key, outcome, success);
        self.observer.record_event(&ObserverEvent::ReconcileEnd {
            key: key.to_string(),
            duration,
            outcome: outcome.to_string(),
            success,
        });
    }

    fn requeue(&self, key: &str, after: Duration) {
        self.queue.add_after(key, after);
        self.observer.record_event(&ObserverEvent::Requeue {
            key: key.to_string(),
            after,
            rate_limited: false,
        });
    }

    /// Run a single reconciliation attempt for `key`.
    ///
    /// The record's status, including the sync condition, is written back on
    /// every path that leaves the record in the store.
    pub async fn reconcile(&self, key: &str) -> Result<ReconcileOutcome, ReconcileError> {
        let deadline = Instant::now() + self.settings.reconcile_timeout;
        let Some(resource) = self.store.get(key).await? else {
            tracing::debug!("resource no longer stored");
            return Ok(ReconcileOutcome::Gone);
        };

        let mut status = resource.status.clone();
        let result = self.reconcile_resource(&resource, &mut status, deadline).await;

        if matches!(
            result,
            Ok(ReconcileOutcome::Gone | ReconcileOutcome::Finalized)
        ) {
            return result;
        }

        match &result {
            Ok(ReconcileOutcome::ArchivedExternally) => {
                let id = status.at_provider.external_id.unwrap_or_default();
                set_synced(
                    &mut status.synced,
                    SyncCondition::error(format!(
                        "approval request {id} was archived outside the reconciler and will not be re-created"
                    )),
                );
            }
            Ok(_) => set_synced(&mut status.synced, SyncCondition::success()),
            Err(ReconcileError::Cancelled) => {}
            Err(error) => set_synced(&mut status.synced, SyncCondition::error(error.to_string())),
        }

        if status != resource.status
            && let Err(persist) = self.store.update_status(key, &status).await
        {
            return match result {
                Ok(_) => Err(persist.into()),
                Err(error) => {
                    tracing::warn!(error = %persist, "cannot persist status after failed attempt");
                    Err(error)
                }
            };
        }

        result
    }

    async fn reconcile_resource(
        &self,
        resource: &ApprovalRequest,
        status: &mut ApprovalRequestStatus,
        deadline: Instant,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let observed = &mut status.at_provider;

        if resource.is_being_deleted()
            && (observed.external_id.is_none()
                || resource.spec.deletion_policy == DeletionPolicy::Orphan)
        {
            return self.finalize(resource).await;
        }

        let client = self
            .bounded(deadline, async {
                self.connector
                    .connect(resource)
                    .await
                    .map_err(ReconcileError::from)
            })
            .await?;
        let external = ApprovalRequestExternal::new(client);
        let observation = self.bounded(deadline, external.observe(observed)).await?;

        if resource.is_being_deleted() {
            if !observation.resource_exists {
                return self.finalize(resource).await;
            }
            // Archive always runs to completion; its effect is persisted by the caller.
            return match external.delete(observed).await {
                Ok(()) => Ok(ReconcileOutcome::Deleting),
                Err(ReconcileError::Delete { source, .. }) if source.is_not_found() => {
                    self.finalize(resource).await
                }
                Err(error) => Err(error),
            };
        }

        if !observation.resource_exists {
            return match observed.external_id {
                None => {
                    external.create(&resource.spec.for_provider, observed).await?;
                    if Instant::now() > deadline {
                        tracing::warn!("create finished after the reconcile deadline");
                    }
                    Ok(ReconcileOutcome::Created)
                }
                Some(id) => {
                    tracing::warn!(id, "approval request archived externally; not re-creating");
                    Ok(ReconcileOutcome::ArchivedExternally)
                }
            };
        }

        if !observation.resource_up_to_date {
            external.update(&resource.spec.for_provider, observed).await?;
        }
        Ok(ReconcileOutcome::Observed)
    }

    async fn finalize(&self, resource: &ApprovalRequest) -> Result<ReconcileOutcome, ReconcileError> {
        self.store.discard(&resource.name).await?;
        tracing::info!(
            policy = %resource.spec.deletion_policy,
            "resource finalized and removed from the store"
        );
        Ok(ReconcileOutcome::Finalized)
    }

    /// Race a read-only step against the attempt deadline and shutdown.
    async fn bounded<T, F>(&self, deadline: Instant, step: F) -> Result<T, ReconcileError>
    where
        F: Future<Output = Result<T, ReconcileError>>,
    {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(ReconcileError::Cancelled),
            result = tokio::time::timeout_at(deadline, step) => match result {
                Ok(result) => result,
                Err(_) => Err(ReconcileError::DeadlineExceeded(self.settings.reconcile_timeout)),
            },
        }
    }
}
