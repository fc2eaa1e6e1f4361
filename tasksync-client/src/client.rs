use crate::cache::TaskCache;
use crate::config::{ClientConfig, MIN_CHECK_INTERVAL};
use crate::connectivity::{ConnectivityMode, ConnectivityMonitor, Transition};
use crate::database::ClientDatabase;
use crate::errors::GatewayError;
use crate::events::EventDispatcher;
use crate::gateway::{HttpGateway, TaskGateway};
use crate::offline_queue::OfflineQueue;
use crate::reconciler::Reconciler;
use crate::{ClientError, ClientResult};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tasksync_core::sorting::sort_section;
use tasksync_core::{
    PendingOperation, Section, Task, TaskDraft, TaskId, TaskPatch,
};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Result of one connectivity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Online with nothing pending; no probe was sent.
    AlreadyOnline,
    /// Another reconciliation is in flight.
    Busy,
    ProbeFailed,
    Reconciled { replayed: usize },
    ReconcileFailed { remaining: usize },
}

/// All three sections, as returned by [`Client::resynchronize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskBoard {
    pub active: Vec<Task>,
    pub future: Vec<Task>,
    pub done: Vec<Task>,
}

impl TaskBoard {
    pub fn section(&self, section: Section) -> &[Task] {
        match section {
            Section::Active => &self.active,
            Section::Future => &self.future,
            Section::Done => &self.done,
        }
    }

    pub fn total(&self) -> usize {
        self.active.len() + self.future.len() + self.done.len()
    }
}

struct ClientInner {
    config: ClientConfig,
    gateway: Arc<dyn TaskGateway>,
    cache: Arc<TaskCache>,
    queue: Arc<OfflineQueue>,
    monitor: Arc<ConnectivityMonitor>,
    reconciler: Reconciler,
    event_dispatcher: Arc<EventDispatcher>,
}

/// Optimistic task operations with offline fallback.
///
/// Every mutation tries the remote first. When the remote fails the change is
/// applied to the local cache, queued for replay, and the locally
/// synthesized result is returned. Network errors never reach the caller.
pub struct Client {
    inner: Arc<ClientInner>,
    connectivity_task: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Opens local storage, connects the HTTP gateway and starts the
    /// background connectivity loop.
    pub async fn new(config: ClientConfig) -> ClientResult<Self> {
        let db = Arc::new(ClientDatabase::new(&config.database_url).await?);
        db.run_migrations().await?;

        let gateway = Arc::new(HttpGateway::new(
            config.server_url.clone(),
            config.request_timeout,
        )?);

        let client = Self::with_gateway(config, gateway, db).await?;
        client.start_connectivity_loop();
        Ok(client)
    }

    /// Builds a client around any gateway. The connectivity loop is not
    /// started; call [`Client::start_connectivity_loop`] or drive it with
    /// [`Client::sync_now`].
    pub async fn with_gateway(
        config: ClientConfig,
        gateway: Arc<dyn TaskGateway>,
        db: Arc<ClientDatabase>,
    ) -> ClientResult<Self> {
        let queue = Arc::new(OfflineQueue::open(db.clone()).await?);
        let cache = Arc::new(TaskCache::new(db));

        // Leftovers from a previous session must replay before anything new
        // reaches the remote.
        let mode = if queue.is_empty().await {
            ConnectivityMode::Online
        } else {
            ConnectivityMode::Offline
        };
        let monitor = Arc::new(ConnectivityMonitor::with_mode(mode));
        let event_dispatcher = Arc::new(EventDispatcher::new());

        let reconciler = Reconciler::new(
            gateway.clone(),
            queue.clone(),
            cache.clone(),
            monitor.clone(),
            event_dispatcher.clone(),
        );

        tracing::info!(
            "CLIENT: ready against {} ({}, {} pending)",
            config.server_url,
            mode,
            queue.len().await
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                gateway,
                cache,
                queue,
                monitor,
                reconciler,
                event_dispatcher,
            }),
            connectivity_task: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn event_dispatcher(&self) -> Arc<EventDispatcher> {
        self.inner.event_dispatcher.clone()
    }

    /// Offline indicator for the UI.
    pub fn is_offline(&self) -> bool {
        self.inner.monitor.is_offline()
    }

    pub fn mode(&self) -> ConnectivityMode {
        self.inner.monitor.mode()
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.queue.len().await
    }

    pub async fn pending_operations(&self) -> Vec<PendingOperation> {
        self.inner.queue.list().await
    }

    /// Tasks of `section`, from the remote when reachable, else from the cache.
    pub async fn list(&self, section: Section) -> Vec<Task> {
        self.inner.list(section).await
    }

    /// [`Client::list`] in display order.
    pub async fn list_sorted(&self, section: Section) -> Vec<Task> {
        let mut tasks = self.inner.list(section).await;
        sort_section(section, &mut tasks, Utc::now());
        tasks
    }

    pub async fn get(&self, id: &TaskId) -> ClientResult<Task> {
        let inner = &self.inner;
        let target = inner.queue.resolve(id).await;

        if !inner.remote_blocked().await {
            match inner.gateway.get(&target).await {
                Ok(task) => {
                    inner.cache.upsert(task.clone()).await;
                    return Ok(task);
                }
                Err(e) => inner.note_failure("get", &e),
            }
        }

        inner
            .cache
            .get(&target)
            .await
            .ok_or_else(|| ClientError::TaskNotFound(id.clone()))
    }

    pub async fn create(&self, draft: TaskDraft) -> ClientResult<Task> {
        draft.validate()?;
        let inner = &self.inner;

        if !inner.remote_blocked().await {
            match inner.gateway.create(&draft).await {
                Ok(task) => {
                    inner.cache.upsert(task.clone()).await;
                    inner.event_dispatcher.emit_task_created(&task, false);
                    let expected = TaskPatch::default()
                        .with_title(draft.title.clone())
                        .with_why(draft.why.clone())
                        .with_urgency(draft.urgency)
                        .with_section(draft.section);
                    inner.check_consistency("create", expected.is_reflected_in(&task)).await;
                    return Ok(task);
                }
                Err(e) => inner.note_failure("create", &e),
            }
        }

        let task = draft.into_task(TaskId::generate_local());
        inner.cache.upsert(task.clone()).await;
        inner.queue_operation(PendingOperation::create(task.clone())).await;
        inner.event_dispatcher.emit_task_created(&task, true);
        Ok(task)
    }

    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> ClientResult<Task> {
        patch.validate()?;
        let inner = &self.inner;
        let target = inner.queue.resolve(id).await;

        if !inner.remote_blocked().await {
            match inner.gateway.update(&target, &patch).await {
                Ok(task) => {
                    inner.cache.upsert(task.clone()).await;
                    inner.event_dispatcher.emit_task_updated(&task, false);
                    inner.check_consistency("update", patch.is_reflected_in(&task)).await;
                    return Ok(task);
                }
                Err(e) => inner.note_failure("update", &e),
            }
        }

        let task = inner
            .cache
            .modify(&target, |task| patch.apply_to(task))
            .await
            .ok_or_else(|| ClientError::TaskNotFound(id.clone()))?;
        inner.queue_operation(PendingOperation::update(task.clone())).await;
        inner.event_dispatcher.emit_task_updated(&task, true);
        Ok(task)
    }

    /// Always reports success; an unreachable remote only defers the delete.
    pub async fn delete(&self, id: &TaskId) -> bool {
        let inner = &self.inner;
        let target = inner.queue.resolve(id).await;

        if !inner.remote_blocked().await {
            match inner.gateway.delete(&target).await {
                Ok(success) => {
                    if !success {
                        tracing::warn!("CLIENT: remote reported delete of {} as unsuccessful", target);
                    }
                    inner.cache.remove(&target).await;
                    inner.event_dispatcher.emit_task_deleted(&target, false);
                    return true;
                }
                Err(e) => inner.note_failure("delete", &e),
            }
        }

        inner.cache.remove(&target).await;
        inner.queue_operation(PendingOperation::delete(target.clone())).await;
        inner.event_dispatcher.emit_task_deleted(&target, true);
        true
    }

    pub async fn complete(&self, id: &TaskId) -> ClientResult<Task> {
        let inner = &self.inner;
        let target = inner.queue.resolve(id).await;

        if !inner.remote_blocked().await {
            match inner.gateway.complete(&target).await {
                Ok(task) => {
                    inner.cache.upsert(task.clone()).await;
                    inner.event_dispatcher.emit_task_completed(&task, false);
                    let consistent = task.section == Section::Done && task.completed_at.is_some();
                    inner.check_consistency("complete", consistent).await;
                    return Ok(task);
                }
                Err(e) => inner.note_failure("complete", &e),
            }
        }

        let now = Utc::now();
        let task = inner
            .cache
            .modify(&target, |task| task.mark_completed(now))
            .await
            .ok_or_else(|| ClientError::TaskNotFound(id.clone()))?;
        inner.queue_operation(PendingOperation::complete(task.clone())).await;
        inner.event_dispatcher.emit_task_completed(&task, true);
        Ok(task)
    }

    pub async fn activate(&self, id: &TaskId) -> ClientResult<Task> {
        let inner = &self.inner;
        let target = inner.queue.resolve(id).await;

        if !inner.remote_blocked().await {
            match inner.gateway.activate(&target).await {
                Ok(task) => {
                    inner.cache.upsert(task.clone()).await;
                    inner.event_dispatcher.emit_task_activated(&task, false);
                    inner
                        .check_consistency("activate", task.section == Section::Active)
                        .await;
                    return Ok(task);
                }
                Err(e) => inner.note_failure("activate", &e),
            }
        }

        let task = inner
            .cache
            .modify(&target, |task| task.mark_active())
            .await
            .ok_or_else(|| ClientError::TaskNotFound(id.clone()))?;
        inner.queue_operation(PendingOperation::activate(task.clone())).await;
        inner.event_dispatcher.emit_task_activated(&task, true);
        Ok(task)
    }

    /// Reloads every section from whichever source is authoritative.
    pub async fn resynchronize(&self) -> TaskBoard {
        self.inner.resynchronize().await
    }

    /// Runs one connectivity check now: probe, then reconcile if the probe
    /// succeeds. Shares the single-reconciliation guard with the background
    /// loop.
    pub async fn check_connectivity(&self) -> SyncOutcome {
        self.inner.check_connectivity().await
    }

    pub async fn sync_now(&self) -> SyncOutcome {
        self.check_connectivity().await
    }

    /// Spawns the periodic connectivity check. Idempotent.
    pub fn start_connectivity_loop(&self) {
        let Ok(mut slot) = self.connectivity_task.lock() else {
            tracing::error!("CLIENT: connectivity task lock poisoned");
            return;
        };
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let inner = Arc::downgrade(&self.inner);
        let interval = self.inner.config.probe_interval.max(MIN_CHECK_INTERVAL);
        tracing::info!("CLIENT: starting connectivity monitor ({:?} interval)", interval);

        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let outcome = inner.check_connectivity().await;
                tracing::debug!("CLIENT: connectivity tick: {:?}", outcome);
            }
            tracing::debug!("CLIENT: connectivity monitor stopped");
        }));
    }

    pub fn stop_connectivity_loop(&self) {
        if let Ok(mut slot) = self.connectivity_task.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.stop_connectivity_loop();
    }
}

impl ClientInner {
    /// While offline with work queued, the remote is skipped so a new
    /// mutation cannot overtake an older queued one.
    async fn remote_blocked(&self) -> bool {
        self.monitor.is_offline() && !self.queue.is_empty().await
    }

    fn note_failure(&self, operation: &str, error: &GatewayError) {
        tracing::warn!(
            "CLIENT: remote {} failed, falling back to local cache: {}",
            operation,
            error
        );
        if self.monitor.report_failure() == Transition::Changed {
            self.event_dispatcher.emit_connection_lost();
        }
    }

    async fn queue_operation(&self, op: PendingOperation) {
        let op_type = op.op_type;
        let task_id = op.id.clone();
        match self.queue.enqueue(op).await {
            Ok(pending) => {
                self.event_dispatcher
                    .emit_operation_queued(op_type, &task_id, pending);
            }
            Err(e) => {
                tracing::warn!("DATABASE: failed to persist pending {}: {}", op_type, e);
                let pending = self.queue.len().await;
                self.event_dispatcher
                    .emit_operation_queued(op_type, &task_id, pending);
            }
        }
        // A pass that finished between the failure and the enqueue may have
        // flipped the mode back.
        if self.monitor.report_failure() == Transition::Changed {
            self.event_dispatcher.emit_connection_lost();
        }
    }

    async fn check_consistency(&self, operation: &str, consistent: bool) {
        if !consistent {
            tracing::warn!(
                "CLIENT: remote {} result differs from the expected state, reloading",
                operation
            );
            self.resynchronize().await;
        }
    }

    async fn list(&self, section: Section) -> Vec<Task> {
        if !self.remote_blocked().await {
            match self.gateway.list(section).await {
                Ok(tasks) => {
                    self.cache.replace_section(section, &tasks).await;
                    return tasks;
                }
                Err(e) => self.note_failure("list", &e),
            }
        }
        self.cache.list_section(section).await
    }

    async fn resynchronize(&self) -> TaskBoard {
        let board = TaskBoard {
            active: self.list(Section::Active).await,
            future: self.list(Section::Future).await,
            done: self.list(Section::Done).await,
        };
        tracing::info!(
            "CLIENT: reloaded {} active, {} future, {} done tasks",
            board.active.len(),
            board.future.len(),
            board.done.len()
        );
        self.event_dispatcher.emit_tasks_reloaded(
            board.active.len(),
            board.future.len(),
            board.done.len(),
        );
        board
    }

    async fn check_connectivity(&self) -> SyncOutcome {
        if !self.monitor.is_offline() && self.queue.is_empty().await {
            return SyncOutcome::AlreadyOnline;
        }

        let Some(_guard) = self.monitor.try_begin_reconciliation() else {
            tracing::debug!("CLIENT: reconciliation already in flight, skipping tick");
            return SyncOutcome::Busy;
        };

        if let Err(e) = self.gateway.health(self.config.probe_timeout).await {
            tracing::debug!("CLIENT: health probe failed: {}", e);
            return SyncOutcome::ProbeFailed;
        }

        match self.reconciler.reconcile().await {
            Ok(replayed) => {
                self.resynchronize().await;
                SyncOutcome::Reconciled { replayed }
            }
            Err(_) => SyncOutcome::ReconcileFailed {
                remaining: self.queue.len().await,
            },
        }
    }
}
