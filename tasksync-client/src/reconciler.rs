//! Replays the pending operation log against the remote.
//!
//! Replay is strictly FIFO and stops at the first failure: the failed
//! operation and everything after it stay in the log and the client stays
//! offline. Each confirmed operation leaves the log immediately, so a later
//! pass resumes where this one stopped.

use crate::cache::TaskCache;
use crate::connectivity::{ConnectivityMonitor, Transition};
use crate::errors::GatewayError;
use crate::events::EventDispatcher;
use crate::gateway::{GatewayResult, TaskGateway};
use crate::offline_queue::OfflineQueue;
use crate::{ClientError, ClientResult};
use std::sync::Arc;
use tasksync_core::{OperationType, PendingOperation, TaskDraft, TaskPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    Confirmed,
    /// The record cannot be replayed at all; it is dropped.
    Malformed,
}

pub struct Reconciler {
    gateway: Arc<dyn TaskGateway>,
    queue: Arc<OfflineQueue>,
    cache: Arc<TaskCache>,
    monitor: Arc<ConnectivityMonitor>,
    events: Arc<EventDispatcher>,
}

impl Reconciler {
    pub fn new(
        gateway: Arc<dyn TaskGateway>,
        queue: Arc<OfflineQueue>,
        cache: Arc<TaskCache>,
        monitor: Arc<ConnectivityMonitor>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            gateway,
            queue,
            cache,
            monitor,
            events,
        }
    }

    /// Drains the log. Returns how many operations were replayed.
    ///
    /// Callers hold the monitor's reconciliation guard.
    pub async fn reconcile(&self) -> ClientResult<usize> {
        let pending = self.queue.len().await;
        tracing::info!("CLIENT: reconciling {} pending operations", pending);
        self.events.emit_sync_started(pending);

        let mut replayed = 0;
        loop {
            let Some(op) = self.queue.head().await else {
                match self.queue.complete_pass().await {
                    Ok(true) => break,
                    Ok(false) => continue,
                    Err(e) => {
                        tracing::warn!("DATABASE: failed to persist cleared log: {}", e);
                        break;
                    }
                }
            };

            match self.replay(&op).await {
                Ok(outcome) => {
                    if outcome == Replay::Malformed {
                        tracing::error!(
                            "CLIENT: dropping {} for {} without a task snapshot",
                            op.op_type,
                            op.id
                        );
                    }
                    if let Err(e) = self.queue.acknowledge_head(&op).await {
                        tracing::warn!("DATABASE: failed to persist acknowledgement: {}", e);
                    }
                    replayed += 1;
                }
                Err(e) => return Err(self.fail(&op, e).await),
            }
        }

        if self.monitor.report_reconciled() == Transition::Changed {
            self.events.emit_connection_restored();
        }
        tracing::info!("CLIENT: replayed {} operations", replayed);
        self.events.emit_sync_completed(replayed);
        Ok(replayed)
    }

    async fn replay(&self, op: &PendingOperation) -> GatewayResult<Replay> {
        let target = self.queue.resolve(&op.id).await;
        tracing::debug!("CLIENT: replaying {} for {} (remote id {})", op.op_type, op.id, target);

        match op.op_type {
            OperationType::Create => {
                let Some(snapshot) = &op.data else {
                    return Ok(Replay::Malformed);
                };
                let created = self.gateway.create(&TaskDraft::from(snapshot)).await?;
                if created.id != op.id {
                    if let Err(e) = self.queue.record_alias(&op.id, &created.id).await {
                        tracing::warn!("DATABASE: failed to persist id alias: {}", e);
                    }
                    self.cache.rekey(&op.id, &created.id).await;
                }
            }
            OperationType::Update => {
                let Some(snapshot) = &op.data else {
                    return Ok(Replay::Malformed);
                };
                self.gateway
                    .update(&target, &TaskPatch::from(snapshot))
                    .await?;
            }
            OperationType::Delete => match self.gateway.delete(&target).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!("CLIENT: remote reported delete of {} as unsuccessful", target)
                }
                // Already gone on the remote.
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            },
            OperationType::Complete => {
                self.gateway.complete(&target).await?;
            }
            OperationType::Activate => {
                self.gateway.activate(&target).await?;
            }
        }
        Ok(Replay::Confirmed)
    }

    async fn fail(&self, op: &PendingOperation, error: GatewayError) -> ClientError {
        self.monitor.report_failure();
        let remaining = self.queue.len().await;
        tracing::error!(
            "CLIENT: replay of {} for {} failed, {} operations left: {}",
            op.op_type,
            op.id,
            remaining,
            error
        );
        self.events.emit_sync_failed(&error.to_string(), remaining);
        ClientError::Gateway(error)
    }
}
