use crate::database::ClientDatabase;
use crate::queries::StorageKeys;
use crate::ClientResult;
use std::collections::HashMap;
use std::sync::Arc;
use tasksync_core::{PendingOperation, TaskId};
use tokio::sync::Mutex;

#[derive(Default)]
struct QueueState {
    operations: Vec<PendingOperation>,
    aliases: HashMap<TaskId, TaskId>,
}

/// FIFO log of mutations waiting for the remote.
///
/// Every change is written through to storage before the call returns.
/// Records are never reordered or rewritten; ids learned while replaying
/// are kept in a separate alias table.
pub struct OfflineQueue {
    db: Arc<ClientDatabase>,
    state: Mutex<QueueState>,
}

impl OfflineQueue {
    /// Opens the log, restoring whatever a previous session left behind.
    pub async fn open(db: Arc<ClientDatabase>) -> ClientResult<Self> {
        let operations = match db.get_item(StorageKeys::PENDING_OPERATIONS).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::error!("DATABASE: pending operation log is corrupt, discarding: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        let aliases = match db.get_item(StorageKeys::TASK_ID_ALIASES).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("DATABASE: id alias table is corrupt, discarding: {}", e);
                HashMap::new()
            }),
            None => HashMap::new(),
        };

        if !operations.is_empty() {
            tracing::info!("DATABASE: restored {} pending operations", operations.len());
        }

        Ok(Self {
            db,
            state: Mutex::new(QueueState {
                operations,
                aliases,
            }),
        })
    }

    /// Appends `op` and returns the new queue length.
    pub async fn enqueue(&self, op: PendingOperation) -> ClientResult<usize> {
        let mut state = self.state.lock().await;
        tracing::debug!("DATABASE: queueing {} for task {}", op.op_type, op.id);
        state.operations.push(op);
        self.persist_operations(&state).await?;
        Ok(state.operations.len())
    }

    /// Oldest first.
    pub async fn list(&self) -> Vec<PendingOperation> {
        self.state.lock().await.operations.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.operations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.operations.is_empty()
    }

    pub async fn head(&self) -> Option<PendingOperation> {
        self.state.lock().await.operations.first().cloned()
    }

    /// Drops the head of the log once its replay has been confirmed.
    ///
    /// `replayed` must still be the head; anything else means the log changed
    /// under the reconciler and nothing is removed.
    pub async fn acknowledge_head(&self, replayed: &PendingOperation) -> ClientResult<bool> {
        let mut state = self.state.lock().await;
        if state.operations.first() != Some(replayed) {
            tracing::warn!(
                "DATABASE: head of the log is not the replayed {} for {}",
                replayed.op_type,
                replayed.id
            );
            return Ok(false);
        }
        state.operations.remove(0);
        self.persist_operations(&state).await?;
        Ok(true)
    }

    /// Empties the log and forgets all aliases.
    pub async fn clear(&self) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        Self::clear_locked(&mut state);
        self.persist_operations(&state).await?;
        self.persist_aliases(&state).await
    }

    /// Clears the log if nothing was enqueued since the last acknowledgement.
    ///
    /// Returns `false` when operations remain, leaving everything untouched.
    pub async fn complete_pass(&self) -> ClientResult<bool> {
        let mut state = self.state.lock().await;
        if !state.operations.is_empty() {
            return Ok(false);
        }
        Self::clear_locked(&mut state);
        self.persist_operations(&state).await?;
        self.persist_aliases(&state).await?;
        Ok(true)
    }

    pub async fn record_alias(&self, local: &TaskId, remote: &TaskId) -> ClientResult<()> {
        if local == remote {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        state.aliases.insert(local.clone(), remote.clone());
        self.persist_aliases(&state).await
    }

    /// Follows recorded aliases to the id the remote knows.
    pub async fn resolve(&self, id: &TaskId) -> TaskId {
        let state = self.state.lock().await;
        let mut current = id;
        // Alias chains are one hop in practice; the bound guards against cycles.
        for _ in 0..=state.aliases.len() {
            match state.aliases.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        current.clone()
    }

    fn clear_locked(state: &mut QueueState) {
        state.operations.clear();
        state.aliases.clear();
    }

    async fn persist_operations(&self, state: &QueueState) -> ClientResult<()> {
        let json = serde_json::to_string(&state.operations)?;
        self.db
            .set_item(StorageKeys::PENDING_OPERATIONS, &json)
            .await
    }

    async fn persist_aliases(&self, state: &QueueState) -> ClientResult<()> {
        let json = serde_json::to_string(&state.aliases)?;
        self.db.set_item(StorageKeys::TASK_ID_ALIASES, &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_core::{TaskDraft, Urgency};

    async fn setup() -> (Arc<ClientDatabase>, OfflineQueue) {
        let db = Arc::new(ClientDatabase::new("sqlite::memory:").await.unwrap());
        db.run_migrations().await.unwrap();
        let queue = OfflineQueue::open(db.clone()).await.unwrap();
        (db, queue)
    }

    fn update_op(id: &str, urgency: Urgency) -> PendingOperation {
        let task = TaskDraft::new("t", "w")
            .with_urgency(urgency)
            .into_task(TaskId::new(id));
        PendingOperation::update(task)
    }

    #[tokio::test]
    async fn test_fifo_without_dedup() {
        let (_, queue) = setup().await;
        let a = update_op("1", Urgency::Low);
        let b = update_op("1", Urgency::High);

        assert_eq!(queue.enqueue(a.clone()).await.unwrap(), 1);
        assert_eq!(queue.enqueue(b.clone()).await.unwrap(), 2);

        assert_eq!(queue.list().await, vec![a, b]);
    }

    #[tokio::test]
    async fn test_log_survives_reopen() {
        let (db, queue) = setup().await;
        let a = update_op("1", Urgency::Low);
        let b = PendingOperation::delete(TaskId::new("2"));
        queue.enqueue(a.clone()).await.unwrap();
        queue.enqueue(b.clone()).await.unwrap();

        let reopened = OfflineQueue::open(db).await.unwrap();
        let restored = reopened.list().await;
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].id, a.id);
        assert_eq!(restored[1].op_type, b.op_type);
    }

    #[tokio::test]
    async fn test_acknowledge_only_matching_head() {
        let (_, queue) = setup().await;
        let a = update_op("1", Urgency::Low);
        let b = update_op("2", Urgency::Low);
        queue.enqueue(a.clone()).await.unwrap();
        queue.enqueue(b.clone()).await.unwrap();

        assert!(!queue.acknowledge_head(&b).await.unwrap());
        assert_eq!(queue.len().await, 2);

        assert!(queue.acknowledge_head(&a).await.unwrap());
        assert_eq!(queue.head().await, Some(b));
    }

    #[tokio::test]
    async fn test_complete_pass_refuses_non_empty_log() {
        let (_, queue) = setup().await;
        let a = update_op("1", Urgency::Low);
        queue.enqueue(a.clone()).await.unwrap();
        queue
            .record_alias(&TaskId::new("local-1-0"), &TaskId::new("srv"))
            .await
            .unwrap();

        assert!(!queue.complete_pass().await.unwrap());
        assert_eq!(queue.resolve(&TaskId::new("local-1-0")).await, TaskId::new("srv"));

        queue.acknowledge_head(&a).await.unwrap();
        assert!(queue.complete_pass().await.unwrap());
        assert!(queue.is_empty().await);
        assert_eq!(
            queue.resolve(&TaskId::new("local-1-0")).await,
            TaskId::new("local-1-0")
        );
    }

    #[tokio::test]
    async fn test_resolve_follows_chain_and_survives_cycles() {
        let (_, queue) = setup().await;
        let (a, b, c) = (TaskId::new("a"), TaskId::new("b"), TaskId::new("c"));
        queue.record_alias(&a, &b).await.unwrap();
        queue.record_alias(&b, &c).await.unwrap();
        assert_eq!(queue.resolve(&a).await, c);

        queue.record_alias(&c, &a).await.unwrap();
        // Terminates; the exact id is irrelevant.
        let _ = queue.resolve(&a).await;
    }

    #[tokio::test]
    async fn test_corrupt_log_is_discarded_on_open() {
        let (db, _) = setup().await;
        db.set_item(StorageKeys::PENDING_OPERATIONS, "oops").await.unwrap();

        let queue = OfflineQueue::open(db).await.unwrap();
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear() {
        let (db, queue) = setup().await;
        queue.enqueue(update_op("1", Urgency::Low)).await.unwrap();
        queue.clear().await.unwrap();

        assert!(queue.is_empty().await);
        assert_eq!(
            db.get_item(StorageKeys::PENDING_OPERATIONS).await.unwrap().as_deref(),
            Some("[]")
        );
    }
}
