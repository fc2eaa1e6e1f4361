use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tasksync_client::gateway::GatewayResult;
use tasksync_client::{Client, ClientConfig, ClientDatabase, GatewayError, TaskGateway};
use tasksync_core::{Section, Task, TaskDraft, TaskId, TaskPatch};
use uuid::Uuid;

/// Creates a new in-memory test sqlite database and runs migrations.
#[allow(dead_code)]
pub async fn setup_test_db() -> Arc<ClientDatabase> {
    let db = ClientDatabase::new("sqlite::memory:").await.unwrap();
    db.run_migrations().await.unwrap();
    Arc::new(db)
}

/// Client over `gateway` with an empty task cache (no demonstration tasks).
#[allow(dead_code)]
pub async fn setup_client(gateway: Arc<MemoryGateway>) -> Client {
    let db = setup_test_db().await;
    setup_client_with_db(gateway, db).await
}

#[allow(dead_code)]
pub async fn setup_client_with_db(gateway: Arc<MemoryGateway>, db: Arc<ClientDatabase>) -> Client {
    if db.get_item("tasks").await.unwrap().is_none() {
        db.set_item("tasks", "[]").await.unwrap();
    }
    Client::with_gateway(ClientConfig::default(), gateway, db)
        .await
        .unwrap()
}

#[derive(Default)]
struct RemoteState {
    tasks: Vec<Task>,
    calls: Vec<String>,
    /// Mutations left before the injected failure fires.
    fail_in: Option<usize>,
}

/// In-memory stand-in for the task server.
///
/// Assigns uuid ids on create, hard-deletes, and can be switched offline or
/// told to fail one specific upcoming mutation.
pub struct MemoryGateway {
    online: AtomicBool,
    ignore_updates: AtomicBool,
    probe_latency_ms: AtomicU64,
    state: Mutex<RemoteState>,
}

#[allow(dead_code)]
impl MemoryGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(true),
            ignore_updates: AtomicBool::new(false),
            probe_latency_ms: AtomicU64::new(0),
            state: Mutex::new(RemoteState::default()),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Accept updates but return the record unchanged, like a concurrent
    /// writer winning the race.
    pub fn ignore_updates(&self, ignore: bool) {
        self.ignore_updates.store(ignore, Ordering::SeqCst);
    }

    pub fn set_probe_latency(&self, latency: Duration) {
        self.probe_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// The `n`th mutation from now (1-based) fails; later ones succeed.
    pub fn fail_nth_mutation(&self, n: usize) {
        self.state.lock().unwrap().fail_in = Some(n);
    }

    pub fn seed(&self, task: Task) {
        self.state.lock().unwrap().tasks.push(task);
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().unwrap().tasks.clone()
    }

    pub fn find_by_title(&self, title: &str) -> Option<Task> {
        self.tasks().into_iter().find(|t| t.title == title)
    }

    /// `"METHOD path"` for every call that reached the remote, health included.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutation_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("GET"))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn enter(&self, call: String, mutation: bool) -> GatewayResult<std::sync::MutexGuard<'_, RemoteState>> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.clone());
        if mutation {
            if let Some(n) = state.fail_in {
                if n <= 1 {
                    state.fail_in = None;
                    return Err(GatewayError::Status {
                        status: 503,
                        path: call,
                    });
                }
                state.fail_in = Some(n - 1);
            }
        }
        Ok(state)
    }
}

fn not_found(id: &TaskId) -> GatewayError {
    GatewayError::Status {
        status: 404,
        path: format!("/task/{}", id),
    }
}

#[async_trait]
impl TaskGateway for MemoryGateway {
    async fn list(&self, section: Section) -> GatewayResult<Vec<Task>> {
        let state = self.enter(format!("GET /tasks/{}", section), false)?;
        Ok(state
            .tasks
            .iter()
            .filter(|t| t.section == section)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &TaskId) -> GatewayResult<Task> {
        let state = self.enter(format!("GET /task/{}", id), false)?;
        state
            .tasks
            .iter()
            .find(|t| &t.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn create(&self, draft: &TaskDraft) -> GatewayResult<Task> {
        let mut state = self.enter("POST /task".to_string(), true)?;
        let task = draft.clone().into_task(TaskId::new(Uuid::new_v4().to_string()));
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> GatewayResult<Task> {
        let mut state = self.enter(format!("PUT /task/{}", id), true)?;
        let task = state
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| not_found(id))?;
        if !self.ignore_updates.load(Ordering::SeqCst) {
            patch.apply_to(task);
        }
        Ok(task.clone())
    }

    async fn delete(&self, id: &TaskId) -> GatewayResult<bool> {
        let mut state = self.enter(format!("DELETE /task/{}", id), true)?;
        let index = state
            .tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| not_found(id))?;
        state.tasks.remove(index);
        Ok(true)
    }

    async fn complete(&self, id: &TaskId) -> GatewayResult<Task> {
        let mut state = self.enter(format!("POST /task/{}/complete", id), true)?;
        let task = state
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| not_found(id))?;
        task.mark_completed(Utc::now());
        Ok(task.clone())
    }

    async fn activate(&self, id: &TaskId) -> GatewayResult<Task> {
        let mut state = self.enter(format!("POST /task/{}/activate", id), true)?;
        let task = state
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| not_found(id))?;
        task.mark_active();
        Ok(task.clone())
    }

    async fn health(&self, timeout: Duration) -> GatewayResult<()> {
        let latency = Duration::from_millis(self.probe_latency_ms.load(Ordering::SeqCst));
        if latency > timeout {
            tokio::time::sleep(timeout).await;
            return Err(GatewayError::Timeout(timeout));
        }
        tokio::time::sleep(latency).await;
        self.enter("GET /health".to_string(), false)?;
        Ok(())
    }
}
