//! Local mirror of the task list.
//!
//! `load` and `save` never fail the caller. A storage error is logged and the
//! cache keeps working from memory for the rest of the session.

use crate::database::ClientDatabase;
use crate::queries::StorageKeys;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tasksync_core::{Regularity, Section, Task, TaskDraft, TaskId, Urgency, Weekday};
use tokio::sync::Mutex;

#[derive(Default)]
struct CacheState {
    tasks: Option<Vec<Task>>,
    degraded: bool,
}

pub struct TaskCache {
    db: Arc<ClientDatabase>,
    state: Mutex<CacheState>,
}

impl TaskCache {
    pub fn new(db: Arc<ClientDatabase>) -> Self {
        Self {
            db,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub async fn load(&self) -> Vec<Task> {
        let mut state = self.state.lock().await;
        self.load_locked(&mut state).await
    }

    pub async fn save(&self, tasks: Vec<Task>) {
        let mut state = self.state.lock().await;
        self.save_locked(&mut state, tasks).await;
    }

    /// Whether storage failed this session and the cache is memory-only.
    pub async fn is_degraded(&self) -> bool {
        self.state.lock().await.degraded
    }

    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        self.load().await.into_iter().find(|t| &t.id == id)
    }

    pub async fn list_section(&self, section: Section) -> Vec<Task> {
        self.load()
            .await
            .into_iter()
            .filter(|t| t.section == section)
            .collect()
    }

    /// Insert `task`, replacing any record with the same id in place.
    pub async fn upsert(&self, task: Task) {
        let mut state = self.state.lock().await;
        let mut tasks = self.load_locked(&mut state).await;
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => tasks.push(task),
        }
        self.save_locked(&mut state, tasks).await;
    }

    /// Apply `f` to the cached record and persist it. `None` if unknown.
    pub async fn modify<F>(&self, id: &TaskId, f: F) -> Option<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut state = self.state.lock().await;
        let mut tasks = self.load_locked(&mut state).await;
        let task = tasks.iter_mut().find(|t| &t.id == id)?;
        f(task);
        let updated = task.clone();
        self.save_locked(&mut state, tasks).await;
        Some(updated)
    }

    pub async fn remove(&self, id: &TaskId) -> Option<Task> {
        let mut state = self.state.lock().await;
        let mut tasks = self.load_locked(&mut state).await;
        let index = tasks.iter().position(|t| &t.id == id)?;
        let removed = tasks.remove(index);
        self.save_locked(&mut state, tasks).await;
        Some(removed)
    }

    /// Replace every cached task of `section` with `fresh`.
    pub async fn replace_section(&self, section: Section, fresh: &[Task]) {
        let mut state = self.state.lock().await;
        let mut tasks = self.load_locked(&mut state).await;
        tasks.retain(|t| t.section != section && !fresh.iter().any(|f| f.id == t.id));
        tasks.extend(fresh.iter().cloned());
        self.save_locked(&mut state, tasks).await;
    }

    /// Swap a local id for the id the remote assigned.
    pub async fn rekey(&self, from: &TaskId, to: &TaskId) {
        let mut state = self.state.lock().await;
        let mut tasks = self.load_locked(&mut state).await;
        let mut changed = false;
        for task in tasks.iter_mut().filter(|t| &t.id == from) {
            task.id = to.clone();
            changed = true;
        }
        if changed {
            self.save_locked(&mut state, tasks).await;
        }
    }

    async fn load_locked(&self, state: &mut CacheState) -> Vec<Task> {
        if let Some(tasks) = &state.tasks {
            return tasks.clone();
        }

        if state.degraded {
            let seed = demonstration_tasks();
            state.tasks = Some(seed.clone());
            return seed;
        }

        match self.db.get_item(StorageKeys::TASKS).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Task>>(&raw) {
                Ok(tasks) => {
                    state.tasks = Some(tasks.clone());
                    tasks
                }
                Err(e) => {
                    tracing::warn!(
                        "DATABASE: cached tasks are corrupt ({}), re-seeding for next load",
                        e
                    );
                    self.save_locked(state, demonstration_tasks()).await;
                    Vec::new()
                }
            },
            Ok(None) => {
                tracing::info!("DATABASE: empty task cache, seeding demonstration tasks");
                let seed = demonstration_tasks();
                self.save_locked(state, seed.clone()).await;
                seed
            }
            Err(e) => {
                tracing::warn!("DATABASE: failed to read task cache, using memory only: {}", e);
                state.degraded = true;
                let seed = demonstration_tasks();
                state.tasks = Some(seed.clone());
                seed
            }
        }
    }

    async fn save_locked(&self, state: &mut CacheState, tasks: Vec<Task>) {
        if !state.degraded {
            let written = match serde_json::to_string(&tasks) {
                Ok(json) => self.db.set_item(StorageKeys::TASKS, &json).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = written {
                tracing::warn!("DATABASE: failed to persist task cache, using memory only: {}", e);
                state.degraded = true;
            }
        }
        state.tasks = Some(tasks);
    }
}

/// Baseline set shown on first run so the offline view is never empty.
pub fn demonstration_tasks() -> Vec<Task> {
    let now = Utc::now();
    let mut tasks = Vec::new();

    let drafts = [
        TaskDraft::new("Review weekly goals", "Keep the week focused on what matters")
            .with_urgency(Urgency::High),
        TaskDraft::new("Stretch for ten minutes", "Long days at the desk add up")
            .with_urgency(Urgency::Medium),
        TaskDraft::new("Plan next sprint", "The team needs priorities before Monday")
            .with_urgency(Urgency::Critical)
            .in_section(Section::Future)
            .planned_for(now + Duration::days(3)),
        TaskDraft::new("Renew passport", "It expires in the autumn")
            .in_section(Section::Future),
    ];
    for (index, draft) in drafts.into_iter().enumerate() {
        tasks.push(draft.into_task(TaskId::new(format!("demo-{}", index + 1))));
    }

    if let Ok(weekly) = Regularity::weekly([Weekday::Monday, Weekday::Thursday]) {
        if let Some(task) = tasks.get_mut(1) {
            task.regularity = Some(weekly);
        }
    }

    let mut done = TaskDraft::new("Set up task list", "Everything in one place")
        .into_task(TaskId::new("demo-5"));
    done.mark_completed(now - Duration::days(1));
    tasks.push(done);

    tasks
}
