//! Event callback system for the task client
//!
//! Events can be emitted from any thread or task. They are queued and only
//! delivered when `process_events()` is called, on the thread that
//! registered the first callback. A UI loop calls `process_events()` once per
//! frame and renders from the callbacks without any locking of its own.
//!
//! Events emitted before any callback is registered are dropped.
//!
//! Task events carry an `offline` flag: `true` means the result was
//! synthesized locally and the mutation is waiting in the pending log.

use crate::errors::ClientError;
use crate::ClientResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex};
use std::thread::{self, ThreadId};
use tasksync_core::{OperationType, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskCompleted,
    TaskActivated,
    OperationQueued,
    SyncStarted,
    SyncCompleted,
    SyncFailed,
    ConnectionLost,
    ConnectionRestored,
    TasksReloaded,
}

/// # Example
///
/// ```rust,no_run
/// use tasksync_client::events::{EventDispatcher, TaskEvent};
///
/// let dispatcher = EventDispatcher::new();
///
/// dispatcher.register_callback(|event| {
///     match event {
///         TaskEvent::OperationQueued { pending, .. } => {
///             println!("offline, {} change(s) waiting", pending);
///         }
///         TaskEvent::ConnectionRestored => println!("back online"),
///         _ => {}
///     }
/// }).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    TaskCreated { task: Task, offline: bool },
    TaskUpdated { task: Task, offline: bool },
    TaskDeleted { id: TaskId, offline: bool },
    TaskCompleted { task: Task, offline: bool },
    TaskActivated { task: Task, offline: bool },
    /// A mutation fell back to the local cache.
    OperationQueued {
        op_type: OperationType,
        task_id: TaskId,
        pending: usize,
    },
    SyncStarted { pending: usize },
    SyncCompleted { replayed: usize },
    SyncFailed { message: String, remaining: usize },
    ConnectionLost,
    ConnectionRestored,
    /// All sections were reloaded after an inconsistent remote response or a sync.
    TasksReloaded {
        active: usize,
        future: usize,
        done: usize,
    },
}

impl TaskEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            TaskEvent::TaskCreated { .. } => EventType::TaskCreated,
            TaskEvent::TaskUpdated { .. } => EventType::TaskUpdated,
            TaskEvent::TaskDeleted { .. } => EventType::TaskDeleted,
            TaskEvent::TaskCompleted { .. } => EventType::TaskCompleted,
            TaskEvent::TaskActivated { .. } => EventType::TaskActivated,
            TaskEvent::OperationQueued { .. } => EventType::OperationQueued,
            TaskEvent::SyncStarted { .. } => EventType::SyncStarted,
            TaskEvent::SyncCompleted { .. } => EventType::SyncCompleted,
            TaskEvent::SyncFailed { .. } => EventType::SyncFailed,
            TaskEvent::ConnectionLost => EventType::ConnectionLost,
            TaskEvent::ConnectionRestored => EventType::ConnectionRestored,
            TaskEvent::TasksReloaded { .. } => EventType::TasksReloaded,
        }
    }
}

struct CallbackEntry {
    callback: Box<dyn Fn(TaskEvent) + Send>,
    event_filter: Option<EventType>,
}

pub struct EventDispatcher {
    callbacks: Mutex<Vec<CallbackEntry>>,
    event_queue: Mutex<mpsc::Receiver<TaskEvent>>,
    event_sender: mpsc::Sender<TaskEvent>,
    callback_thread_id: Mutex<Option<ThreadId>>,
    listening: AtomicBool,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            callbacks: Mutex::new(Vec::new()),
            event_queue: Mutex::new(receiver),
            event_sender: sender,
            callback_thread_id: Mutex::new(None),
            listening: AtomicBool::new(false),
        }
    }

    fn ensure_callback_thread(&self) -> ClientResult<()> {
        let mut thread_id = self
            .callback_thread_id
            .lock()
            .map_err(|_| ClientError::LockError("thread ID".into()))?;
        if thread_id.is_none() {
            *thread_id = Some(thread::current().id());
            tracing::info!(
                "Event callbacks will be processed on thread: {:?}",
                thread::current().id()
            );
        }
        Ok(())
    }

    pub fn register_callback<F>(&self, callback: F) -> ClientResult<()>
    where
        F: Fn(TaskEvent) + Send + 'static,
    {
        self.push_callback(Box::new(callback), None)
    }

    /// Register a callback that only receives events of `event_filter`.
    pub fn register_filtered_callback<F>(
        &self,
        callback: F,
        event_filter: EventType,
    ) -> ClientResult<()>
    where
        F: Fn(TaskEvent) + Send + 'static,
    {
        self.push_callback(Box::new(callback), Some(event_filter))
    }

    fn push_callback(
        &self,
        callback: Box<dyn Fn(TaskEvent) + Send>,
        event_filter: Option<EventType>,
    ) -> ClientResult<()> {
        self.ensure_callback_thread()?;

        let mut callbacks = self
            .callbacks
            .lock()
            .map_err(|_| ClientError::LockError("callbacks".into()))?;
        callbacks.push(CallbackEntry {
            callback,
            event_filter,
        });
        self.listening.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn emit(&self, event: TaskEvent) {
        if !self.listening.load(Ordering::SeqCst) {
            return;
        }
        if self.event_sender.send(event).is_err() {
            tracing::error!("Failed to queue event - receiver may have been dropped");
        }
    }

    pub fn emit_task_created(&self, task: &Task, offline: bool) {
        self.emit(TaskEvent::TaskCreated {
            task: task.clone(),
            offline,
        });
    }

    pub fn emit_task_updated(&self, task: &Task, offline: bool) {
        self.emit(TaskEvent::TaskUpdated {
            task: task.clone(),
            offline,
        });
    }

    pub fn emit_task_deleted(&self, id: &TaskId, offline: bool) {
        self.emit(TaskEvent::TaskDeleted {
            id: id.clone(),
            offline,
        });
    }

    pub fn emit_task_completed(&self, task: &Task, offline: bool) {
        self.emit(TaskEvent::TaskCompleted {
            task: task.clone(),
            offline,
        });
    }

    pub fn emit_task_activated(&self, task: &Task, offline: bool) {
        self.emit(TaskEvent::TaskActivated {
            task: task.clone(),
            offline,
        });
    }

    pub fn emit_operation_queued(&self, op_type: OperationType, task_id: &TaskId, pending: usize) {
        self.emit(TaskEvent::OperationQueued {
            op_type,
            task_id: task_id.clone(),
            pending,
        });
    }

    pub fn emit_sync_started(&self, pending: usize) {
        self.emit(TaskEvent::SyncStarted { pending });
    }

    pub fn emit_sync_completed(&self, replayed: usize) {
        self.emit(TaskEvent::SyncCompleted { replayed });
    }

    pub fn emit_sync_failed(&self, message: &str, remaining: usize) {
        self.emit(TaskEvent::SyncFailed {
            message: message.to_string(),
            remaining,
        });
    }

    pub fn emit_connection_lost(&self) {
        self.emit(TaskEvent::ConnectionLost);
    }

    pub fn emit_connection_restored(&self) {
        self.emit(TaskEvent::ConnectionRestored);
    }

    pub fn emit_tasks_reloaded(&self, active: usize, future: usize, done: usize) {
        self.emit(TaskEvent::TasksReloaded {
            active,
            future,
            done,
        });
    }

    /// Deliver all queued events. Must run on the registration thread.
    pub fn process_events(&self) -> ClientResult<usize> {
        {
            let thread_id = self
                .callback_thread_id
                .lock()
                .map_err(|_| ClientError::LockError("thread ID".into()))?;
            match *thread_id {
                Some(expected) if thread::current().id() != expected => {
                    return Err(ClientError::ThreadSafetyViolation);
                }
                Some(_) => {}
                None => return Err(ClientError::NoCallbacksRegistered),
            }
        }

        let callbacks = self
            .callbacks
            .lock()
            .map_err(|_| ClientError::LockError("callbacks".into()))?;
        let queue = self
            .event_queue
            .lock()
            .map_err(|_| ClientError::LockError("event_queue".into()))?;

        let mut processed = 0;
        while let Ok(event) = queue.try_recv() {
            let event_type = event.event_type();
            for entry in callbacks.iter() {
                if entry.event_filter.map_or(true, |f| f == event_type) {
                    (entry.callback)(event.clone());
                }
            }
            processed += 1;
        }

        Ok(processed)
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
