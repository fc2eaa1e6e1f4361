//! TaskSync - Offline-first task synchronization
//!
//! This crate provides a unified API for the TaskSync engine: an optimistic
//! task facade that keeps working while the task server is unreachable and
//! replays queued changes once it is back.
//!
//! # Example
//!
//! ```ignore
//! use tasksync::{Client, ClientConfig, Section, TaskDraft};
//!
//! let client = Client::new(ClientConfig::from_env()?).await?;
//! let task = client.create(TaskDraft::new("Water plants", "They are wilting")).await?;
//! let active = client.list_sorted(Section::Active).await;
//! ```

// Re-export client types
pub use tasksync_client::{
    Client, ClientConfig, ClientError, ClientResult, ConnectivityMode, EventDispatcher, EventType,
    GatewayError, HttpGateway, SyncOutcome, TaskBoard, TaskEvent, TaskGateway,
};

// Re-export core types that external applications may need
pub use tasksync_core::sorting;
pub use tasksync_core::{
    OperationType, PendingOperation, Regularity, Section, SyncError, SyncResult, Task, TaskDraft,
    TaskId, TaskPatch, Urgency, Weekday,
};
