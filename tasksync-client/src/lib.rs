pub mod cache;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod database;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod offline_queue;
pub mod queries;
pub mod reconciler;

pub use cache::TaskCache;
pub use client::{Client, SyncOutcome, TaskBoard};
pub use config::ClientConfig;
pub use connectivity::{ConnectivityMode, ConnectivityMonitor};
pub use database::ClientDatabase;
pub use errors::{ClientError, ClientResult, GatewayError};
pub use events::{EventDispatcher, EventType, TaskEvent};
pub use gateway::{HttpGateway, TaskGateway};
pub use offline_queue::OfflineQueue;
pub use reconciler::Reconciler;
