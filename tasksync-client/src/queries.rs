/// SQL queries for the client's local storage
pub struct Queries;

impl Queries {
    /// Key/value schema. Each value is a JSON document owned by one component.
    pub const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS local_storage (
            storage_key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
    "#;

    pub const GET_ITEM: &'static str = "SELECT value FROM local_storage WHERE storage_key = ?1";

    pub const UPSERT_ITEM: &'static str = r#"
        INSERT INTO local_storage (storage_key, value, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(storage_key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
    "#;

    pub const REMOVE_ITEM: &'static str = "DELETE FROM local_storage WHERE storage_key = ?1";

    pub const LIST_KEYS: &'static str = "SELECT storage_key FROM local_storage ORDER BY storage_key";
}

/// Fixed storage keys.
pub struct StorageKeys;

impl StorageKeys {
    pub const TASKS: &'static str = "tasks";
    pub const PENDING_OPERATIONS: &'static str = "pendingOperations";
    pub const TASK_ID_ALIASES: &'static str = "taskIdAliases";
}
