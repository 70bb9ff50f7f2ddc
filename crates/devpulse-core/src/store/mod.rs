mod context_store;
mod snapshot;

pub use context_store::ContextStore;
pub use snapshot::{InMemoryStore, JsonFileStore, SnapshotStore, CONTEXT_FILE_NAME, DEFAULT_DATA_DIR};
