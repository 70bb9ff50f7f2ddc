use crate::config::DevPulseConfig;
use anyhow::Result;
use devpulse_core::{ContextStore, JsonFileStore};

pub fn run(config: &DevPulseConfig) -> Result<()> {
    let snapshot = JsonFileStore::in_dir(&config.server.data_dir);
    let path = snapshot.path().to_path_buf();
    let store = ContextStore::open(snapshot);
    store.clear()?;
    println!("✅ Cleared context at {}", path.display());
    Ok(())
}
