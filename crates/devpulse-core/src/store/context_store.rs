use super::snapshot::{JsonFileStore, SnapshotStore};
use crate::error::Result;
use crate::payload::PlatformPayload;
use crate::platform::{Platform, Scope};
use crate::types::{ContextDocument, ContextStatus, ContextView, FetchStatus, PlatformSection};
use chrono::Utc;
use serde_json::Value;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Single point of truth for the most recent known data per platform.
///
/// Mutations hold the write lock across mutate + persist, so concurrent
/// writers are serialized and every persisted snapshot is a complete document.
/// A mutation becomes visible only once its snapshot has been saved.
pub struct ContextStore<S: SnapshotStore = JsonFileStore> {
    snapshot: S,
    doc: RwLock<ContextDocument>,
}

impl<S: SnapshotStore> ContextStore<S> {
    /// Load the persisted document, or start empty when there is none.
    ///
    /// An unreadable snapshot is treated like a missing one: it is moved aside
    /// and the store starts with every platform `not_fetched`.
    pub fn open(snapshot: S) -> Self {
        let doc = match snapshot.load() {
            Ok(Some(mut doc)) => {
                doc.normalize();
                log::info!(
                    "Loaded context snapshot (last updated: {})",
                    doc.last_updated
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string())
                );
                doc
            }
            Ok(None) => {
                log::info!("No context snapshot found, starting empty");
                ContextDocument::empty()
            }
            Err(e) => {
                log::warn!("Context snapshot unreadable, starting empty: {}", e);
                if let Err(e) = snapshot.quarantine() {
                    log::warn!("Failed to move unreadable snapshot aside: {}", e);
                }
                ContextDocument::empty()
            }
        };

        Self {
            snapshot,
            doc: RwLock::new(doc),
        }
    }

    /// Validate `raw` against the schema of `platform` and record it.
    pub fn record(&self, platform: Platform, raw: Value) -> Result<PlatformSection> {
        let payload = PlatformPayload::from_value(platform, raw)?;
        self.record_payload(payload)
    }

    /// Replace the section of the payload's platform wholesale.
    pub fn record_payload(&self, payload: PlatformPayload) -> Result<PlatformSection> {
        let platform = payload.platform();
        let section = self.mutate(|doc| {
            let now = Utc::now();
            let section = doc.data_sources.get_mut(platform);
            *section = PlatformSection {
                status: FetchStatus::Fetched,
                last_fetch: Some(now),
                last_error: None,
                data: Some(payload),
            };
            doc.last_updated = Some(now);
            doc.data_sources.get(platform).clone()
        })?;
        log::debug!("Recorded {} context", platform);
        Ok(section)
    }

    /// Mark a failed refresh. The previous payload and `last_fetch` are kept.
    pub fn record_failure(
        &self,
        platform: Platform,
        reason: impl Into<String>,
    ) -> Result<PlatformSection> {
        let reason = reason.into();
        log::debug!("Recording {} failure: {}", platform, reason);
        self.mutate(|doc| {
            let section = doc.data_sources.get_mut(platform);
            section.status = FetchStatus::Error;
            section.last_error = Some(reason);
            doc.last_updated = Some(Utc::now());
            doc.data_sources.get(platform).clone()
        })
    }

    pub fn retrieve(&self, platform: Platform) -> PlatformSection {
        self.read().section(platform).clone()
    }

    pub fn retrieve_scope(&self, scope: Scope) -> ContextView {
        self.read().view(scope)
    }

    pub fn document(&self) -> ContextDocument {
        self.read().clone()
    }

    pub fn status(&self) -> ContextStatus {
        self.read().status()
    }

    /// Reset every section to `not_fetched`. Idempotent.
    pub fn clear(&self) -> Result<()> {
        self.mutate(|doc| *doc = ContextDocument::empty())?;
        log::info!("Context cleared");
        Ok(())
    }

    pub fn snapshot_store(&self) -> &S {
        &self.snapshot
    }

    fn read(&self) -> RwLockReadGuard<'_, ContextDocument> {
        self.doc.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ContextDocument> {
        self.doc.write().unwrap_or_else(|e| e.into_inner())
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut ContextDocument) -> R) -> Result<R> {
        let mut doc = self.write();
        let mut next = doc.clone();
        let out = f(&mut next);
        next.recompute_summary();
        self.snapshot.save(&next)?;
        *doc = next;
        Ok(out)
    }
}
