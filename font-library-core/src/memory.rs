//! In-process [`FontStore`] implementations.
//!
//! - [`MemoryStore`] keeps records and attachments in memory with the same
//!   semantics as the remote store: no uniqueness constraint on the font name,
//!   attachments must belong to an existing record.
//! - [`DryRunStore`] answers existence checks from a real store but keeps every
//!   write in a local overlay, so a run can be previewed without side effects.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::contract::{FontRecord, FontStore, NewAttachment, StoreError, StoredAttachment};

/// A record held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRecord {
    pub name: String,
    pub font_name: String,
    pub font_file: Option<String>,
}

/// An attachment held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryAttachment {
    pub name: String,
    pub file_url: String,
    pub filename: String,
    pub doctype: String,
    pub record_name: String,
    pub is_private: bool,
    pub content_hash: String,
    pub size: usize,
}

#[derive(Default)]
struct State {
    records: BTreeMap<String, MemoryRecord>,
    attachments: BTreeMap<String, MemoryAttachment>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of all records, ordered by document name.
    pub fn records(&self) -> Vec<MemoryRecord> {
        self.lock().records.values().cloned().collect()
    }

    /// Snapshot of all attachments, ordered by document name.
    pub fn attachments(&self) -> Vec<MemoryAttachment> {
        self.lock().attachments.values().cloned().collect()
    }

    /// Number of records carrying the given font name.
    pub fn count_by_name(&self, font_name: &str) -> usize {
        self.lock()
            .records
            .values()
            .filter(|r| r.font_name == font_name)
            .count()
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..10].to_string()
}

#[async_trait]
impl FontStore for MemoryStore {
    async fn find_by_name(&self, font_name: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .lock()
            .records
            .values()
            .find(|r| r.font_name == font_name)
            .map(|r| r.name.clone()))
    }

    async fn create_record(&self, font_name: &str) -> Result<FontRecord, StoreError> {
        let name = short_id();
        self.lock().records.insert(
            name.clone(),
            MemoryRecord {
                name: name.clone(),
                font_name: font_name.to_string(),
                font_file: None,
            },
        );
        debug!(record = %name, font_name, "memory store: record created");
        Ok(FontRecord {
            name,
            font_name: font_name.to_string(),
        })
    }

    async fn store_attachment<'a>(
        &self,
        req: NewAttachment<'a>,
    ) -> Result<StoredAttachment, StoreError> {
        let mut state = self.lock();
        if !state.records.contains_key(req.record_name) {
            return Err(StoreError::NotFound(req.record_name.to_string()));
        }

        let folder = if req.is_private { "/private/files" } else { "/files" };
        let mut file_url = format!("{folder}/{}", req.filename);
        if state.attachments.values().any(|a| a.file_url == file_url) {
            file_url = format!("{folder}/{}-{}", short_id(), req.filename);
        }

        let content_hash = format!("{:x}", Sha256::digest(req.content));
        let name = short_id();
        state.attachments.insert(
            name.clone(),
            MemoryAttachment {
                name: name.clone(),
                file_url: file_url.clone(),
                filename: req.filename.to_string(),
                doctype: req.doctype.to_string(),
                record_name: req.record_name.to_string(),
                is_private: req.is_private,
                content_hash: content_hash.clone(),
                size: req.content.len(),
            },
        );
        Ok(StoredAttachment {
            name,
            file_url,
            content_hash: Some(content_hash),
        })
    }

    async fn link_attachment(&self, record_name: &str, file_url: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        let record = state
            .records
            .get_mut(record_name)
            .ok_or_else(|| StoreError::NotFound(record_name.to_string()))?;
        record.font_file = Some(file_url.to_string());
        Ok(())
    }

    async fn delete_attachment(&self, attachment_name: &str) -> Result<(), StoreError> {
        self.lock()
            .attachments
            .remove(attachment_name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(attachment_name.to_string()))
    }

    async fn delete_record(&self, record_name: &str) -> Result<(), StoreError> {
        self.lock()
            .records
            .remove(record_name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(record_name.to_string()))
    }
}

/// Reads through to `inner`, writes only to a local overlay.
pub struct DryRunStore<S> {
    inner: S,
    overlay: MemoryStore,
}

impl<S: FontStore> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            overlay: MemoryStore::new(),
        }
    }

    /// Records that a real run would have created.
    pub fn planned(&self) -> Vec<MemoryRecord> {
        self.overlay.records()
    }
}

#[async_trait]
impl<S: FontStore> FontStore for DryRunStore<S> {
    async fn find_by_name(&self, font_name: &str) -> Result<Option<String>, StoreError> {
        if let Some(name) = self.overlay.find_by_name(font_name).await? {
            return Ok(Some(name));
        }
        self.inner.find_by_name(font_name).await
    }

    async fn create_record(&self, font_name: &str) -> Result<FontRecord, StoreError> {
        self.overlay.create_record(font_name).await
    }

    async fn store_attachment<'a>(
        &self,
        req: NewAttachment<'a>,
    ) -> Result<StoredAttachment, StoreError> {
        self.overlay.store_attachment(req).await
    }

    async fn link_attachment(&self, record_name: &str, file_url: &str) -> Result<(), StoreError> {
        self.overlay.link_attachment(record_name, file_url).await
    }

    async fn delete_attachment(&self, attachment_name: &str) -> Result<(), StoreError> {
        self.overlay.delete_attachment(attachment_name).await
    }

    async fn delete_record(&self, record_name: &str) -> Result<(), StoreError> {
        self.overlay.delete_record(record_name).await
    }
}
