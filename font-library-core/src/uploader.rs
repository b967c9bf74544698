//! High-level pipeline: turns candidate files into Font Library records.
//!
//! For each file, in order and independently:
//!   1. derive the font name from the filename stem
//!   2. skip if a record with that name already exists
//!   3. read the file bytes
//!   4. create the record
//!   5. store the bytes as a public attachment of the record
//!   6. write the attachment URL into the record's attach field
//!   7. commit
//!
//! A failure in steps 1-6 rolls back that file's writes and moves on to the
//! next file; one bad file never aborts the batch. There are no retries.
//!
//! # Rollback
//! The store offers no multi-call transaction, so every write is recorded in a
//! per-file [`Journal`]. Committing drops the journal; rolling back deletes the
//! journaled writes in reverse order.
//!
//! # Navigation
//! - Entrypoints: [`upload_directory`], [`upload_files`]
//! - Output: [`UploadReport`]

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::LibraryConfig;
use crate::contract::{CandidateFile, FontStore, NewAttachment, StoreError};
use crate::scan;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("path has no usable filename: {0}")]
    InvalidFileName(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    /// Number of candidate files handed to the uploader.
    pub found: usize,
    pub uploaded: Vec<UploadedFont>,
    pub skipped: Vec<SkippedFont>,
    pub failed: Vec<FailedFont>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedFont {
    pub path: PathBuf,
    pub font_name: String,
    pub record_name: String,
    pub file_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFont {
    pub path: PathBuf,
    pub font_name: String,
    pub existing_record: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFont {
    pub path: PathBuf,
    pub error: String,
    /// False when compensation failed and a partial record may remain.
    pub rolled_back: bool,
}

enum Outcome {
    Uploaded(UploadedFont),
    Skipped(SkippedFont),
}

/// Writes performed for the file currently being processed.
#[derive(Default)]
struct Journal {
    record: Option<String>,
    attachment: Option<String>,
}

impl Journal {
    /// Undo the journaled writes, newest first. Returns false if anything could not be undone.
    async fn rollback<S: FontStore + ?Sized>(self, store: &S) -> bool {
        let mut clean = true;
        if let Some(attachment) = self.attachment {
            if let Err(e) = store.delete_attachment(&attachment).await {
                error!(error = %e, attachment = %attachment, "[UPLOAD][ROLLBACK] Failed to delete attachment");
                clean = false;
            } else {
                debug!(attachment = %attachment, "[UPLOAD][ROLLBACK] Deleted attachment");
            }
        }
        if let Some(record) = self.record {
            if let Err(e) = store.delete_record(&record).await {
                error!(error = %e, record = %record, "[UPLOAD][ROLLBACK] Failed to delete record");
                clean = false;
            } else {
                debug!(record = %record, "[UPLOAD][ROLLBACK] Deleted record");
            }
        }
        clean
    }
}

/// Upload every regular file directly inside `dir`. No extension filter is applied.
pub async fn upload_directory<S>(
    store: &S,
    config: &LibraryConfig,
    dir: &Path,
) -> Result<UploadReport, std::io::Error>
where
    S: FontStore + ?Sized,
{
    let files = scan::list_files(dir)?;
    info!(path = %dir.display(), count = files.len(), "[UPLOAD] Found files to upload");
    Ok(upload_files(store, config, &files).await)
}

/// Upload the given files one after another, isolating failures per file.
pub async fn upload_files<S>(store: &S, config: &LibraryConfig, files: &[PathBuf]) -> UploadReport
where
    S: FontStore + ?Sized,
{
    info!(count = files.len(), doctype = %config.doctype, "[UPLOAD] Starting upload");
    let mut report = UploadReport {
        found: files.len(),
        ..Default::default()
    };

    for path in files {
        let mut journal = Journal::default();
        match upload_one(store, config, path, &mut journal).await {
            Ok(Outcome::Uploaded(font)) => {
                info!(
                    font_name = %font.font_name,
                    record = %font.record_name,
                    file_url = %font.file_url,
                    "[UPLOAD] Uploaded and linked"
                );
                report.uploaded.push(font);
            }
            Ok(Outcome::Skipped(skip)) => {
                warn!(
                    font_name = %skip.font_name,
                    existing = %skip.existing_record,
                    path = %path.display(),
                    "[UPLOAD] Skipping, record already exists"
                );
                report.skipped.push(skip);
            }
            Err(e) => {
                let rolled_back = journal.rollback(store).await;
                error!(error = %e, path = %path.display(), rolled_back, "[UPLOAD][ERROR] Error processing file");
                report.failed.push(FailedFont {
                    path: path.clone(),
                    error: e.to_string(),
                    rolled_back,
                });
            }
        }
    }

    info!(
        uploaded = report.uploaded.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "[UPLOAD] All files processed"
    );
    match serde_json::to_string_pretty(&report) {
        Ok(json) => debug!(json = %json, "[UPLOAD][DEBUG] Upload report as JSON"),
        Err(e) => error!(error = ?e, "[UPLOAD][DEBUG] Failed to serialize upload report"),
    }
    report
}

async fn upload_one<S>(
    store: &S,
    config: &LibraryConfig,
    path: &Path,
    journal: &mut Journal,
) -> Result<Outcome, UploadError>
where
    S: FontStore + ?Sized,
{
    let candidate =
        CandidateFile::from_path(path).ok_or_else(|| UploadError::InvalidFileName(path.into()))?;

    if let Some(existing) = store.find_by_name(&candidate.font_name).await? {
        return Ok(Outcome::Skipped(SkippedFont {
            path: candidate.path,
            font_name: candidate.font_name,
            existing_record: existing,
        }));
    }

    let content = tokio::fs::read(path).await.map_err(|source| UploadError::Read {
        path: path.into(),
        source,
    })?;
    debug!(path = %path.display(), size = content.len(), "[UPLOAD] Read file");

    let record = store.create_record(&candidate.font_name).await?;
    journal.record = Some(record.name.clone());

    let attachment = store
        .store_attachment(NewAttachment {
            filename: &candidate.filename,
            content: &content,
            doctype: &config.doctype,
            record_name: &record.name,
            is_private: false,
        })
        .await?;
    journal.attachment = Some(attachment.name.clone());

    store
        .link_attachment(&record.name, &attachment.file_url)
        .await?;

    // Commit: every write is already persisted, nothing left to undo.
    *journal = Journal::default();

    Ok(Outcome::Uploaded(UploadedFont {
        path: candidate.path,
        font_name: candidate.font_name,
        record_name: record.name,
        file_url: attachment.file_url,
    }))
}
