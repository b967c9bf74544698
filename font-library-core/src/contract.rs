//! # contract: interfaces between the font sources, the pipeline and the data store
//!
//! This module defines the two seams of the ingest pipeline:
//! - [`FontStore`]: the application data store holding Font Library records and
//!   their file attachments (a Frappe site over REST, an in-memory store, or a mock).
//! - [`Downloader`]: a remote folder that can be mirrored into a temporary directory.
//!
//! Both traits are annotated for `mockall`, so tests can script exact call
//! sequences without a network.
//!
//! ## Type Sources
//! - Request types borrow (`NewAttachment<'a>`), response types own their data.
//! - Errors are typed with `thiserror`; callers decide whether a failure is fatal.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// A Font Library record as returned by the store after creation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FontRecord {
    /// Document name assigned by the store (primary key).
    pub name: String,
    /// Value of the font name field, the dedup key.
    pub font_name: String,
}

/// The minimal data needed to store a file as an attachment of a record.
pub struct NewAttachment<'a> {
    /// Original filename, including extension.
    pub filename: &'a str,
    /// Raw file bytes. Never validated as a font.
    pub content: &'a [u8],
    /// Record type the attachment belongs to.
    pub doctype: &'a str,
    /// Document name of the owning record.
    pub record_name: &'a str,
    /// Private files are only served to logged-in users.
    pub is_private: bool,
}

/// A stored attachment (the application's `File` document).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoredAttachment {
    /// Document name of the `File` record.
    pub name: String,
    /// Public URL of the stored file, the value written into the attach field.
    pub file_url: String,
    pub content_hash: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

/// Trait for the data store that holds Font Library records.
///
/// Writes are not transactional across calls. The uploader journals what it
/// wrote and compensates with the `delete_*` operations on failure.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FontStore: Send + Sync {
    /// Look up a record by its font name. Returns the record's document name if one exists.
    async fn find_by_name(&self, font_name: &str) -> Result<Option<String>, StoreError>;

    /// Insert a new record with only the font name field set.
    async fn create_record(&self, font_name: &str) -> Result<FontRecord, StoreError>;

    /// Store file bytes as an attachment of an existing record.
    async fn store_attachment<'a>(
        &self,
        req: NewAttachment<'a>,
    ) -> Result<StoredAttachment, StoreError>;

    /// Set the attach field of a record to the given file URL and save it.
    async fn link_attachment(&self, record_name: &str, file_url: &str)
        -> Result<(), StoreError>;

    /// Remove a stored attachment by its `File` document name.
    async fn delete_attachment(&self, attachment_name: &str) -> Result<(), StoreError>;

    /// Remove a record by its document name.
    async fn delete_record(&self, record_name: &str) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("invalid folder url: {0}")]
    InvalidFolderUrl(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("drive returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("drive served an html page instead of file {0}")]
    NotAFile(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A temporary directory holding the files fetched from a remote folder.
///
/// The directory is removed when this value is dropped.
#[derive(Debug)]
pub struct DownloadedFolder {
    dir: tempfile::TempDir,
    /// Number of distinct files written into the directory.
    pub file_count: usize,
}

impl DownloadedFolder {
    pub fn new(dir: tempfile::TempDir, file_count: usize) -> Self {
        Self { dir, file_count }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Trait for mirroring a shared folder into a local temporary directory.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetch every file of the folder. Only the creation of the temporary
    /// directory is fatal; fetch failures leave the folder partially populated.
    async fn download_folder(&self, folder_url: &str) -> Result<DownloadedFolder, DownloadError>;
}

/// A file discovered by the scanner or downloader, not yet uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    /// Filename without its last extension.
    pub font_name: String,
    /// Filename including extension, used for the stored attachment.
    pub filename: String,
}

impl CandidateFile {
    /// Derive the font name from the path's filename stem.
    ///
    /// Returns `None` when the path has no UTF-8 filename.
    pub fn from_path(path: &Path) -> Option<Self> {
        let filename = path.file_name()?.to_str()?.to_string();
        let font_name = path.file_stem()?.to_str()?.to_string();
        Some(Self {
            path: path.to_path_buf(),
            font_name,
            filename,
        })
    }
}
