use async_trait::async_trait;
use std::fs::{create_dir_all, write};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use font_library_core::config::LibraryConfig;
use font_library_core::contract::{
    DownloadedFolder, Downloader, FontRecord, FontStore, MockDownloader, MockFontStore,
    NewAttachment, StoreError, StoredAttachment,
};
use font_library_core::memory::MemoryStore;
use font_library_core::scan::scan_fonts;
use font_library_core::uploader::{upload_directory, upload_files};

fn write_font(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    write(&path, format!("bytes of {name}")).unwrap();
    path
}

#[derive(Clone, Copy, PartialEq)]
enum FailAt {
    Attach,
    Link,
}

/// Wraps a MemoryStore and fails one step for one filename.
struct FailingStore {
    inner: MemoryStore,
    filename: &'static str,
    at: FailAt,
}

#[async_trait]
impl FontStore for FailingStore {
    async fn find_by_name(&self, font_name: &str) -> Result<Option<String>, StoreError> {
        self.inner.find_by_name(font_name).await
    }

    async fn create_record(&self, font_name: &str) -> Result<FontRecord, StoreError> {
        self.inner.create_record(font_name).await
    }

    async fn store_attachment<'a>(
        &self,
        req: NewAttachment<'a>,
    ) -> Result<StoredAttachment, StoreError> {
        if self.at == FailAt::Attach && req.filename == self.filename {
            return Err(StoreError::Rejected {
                status: 417,
                body: "file too large".into(),
            });
        }
        self.inner.store_attachment(req).await
    }

    async fn link_attachment(&self, record_name: &str, file_url: &str) -> Result<(), StoreError> {
        if self.at == FailAt::Link && file_url.ends_with(self.filename) {
            return Err(StoreError::Transport("connection reset".into()));
        }
        self.inner.link_attachment(record_name, file_url).await
    }

    async fn delete_attachment(&self, attachment_name: &str) -> Result<(), StoreError> {
        self.inner.delete_attachment(attachment_name).await
    }

    async fn delete_record(&self, record_name: &str) -> Result<(), StoreError> {
        self.inner.delete_record(record_name).await
    }
}

#[tokio::test]
async fn existing_font_is_skipped_without_insert() {
    let tmp = tempdir().unwrap();
    let path = write_font(tmp.path(), "Arial.ttf");

    let mut store = MockFontStore::new();
    store
        .expect_find_by_name()
        .times(1)
        .returning(|_| Ok(Some("FL-0001".to_string())));
    store.expect_create_record().never();
    store.expect_store_attachment().never();
    store.expect_link_attachment().never();

    let report = upload_files(&store, &LibraryConfig::default(), &[path]).await;

    assert_eq!(report.found, 1);
    assert!(report.uploaded.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].font_name, "Arial");
    assert_eq!(report.skipped[0].existing_record, "FL-0001");
}

#[tokio::test]
async fn new_font_is_created_attached_publicly_and_linked() {
    let tmp = tempdir().unwrap();
    let path = write_font(tmp.path(), "Lato-Bold.otf");

    let mut store = MockFontStore::new();
    store.expect_find_by_name().returning(|_| Ok(None));
    store
        .expect_create_record()
        .times(1)
        .returning(|font_name: &str| {
            Ok(FontRecord {
                name: "FL-0042".to_string(),
                font_name: font_name.to_string(),
            })
        });
    store
        .expect_store_attachment()
        .times(1)
        .returning(|req: NewAttachment<'_>| {
            assert!(!req.is_private, "attachments must be public");
            assert_eq!(req.doctype, "Font Library");
            assert_eq!(req.record_name, "FL-0042");
            assert_eq!(req.filename, "Lato-Bold.otf");
            assert_eq!(req.content, b"bytes of Lato-Bold.otf");
            Ok(StoredAttachment {
                name: "file-1".to_string(),
                file_url: "/files/Lato-Bold.otf".to_string(),
                content_hash: None,
            })
        });
    store
        .expect_link_attachment()
        .times(1)
        .returning(|record_name: &str, file_url: &str| {
            assert_eq!(record_name, "FL-0042");
            assert_eq!(file_url, "/files/Lato-Bold.otf");
            Ok(())
        });
    store.expect_delete_attachment().never();
    store.expect_delete_record().never();

    let report = upload_files(&store, &LibraryConfig::default(), &[path]).await;

    assert_eq!(report.uploaded.len(), 1);
    let font = &report.uploaded[0];
    assert_eq!(font.font_name, "Lato-Bold");
    assert_eq!(font.record_name, "FL-0042");
    assert_eq!(font.file_url, "/files/Lato-Bold.otf");
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn each_new_file_yields_exactly_one_linked_record() {
    let tmp = tempdir().unwrap();
    let files = vec![
        write_font(tmp.path(), "Arial.ttf"),
        write_font(tmp.path(), "Roboto.woff2"),
    ];
    let store = MemoryStore::new();

    let report = upload_files(&store, &LibraryConfig::default(), &files).await;

    assert_eq!(report.uploaded.len(), 2);
    for name in ["Arial", "Roboto"] {
        assert_eq!(store.count_by_name(name), 1);
    }
    let attachments = store.attachments();
    for record in store.records() {
        let url = record.font_file.expect("attach field must be set");
        let attachment = attachments
            .iter()
            .find(|a| a.file_url == url)
            .expect("font_file must point at a stored attachment");
        assert_eq!(attachment.record_name, record.name);
        assert!(!attachment.is_private);
    }
}

#[tokio::test]
async fn link_failure_rolls_back_and_later_files_still_upload() {
    let tmp = tempdir().unwrap();
    let files = vec![
        write_font(tmp.path(), "Broken.ttf"),
        write_font(tmp.path(), "Fine.ttf"),
    ];
    let store = FailingStore {
        inner: MemoryStore::new(),
        filename: "Broken.ttf",
        at: FailAt::Link,
    };

    let report = upload_files(&store, &LibraryConfig::default(), &files).await;

    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].rolled_back);
    assert!(report.failed[0].error.contains("connection reset"));
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.uploaded[0].font_name, "Fine");

    assert_eq!(store.inner.count_by_name("Broken"), 0);
    assert_eq!(store.inner.count_by_name("Fine"), 1);
    assert_eq!(store.inner.attachments().len(), 1);
}

#[tokio::test]
async fn attach_failure_removes_the_created_record() {
    let tmp = tempdir().unwrap();
    let files = vec![write_font(tmp.path(), "Huge.otf")];
    let store = FailingStore {
        inner: MemoryStore::new(),
        filename: "Huge.otf",
        at: FailAt::Attach,
    };

    let report = upload_files(&store, &LibraryConfig::default(), &files).await;

    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].rolled_back);
    assert!(store.inner.records().is_empty());
    assert!(store.inner.attachments().is_empty());
}

#[tokio::test]
async fn failed_compensation_is_reported() {
    let tmp = tempdir().unwrap();
    let path = write_font(tmp.path(), "Sticky.ttf");

    let mut store = MockFontStore::new();
    store.expect_find_by_name().returning(|_| Ok(None));
    store.expect_create_record().returning(|font_name: &str| {
        Ok(FontRecord {
            name: "FL-7".to_string(),
            font_name: font_name.to_string(),
        })
    });
    store
        .expect_store_attachment()
        .returning(|_req: NewAttachment<'_>| {
            Ok(StoredAttachment {
                name: "file-7".to_string(),
                file_url: "/files/Sticky.ttf".to_string(),
                content_hash: None,
            })
        });
    store
        .expect_link_attachment()
        .returning(|_, _| Err(StoreError::Transport("timeout".into())));
    store
        .expect_delete_attachment()
        .times(1)
        .returning(|_| Err(StoreError::Transport("timeout".into())));
    store.expect_delete_record().times(1).returning(|_| Ok(()));

    let report = upload_files(&store, &LibraryConfig::default(), &[path]).await;

    assert_eq!(report.failed.len(), 1);
    assert!(!report.failed[0].rolled_back);
}

#[tokio::test]
async fn unreadable_file_creates_nothing() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("Ghost.ttf");
    let store = MemoryStore::new();

    let report = upload_files(&store, &LibraryConfig::default(), &[missing]).await;

    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].rolled_back);
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn second_run_over_same_directory_changes_nothing() {
    let tmp = tempdir().unwrap();
    write_font(tmp.path(), "A.ttf");
    write_font(tmp.path(), "B.otf");
    let store = MemoryStore::new();
    let config = LibraryConfig::default();

    let first = upload_directory(&store, &config, tmp.path()).await.unwrap();
    let after_first = store.records();
    let second = upload_directory(&store, &config, tmp.path()).await.unwrap();

    assert_eq!(first.uploaded.len(), 2);
    assert_eq!(second.uploaded.len(), 0);
    assert_eq!(second.skipped.len(), 2);
    assert_eq!(store.records(), after_first);
}

#[tokio::test]
async fn directory_upload_takes_top_level_files_of_any_type() {
    let tmp = tempdir().unwrap();
    write_font(tmp.path(), "readme.txt");
    write_font(tmp.path(), "Inter.ttf");
    let nested = tmp.path().join("nested");
    create_dir_all(&nested).unwrap();
    write_font(&nested, "Deep.ttf");
    let store = MemoryStore::new();

    let report = upload_directory(&store, &LibraryConfig::default(), tmp.path())
        .await
        .unwrap();

    assert_eq!(report.found, 2);
    assert_eq!(store.count_by_name("readme"), 1);
    assert_eq!(store.count_by_name("Inter"), 1);
    assert_eq!(store.count_by_name("Deep"), 0);
}

#[tokio::test]
async fn same_name_in_different_subfolders_is_uploaded_once() {
    let tmp = tempdir().unwrap();
    let regular = tmp.path().join("regular");
    let backup = tmp.path().join("backup");
    create_dir_all(&regular).unwrap();
    create_dir_all(&backup).unwrap();
    write_font(&regular, "Arial.ttf");
    write_font(&backup, "Arial.ttf");
    let store = MemoryStore::new();
    let config = LibraryConfig::default();

    let files = scan_fonts(tmp.path(), &config.valid_extensions);
    let report = upload_files(&store, &config, &files).await;

    assert_eq!(report.found, 2);
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    // backup/ sorts before regular/
    assert!(report.uploaded[0].path.starts_with(&backup));
    assert_eq!(store.count_by_name("Arial"), 1);
}

#[tokio::test]
async fn missing_directory_is_an_error_for_directory_upload() {
    let tmp = tempdir().unwrap();
    let store = MemoryStore::new();
    let result =
        upload_directory(&store, &LibraryConfig::default(), &tmp.path().join("nope")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn downloaded_folder_feeds_directory_upload() {
    let mut downloader = MockDownloader::new();
    downloader
        .expect_download_folder()
        .times(1)
        .returning(|_| {
            let dir = tempdir()?;
            write_font(dir.path(), "Poppins.ttf");
            write_font(dir.path(), "Poppins-Italic.ttf");
            Ok(DownloadedFolder::new(dir, 2))
        });
    let store = MemoryStore::new();

    let folder = downloader
        .download_folder("https://drive.google.com/drive/folders/abcdefghijkl")
        .await
        .unwrap();
    let report = upload_directory(&store, &LibraryConfig::default(), folder.path())
        .await
        .unwrap();

    assert_eq!(folder.file_count, 2);
    assert_eq!(report.uploaded.len(), 2);
    assert_eq!(store.count_by_name("Poppins"), 1);
    assert_eq!(store.count_by_name("Poppins-Italic"), 1);
}
