//! Google Drive folder downloader.
//!
//! Mirrors the files of a publicly shared Drive folder into a fresh temporary
//! directory. Listing goes through the embedded folder view, so no API key or
//! cookie is needed; each file is then fetched from the user-content download
//! endpoint.
//!
//! Error handling is folder-level only: the first failure (listing or any
//! single file) ends the fetch, is logged, and the directory is handed back
//! with whatever was written so far.

use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};

use crate::contract::{DownloadError, DownloadedFolder, Downloader};

const FOLDER_VIEW_URL: &str = "https://drive.google.com/embeddedfolderview";
const FILE_DOWNLOAD_URL: &str = "https://drive.usercontent.google.com/download";

/// Base URLs used by [`DriveDownloader`].
#[derive(Debug, Clone)]
pub struct DriveEndpoints {
    pub folder_view: String,
    pub file_download: String,
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self {
            folder_view: FOLDER_VIEW_URL.to_string(),
            file_download: FILE_DOWNLOAD_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
}

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveEntry {
    pub id: String,
    pub title: String,
    pub kind: EntryKind,
}

pub struct DriveDownloader {
    client: reqwest::Client,
    endpoints: DriveEndpoints,
}

impl Default for DriveDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveDownloader {
    pub fn new() -> Self {
        Self::with_endpoints(DriveEndpoints::default())
    }

    pub fn with_endpoints(endpoints: DriveEndpoints) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }

    async fn fetch_into(
        &self,
        folder_url: &str,
        out_dir: &Path,
        written: &mut usize,
    ) -> Result<(), DownloadError> {
        let folder_id = extract_folder_id(folder_url)
            .ok_or_else(|| DownloadError::InvalidFolderUrl(folder_url.to_string()))?;
        info!(folder_id = %folder_id, "[DRIVE] Listing folder");

        let listing = self.list_folder(&folder_id).await?;
        info!(entries = listing.len(), "[DRIVE] Folder listing retrieved");

        for entry in listing {
            match entry.kind {
                EntryKind::Folder => {
                    info!(title = %entry.title, id = %entry.id, "[DRIVE] Skipping subfolder");
                }
                EntryKind::File => {
                    let bytes = self.fetch_file(&entry).await?;
                    let target = out_dir.join(sanitise_filename(&entry.title, &entry.id));
                    let replacing = tokio::fs::try_exists(&target).await?;
                    if replacing {
                        debug!(path = %target.display(), "[DRIVE] Overwriting file with duplicate title");
                    }
                    tokio::fs::write(&target, &bytes).await?;
                    if !replacing {
                        *written += 1;
                    }
                    info!(
                        title = %entry.title,
                        size = bytes.len(),
                        path = %target.display(),
                        "[DRIVE] Downloaded file"
                    );
                }
            }
        }
        Ok(())
    }

    async fn list_folder(&self, folder_id: &str) -> Result<Vec<DriveEntry>, DownloadError> {
        let resp = self
            .client
            .get(&self.endpoints.folder_view)
            .query(&[("id", folder_id)])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        let html = resp.text().await?;
        Ok(parse_folder_listing(&html))
    }

    async fn fetch_file(&self, entry: &DriveEntry) -> Result<Vec<u8>, DownloadError> {
        debug!(id = %entry.id, title = %entry.title, "[DRIVE] Fetching file");
        let resp = self
            .client
            .get(&self.endpoints.file_download)
            .query(&[
                ("id", entry.id.as_str()),
                ("export", "download"),
                ("confirm", "t"),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        let is_html = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/html"))
            .unwrap_or(false);
        if is_html {
            return Err(DownloadError::NotAFile(entry.title.clone()));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Downloader for DriveDownloader {
    async fn download_folder(&self, folder_url: &str) -> Result<DownloadedFolder, DownloadError> {
        let dir = tempfile::Builder::new()
            .prefix("drive_download_")
            .tempdir()?;
        info!(
            folder_url = %folder_url,
            path = %dir.path().display(),
            "[DRIVE] Downloading files from Google Drive folder"
        );

        let mut written = 0;
        if let Err(e) = self.fetch_into(folder_url, dir.path(), &mut written).await {
            warn!(error = %e, "[DRIVE] Folder-level error during download");
            warn!(
                downloaded = written,
                "[DRIVE] Continuing with whatever files were successfully downloaded"
            );
        }

        Ok(DownloadedFolder::new(dir, written))
    }
}

fn folder_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/folders/([A-Za-z0-9_-]+)").expect("valid folder path regex"))
}

fn id_param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]id=([A-Za-z0-9_-]+)").expect("valid id param regex"))
}

fn bare_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{10,}$").expect("valid bare id regex"))
}

fn entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?s)<div class="flip-entry" id="entry-([A-Za-z0-9_-]+)".*?<a href="([^"]*)".*?<div class="flip-entry-title">(.*?)</div>"#,
        )
        .expect("valid folder entry regex")
    })
}

/// Extract the folder id from a share link, an `?id=` link, or a bare id.
pub fn extract_folder_id(folder_url: &str) -> Option<String> {
    let url = folder_url.trim();
    if let Some(c) = folder_path_re().captures(url) {
        return Some(c[1].to_string());
    }
    if let Some(c) = id_param_re().captures(url) {
        return Some(c[1].to_string());
    }
    if bare_id_re().is_match(url) {
        return Some(url.to_string());
    }
    None
}

/// Parse the entries of an embedded folder view page.
pub fn parse_folder_listing(html: &str) -> Vec<DriveEntry> {
    entry_re()
        .captures_iter(html)
        .map(|c| {
            let kind = if c[2].contains("/drive/folders/") {
                EntryKind::Folder
            } else {
                EntryKind::File
            };
            DriveEntry {
                id: c[1].to_string(),
                title: html_unescape(c[3].trim()),
                kind,
            }
        })
        .collect()
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);")
            .expect("valid entity regex")
    })
}

/// Decode named and numeric character references in one pass, so `&amp;lt;`
/// stays `&lt;`. Unknown or invalid references are left as they are.
fn html_unescape(s: &str) -> String {
    entity_re()
        .replace_all(s, |c: &regex::Captures| {
            let entity = &c[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    let code = match entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => entity[1..].parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| c[0].to_string(), String::from)
        })
        .into_owned()
}

/// Turn a Drive title into a filename that stays inside the output directory.
fn sanitise_filename(title: &str, fallback: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}
