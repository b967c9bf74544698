//! Frappe REST client: the production [`FontStore`], talking to a site's
//! resource and upload endpoints.
//!
//! Implements [`FontStore`] against a Frappe site:
//!
//! | operation           | request                                                     |
//! |---------------------|-------------------------------------------------------------|
//! | `find_by_name`      | `GET /api/resource/<doctype>?filters=..&fields=["name"]`    |
//! | `create_record`     | `POST /api/resource/<doctype>`                              |
//! | `store_attachment`  | `POST /api/method/upload_file` (multipart)                  |
//! | `link_attachment`   | `PUT /api/resource/<doctype>/<name>`                        |
//! | `delete_attachment` | `DELETE /api/resource/File/<name>`                          |
//! | `delete_record`     | `DELETE /api/resource/<doctype>/<name>`                     |
//!
//! Requests authenticate with `Authorization: token <key>:<secret>`. Permission
//! checks are whatever the API user's roles allow.

use async_trait::async_trait;
use font_library_core::config::LibraryConfig;
use font_library_core::contract::{
    FontRecord, FontStore, NewAttachment, StoreError, StoredAttachment,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::load_config::Credentials;

#[derive(Debug, Deserialize)]
struct ListResponse {
    data: Vec<NameOnly>,
}

#[derive(Debug, Deserialize)]
struct NameOnly {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DocResponse {
    data: NameOnly,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    message: UploadedFile,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    name: String,
    file_url: String,
    #[serde(default)]
    content_hash: Option<String>,
}

pub struct FrappeClient {
    http: reqwest::Client,
    base: Url,
    library: LibraryConfig,
}

impl FrappeClient {
    pub fn new(
        site_url: &str,
        credentials: &Credentials,
        library: LibraryConfig,
    ) -> Result<Self, StoreError> {
        Self::with_builder(site_url, credentials, library, reqwest::Client::builder())
    }

    fn with_builder(
        site_url: &str,
        credentials: &Credentials,
        library: LibraryConfig,
        builder: reqwest::ClientBuilder,
    ) -> Result<Self, StoreError> {
        let base = Url::parse(site_url).map_err(|e| {
            tracing::error!(error = ?e, site_url, "Invalid site url");
            StoreError::Transport(format!("invalid site url {site_url}: {e}"))
        })?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Transport(format!(
                "site url cannot be a base: {site_url}"
            )));
        }

        let token = format!("token {}:{}", credentials.api_key, credentials.api_secret);
        let mut auth = HeaderValue::from_str(&token)
            .map_err(|e| StoreError::Transport(format!("invalid api credentials: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = builder
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        tracing::info!(
            site = %base,
            doctype = %library.doctype,
            "Initialized FrappeClient"
        );
        Ok(Self {
            http,
            base,
            library,
        })
    }

    /// Join percent-encoded path segments onto the site url.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn resource(&self, doctype: &str, name: Option<&str>) -> Url {
        match name {
            Some(name) => self.endpoint(&["api", "resource", doctype, name]),
            None => self.endpoint(&["api", "resource", doctype]),
        }
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Transport(e.to_string())
}

async fn check(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound(url));
    }
    tracing::error!(status = %status, url = %url, "Frappe API returned error. Response body: {body}");
    Err(StoreError::Rejected {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, StoreError> {
    check(resp)
        .await?
        .json::<T>()
        .await
        .map_err(|e| StoreError::Decode(e.to_string()))
}

/// `[[field, "=", value]]`, the filter syntax of the resource list endpoint.
fn equals_filter(field: &str, value: &str) -> String {
    serde_json::json!([[field, "=", value]]).to_string()
}

#[async_trait]
impl FontStore for FrappeClient {
    async fn find_by_name(&self, font_name: &str) -> Result<Option<String>, StoreError> {
        tracing::debug!(font_name, "Checking for existing font record");
        let filters = equals_filter(&self.library.font_name_field, font_name);
        let resp = self
            .http
            .get(self.resource(&self.library.doctype, None))
            .query(&[
                ("filters", filters.as_str()),
                ("fields", r#"["name"]"#),
                ("limit_page_length", "1"),
            ])
            .send()
            .await
            .map_err(transport)?;
        let list: ListResponse = decode(resp).await?;
        Ok(list.data.into_iter().next().map(|d| d.name))
    }

    async fn create_record(&self, font_name: &str) -> Result<FontRecord, StoreError> {
        tracing::info!(font_name, doctype = %self.library.doctype, "Creating font record");
        let mut body = serde_json::Map::new();
        body.insert(
            self.library.font_name_field.clone(),
            serde_json::Value::String(font_name.to_string()),
        );
        let resp = self
            .http
            .post(self.resource(&self.library.doctype, None))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let doc: DocResponse = decode(resp).await?;
        tracing::info!(record = %doc.data.name, "Successfully created font record");
        Ok(FontRecord {
            name: doc.data.name,
            font_name: font_name.to_string(),
        })
    }

    async fn store_attachment<'a>(
        &self,
        req: NewAttachment<'a>,
    ) -> Result<StoredAttachment, StoreError> {
        tracing::info!(
            filename = req.filename,
            record = req.record_name,
            size = req.content.len(),
            "Uploading attachment"
        );
        let file = Part::bytes(req.content.to_vec()).file_name(req.filename.to_string());
        let form = Form::new()
            .part("file", file)
            .text("doctype", req.doctype.to_string())
            .text("docname", req.record_name.to_string())
            .text("is_private", if req.is_private { "1" } else { "0" });
        let resp = self
            .http
            .post(self.endpoint(&["api", "method", "upload_file"]))
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let uploaded: UploadResponse = decode(resp).await?;
        tracing::info!(
            attachment = %uploaded.message.name,
            file_url = %uploaded.message.file_url,
            "Successfully stored attachment"
        );
        Ok(StoredAttachment {
            name: uploaded.message.name,
            file_url: uploaded.message.file_url,
            content_hash: uploaded.message.content_hash,
        })
    }

    async fn link_attachment(&self, record_name: &str, file_url: &str) -> Result<(), StoreError> {
        tracing::debug!(record = record_name, file_url, "Linking attachment to record");
        let mut body = serde_json::Map::new();
        body.insert(
            self.library.attach_field.clone(),
            serde_json::Value::String(file_url.to_string()),
        );
        let resp = self
            .http
            .put(self.resource(&self.library.doctype, Some(record_name)))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        Ok(())
    }

    async fn delete_attachment(&self, attachment_name: &str) -> Result<(), StoreError> {
        tracing::info!(attachment = attachment_name, "Deleting attachment");
        let resp = self
            .http
            .delete(self.resource("File", Some(attachment_name)))
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        Ok(())
    }

    async fn delete_record(&self, record_name: &str) -> Result<(), StoreError> {
        tracing::info!(record = record_name, "Deleting font record");
        let resp = self
            .http
            .delete(self.resource(&self.library.doctype, Some(record_name)))
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        Ok(())
    }
}
