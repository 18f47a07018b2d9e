//! Minimal Google Drive v3 client: list a folder's PDFs, download, upload.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::config::DriveConfig;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

pub struct DriveClient {
    client: Client,
    access_token: String,
    base_url: String,
    upload_url: String,
}

impl DriveClient {
    pub fn new(config: &DriveConfig) -> Result<Self> {
        if config.access_token.is_empty() {
            anyhow::bail!(
                "Drive access token is required. Set drive.access_token in the config file."
            );
        }

        Ok(Self {
            client: Client::new(),
            access_token: config.access_token.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            upload_url: config
                .upload_url
                .clone()
                .unwrap_or_else(|| DEFAULT_UPLOAD_URL.to_string()),
        })
    }

    /// All PDFs directly inside a folder, following pagination.
    pub async fn list_pdfs(&self, folder_id: &str) -> Result<Vec<DriveFile>> {
        let query = format!(
            "'{}' in parents and mimeType='application/pdf' and trashed=false",
            folder_id.replace('\'', "\\'")
        );

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .get(format!("{}/files", self.base_url))
                .bearer_auth(&self.access_token)
                .query(&[
                    ("q", query.as_str()),
                    ("fields", "nextPageToken,files(id,name,mimeType)"),
                    ("pageSize", "100"),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .context("Failed to send request to Drive API")?;
            let page: FileList = Self::check(response)
                .await?
                .json()
                .await
                .context("Failed to parse Drive file list")?;

            debug!("Drive page with {} files", page.files.len());
            files.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(files)
    }

    pub async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(format!("{}/files/{}", self.base_url, file_id))
            .bearer_auth(&self.access_token)
            .query(&[("alt", "media")])
            .send()
            .await
            .context("Failed to send request to Drive API")?;

        let bytes = Self::check(response)
            .await?
            .bytes()
            .await
            .context("Failed to read Drive download")?;
        Ok(bytes.to_vec())
    }

    /// Create a file in `folder_id` with a multipart/related upload.
    pub async fn upload(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        content: &[u8],
    ) -> Result<DriveFile> {
        let metadata = serde_json::json!({
            "name": name,
            "parents": [folder_id],
            "mimeType": mime_type,
        });

        // Fresh per request so no uploaded content can contain it.
        let boundary = format!("labextract-{}", Uuid::new_v4().simple());

        let response = self
            .client
            .post(format!("{}/files", self.upload_url))
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "multipart"), ("fields", "id,name,mimeType")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(related_body(&boundary, &metadata.to_string(), mime_type, content))
            .send()
            .await
            .context("Failed to send upload to Drive API")?;

        Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse Drive upload response")
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Drive API error ({}): {}", status, error_text);
        }
        Ok(response)
    }
}

fn related_body(boundary: &str, metadata: &str, mime_type: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: {t}\r\n\r\n",
            b = boundary,
            m = metadata,
            t = mime_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
