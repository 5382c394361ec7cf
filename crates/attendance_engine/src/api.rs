use std::path::Path;
use std::time::Duration;

use attendance_core::{
    AnalysisReport, ExportRequest, ExtractedFolder, FileEntry, PdfAvailability, TaskId,
    TaskSnapshot,
};
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::tracker::TrackerSettings;
use crate::ApiError;

/// Connection settings shared by the API client and the log stream relay.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Upper bound for one JSON call. Analysis runs face matching on the
    /// server and can take minutes.
    pub request_timeout: Duration,
    pub tracker: TrackerSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(600),
            tracker: TrackerSettings::default(),
        }
    }
}

impl ClientSettings {
    /// Base URL normalized to end with `/` so relative joins keep any path prefix.
    pub(crate) fn base(&self) -> Result<Url, ApiError> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw).map_err(|err| ApiError::InvalidUrl(err.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(format!("{raw} cannot be a base url")));
        }
        Ok(url)
    }
}

/// Builds `{base}/seg/seg/...`, percent-encoding each segment.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// REST surface of the attendance server.
#[async_trait::async_trait]
pub trait ApiClient: Send + Sync {
    async fn analyze_full(&self) -> Result<AnalysisReport, ApiError>;
    async fn export_word(&self, request: &ExportRequest) -> Result<String, ApiError>;
    async fn list_result_files(&self) -> Result<Vec<FileEntry>, ApiError>;
    async fn download_result(&self, name: &str) -> Result<Bytes, ApiError>;
    async fn pdf_check(&self) -> Result<PdfAvailability, ApiError>;
    async fn upload_pdf(&self, path: &Path) -> Result<String, ApiError>;
    async fn start_extraction(&self, filename: &str) -> Result<TaskId, ApiError>;
    async fn task_status(&self, task_id: &TaskId) -> Result<TaskSnapshot, ApiError>;
    async fn list_pdf_uploads(&self) -> Result<Vec<FileEntry>, ApiError>;
    async fn list_extracted_files(&self) -> Result<Vec<ExtractedFolder>, ApiError>;
    async fn download_extracted(&self, folder: &str, name: &str) -> Result<Bytes, ApiError>;
}

#[derive(Deserialize)]
struct ExportResponse {
    filename: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    filename: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    task_id: TaskId,
}

#[derive(Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Option<Vec<FileEntry>>,
}

#[derive(Deserialize)]
struct FolderListResponse {
    #[serde(default)]
    folders: Option<Vec<ExtractedFolder>>,
}

#[derive(Debug, Clone)]
pub struct ReqwestApi {
    client: reqwest::Client,
    base: Url,
}

impl ReqwestApi {
    pub fn new(settings: &ClientSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self {
            client,
            base: settings.base()?,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        endpoint(&self.base, segments)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        fallback: &str,
    ) -> Result<T, ApiError> {
        let request = self.client.get(self.url(segments)?);
        let value = send_json(request).await?;
        decode_envelope(value, fallback)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &Value,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let request = self
            .client
            .post(self.url(segments)?)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        let value = send_json(request).await?;
        decode_envelope(value, fallback)
    }

    async fn get_bytes(&self, segments: &[&str]) -> Result<Bytes, ApiError> {
        let response = self.client.get(self.url(segments)?).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl ApiClient for ReqwestApi {
    async fn analyze_full(&self) -> Result<AnalysisReport, ApiError> {
        self.post_json(&["api", "analyze-full"], &Value::Object(Default::default()), "Analysis failed")
            .await
    }

    async fn export_word(&self, request: &ExportRequest) -> Result<String, ApiError> {
        let body = serde_json::to_value(request).map_err(|err| ApiError::Decode(err.to_string()))?;
        let response: ExportResponse = self
            .post_json(&["api", "export-word"], &body, "Export failed")
            .await?;
        Ok(response.filename)
    }

    async fn list_result_files(&self) -> Result<Vec<FileEntry>, ApiError> {
        let response: FileListResponse = self
            .get_json(&["api", "files", "results"], "Could not list result files")
            .await?;
        Ok(response.files.unwrap_or_default())
    }

    async fn download_result(&self, name: &str) -> Result<Bytes, ApiError> {
        self.get_bytes(&["api", "files", "download", name]).await
    }

    async fn pdf_check(&self) -> Result<PdfAvailability, ApiError> {
        self.get_json(&["api", "pdf", "check"], "Could not check PDF support")
            .await
    }

    async fn upload_pdf(&self, path: &Path) -> Result<String, ApiError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|err| ApiError::Io(format!("{}: {err}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".to_string());
        let part = Part::bytes(content)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let request = self
            .client
            .post(self.url(&["api", "pdf", "upload"])?)
            .multipart(Form::new().part("file", part));
        let value = send_json(request).await?;
        let response: UploadResponse = decode_envelope(value, "Upload failed")?;
        Ok(response.filename)
    }

    async fn start_extraction(&self, filename: &str) -> Result<TaskId, ApiError> {
        let body = serde_json::json!({ "filename": filename });
        let response: ExtractResponse = self
            .post_json(&["api", "pdf", "extract"], &body, "PDF extraction failed")
            .await?;
        Ok(response.task_id)
    }

    async fn task_status(&self, task_id: &TaskId) -> Result<TaskSnapshot, ApiError> {
        self.get_json(&["api", "pdf", "status", task_id.as_str()], "Unknown task")
            .await
    }

    async fn list_pdf_uploads(&self) -> Result<Vec<FileEntry>, ApiError> {
        let response: FileListResponse = self
            .get_json(&["api", "pdf", "uploads"], "Could not list uploads")
            .await?;
        Ok(response.files.unwrap_or_default())
    }

    async fn list_extracted_files(&self) -> Result<Vec<ExtractedFolder>, ApiError> {
        let response: FolderListResponse = self
            .get_json(&["api", "pdf", "files"], "Could not list extracted files")
            .await?;
        Ok(response.folders.unwrap_or_default())
    }

    async fn download_extracted(&self, folder: &str, name: &str) -> Result<Bytes, ApiError> {
        self.get_bytes(&["api", "pdf", "download", folder, name]).await
    }
}

/// Sends a request and parses the body as JSON.
///
/// Error statuses still carry a JSON body with an `error` field; that text
/// wins over the bare status code.
async fn send_json(request: reqwest::RequestBuilder) -> Result<Value, ApiError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(status_error(status.as_u16(), &body));
    }
    serde_json::from_slice(&body).map_err(|err| ApiError::Decode(err.to_string()))
}

fn status_error(status: u16, body: &[u8]) -> ApiError {
    serde_json::from_slice::<Value>(body)
        .ok()
        .as_ref()
        .and_then(error_text)
        .map(|message| ApiError::server(Some(status), message))
        .unwrap_or(ApiError::HttpStatus(status))
}

fn error_text(value: &Value) -> Option<String> {
    value
        .get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

/// Maps `{success: false, error?}` to [`ApiError::Server`] and decodes anything else as `T`.
pub(crate) fn decode_envelope<T: DeserializeOwned>(value: Value, fallback: &str) -> Result<T, ApiError> {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = error_text(&value).unwrap_or_else(|| fallback.to_string());
        return Err(ApiError::server(None, message));
    }
    serde_json::from_value(value).map_err(|err| ApiError::Decode(err.to_string()))
}
