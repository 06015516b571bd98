//! Gemini API client for text generation, video rendering, and judgment.
//!
//! One HTTP client fronts the three remote services the pipeline depends on:
//! the `generateContent` text endpoint, the Veo long-running render endpoint,
//! and the Files service used to stage videos for judgment. Each concern is
//! exposed behind its own trait so orchestrators can be tested against mock
//! implementations.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::GeminiError;

/// Default text/judgment model.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-pro-preview";

/// Default video render model.
pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-generate-preview";

/// Negative prompt applied to every render request.
const NEGATIVE_PROMPT: &str =
    "cartoon, drawing, animation, low quality, blurry, watermark, text overlay";

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Sampling parameters for a text generation request.
#[derive(Debug, Clone, Default)]
pub struct SamplingParams {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    /// When set, the model is constrained to emit this MIME type
    /// (e.g. "application/json").
    pub response_mime_type: Option<String>,
}

impl SamplingParams {
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_json_response(mut self) -> Self {
        self.response_mime_type = Some("application/json".to_string());
        self
    }
}

/// Trait for providers that can generate text from a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for the given prompt and return the raw response body.
    async fn generate_text(
        &self,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<String, GeminiError>;
}

/// Status snapshot of an in-flight render operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPoll {
    pub done: bool,
    /// Download URI of the rendered video, present once done without error.
    pub video_uri: Option<String>,
    /// Terminal error reported by the operation, if any.
    pub error: Option<String>,
}

/// Trait for the asynchronous video render service.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Launch a render and return the opaque operation name.
    async fn launch_render(&self, prompt: &str) -> Result<String, GeminiError>;

    /// Fetch the current status of a render operation.
    async fn poll_render(&self, operation: &str) -> Result<RenderPoll, GeminiError>;

    /// Download a completed video to `dest`.
    async fn download_video(&self, uri: &str, dest: &Path) -> Result<(), GeminiError>;
}

/// A video staged on the remote Files service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Server-assigned resource name (e.g. "files/abc123").
    pub name: String,
    pub uri: String,
    /// "PROCESSING", "ACTIVE", or "FAILED".
    pub state: String,
    pub mime_type: String,
}

impl RemoteFile {
    pub fn is_processing(&self) -> bool {
        self.state == "PROCESSING"
    }

    pub fn is_active(&self) -> bool {
        self.state == "ACTIVE"
    }
}

/// Trait for the file-staging and vision-judgment service.
#[async_trait]
pub trait VideoJudge: Send + Sync {
    /// Upload a local video file for server-side processing.
    async fn upload_video(&self, path: &Path) -> Result<RemoteFile, GeminiError>;

    /// Re-fetch the state of an uploaded file.
    async fn get_file(&self, name: &str) -> Result<RemoteFile, GeminiError>;

    /// Delete an uploaded file from the remote service.
    async fn delete_file(&self, name: &str) -> Result<(), GeminiError>;

    /// Ask the vision-language model to judge an uploaded video and return
    /// the raw response body.
    async fn judge_video(&self, file: &RemoteFile, prompt: &str) -> Result<String, GeminiError>;
}

/// HTTP client for the Gemini family of APIs.
pub struct GeminiClient {
    api_base: String,
    api_key: String,
    text_model: String,
    video_model: String,
    http_client: Client,
}

impl GeminiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `GeminiError::MissingApiKey` if `api_key` is empty.
    pub fn new(
        api_key: impl Into<String>,
        text_model: impl Into<String>,
        video_model: impl Into<String>,
    ) -> Result<Self, GeminiError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(GeminiError::MissingApiKey);
        }

        Ok(Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key,
            text_model: text_model.into(),
            video_model: video_model.into(),
            http_client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .map_err(|e| GeminiError::RequestFailed(e.to_string()))?,
        })
    }

    /// Override the API base URL (used against local test servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    pub fn video_model(&self) -> &str {
        &self.video_model
    }

    async fn generate_content(
        &self,
        model: &str,
        contents: Vec<ContentPart>,
        params: &SamplingParams,
    ) -> Result<String, GeminiError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_base, model);
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: contents,
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                response_mime_type: params.response_mime_type.clone(),
            },
        };

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        let response = check_status(response).await?;
        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        Ok(parsed.first_text().unwrap_or_default())
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(
        &self,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<String, GeminiError> {
        let model = self.text_model.clone();
        self.generate_content(&model, vec![ContentPart::text(prompt)], params)
            .await
    }
}

#[async_trait]
impl VideoBackend for GeminiClient {
    async fn launch_render(&self, prompt: &str) -> Result<String, GeminiError> {
        let url = format!(
            "{}/v1beta/models/{}:predictLongRunning",
            self.api_base, self.video_model
        );
        let body = PredictRequest {
            instances: vec![PredictInstance {
                prompt: prompt.to_string(),
            }],
            parameters: PredictParameters {
                negative_prompt: NEGATIVE_PROMPT.to_string(),
                aspect_ratio: "16:9".to_string(),
                person_generation: "allow_all".to_string(),
            },
        };

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        let response = check_status(response).await?;
        let operation: OperationResponse = response
            .json()
            .await
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        Ok(operation.name)
    }

    async fn poll_render(&self, operation: &str) -> Result<RenderPoll, GeminiError> {
        let url = format!("{}/v1beta/{}", self.api_base, operation);
        let response = self
            .http_client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        let response = check_status(response).await?;
        let status: OperationStatus = response
            .json()
            .await
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        Ok(RenderPoll {
            done: status.done,
            video_uri: status.first_video_uri(),
            error: status.error.map(|e| e.message),
        })
    }

    async fn download_video(&self, uri: &str, dest: &Path) -> Result<(), GeminiError> {
        let response = self
            .http_client
            .get(uri)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        let response = check_status(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, &bytes)?;
        Ok(())
    }
}

#[async_trait]
impl VideoJudge for GeminiClient {
    async fn upload_video(&self, path: &Path) -> Result<RemoteFile, GeminiError> {
        let url = format!("{}/upload/v1beta/files", self.api_base);
        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video.mp4")
            .to_string();
        let bytes = std::fs::read(path)?;

        let metadata = serde_json::json!({ "file": { "display_name": display_name } });
        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")
                    .map_err(|e| GeminiError::RequestFailed(e.to_string()))?,
            )
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(display_name)
                    .mime_str("video/mp4")
                    .map_err(|e| GeminiError::RequestFailed(e.to_string()))?,
            );

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        let response = check_status(response).await?;
        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        Ok(uploaded.file.into())
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, GeminiError> {
        let url = format!("{}/v1beta/{}", self.api_base, name);
        let response = self
            .http_client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        let response = check_status(response).await?;
        let file: FileResource = response
            .json()
            .await
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        Ok(file.into())
    }

    async fn delete_file(&self, name: &str) -> Result<(), GeminiError> {
        let url = format!("{}/v1beta/{}", self.api_base, name);
        let response = self
            .http_client
            .delete(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        check_status(response).await?;
        Ok(())
    }

    async fn judge_video(&self, file: &RemoteFile, prompt: &str) -> Result<String, GeminiError> {
        let model = self.text_model.clone();
        let parts = vec![
            ContentPart::file(&file.uri, &file.mime_type),
            ContentPart::text(prompt),
        ];
        let params = SamplingParams::default()
            .with_temperature(0.1)
            .with_json_response();
        self.generate_content(&model, parts, &params).await
    }
}

/// Map a non-success HTTP response to a `GeminiError`, preferring the
/// structured error message when the body carries one.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GeminiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string());

    if let Ok(parsed) = serde_json::from_str::<ApiErrorResponse>(&body) {
        return Err(GeminiError::Api {
            code,
            message: parsed.error.message,
        });
    }

    Err(GeminiError::Api {
        code,
        message: body,
    })
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
struct ContentPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "fileData", skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

impl ContentPart {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            file_data: None,
        }
    }

    fn file(uri: &str, mime_type: &str) -> Self {
        Self {
            text: None,
            file_data: Some(FileData {
                file_uri: uri.to_string(),
                mime_type: mime_type.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct FileData {
    #[serde(rename = "fileUri")]
    file_uri: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(rename = "topP", skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn first_text(&self) -> Option<String> {
        self.candidates
            .first()?
            .content
            .parts
            .iter()
            .find_map(|p| p.text.clone())
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
struct PredictParameters {
    #[serde(rename = "negativePrompt")]
    negative_prompt: String,
    #[serde(rename = "aspectRatio")]
    aspect_ratio: String,
    #[serde(rename = "personGeneration")]
    person_generation: String,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<OperationResult>,
}

impl OperationStatus {
    fn first_video_uri(&self) -> Option<String> {
        self.response
            .as_ref()?
            .generate_video_response
            .generated_samples
            .first()
            .map(|s| s.video.uri.clone())
    }
}

#[derive(Debug, Deserialize)]
struct OperationError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct OperationResult {
    #[serde(rename = "generateVideoResponse")]
    generate_video_response: GenerateVideoResponse,
}

#[derive(Debug, Deserialize)]
struct GenerateVideoResponse {
    #[serde(rename = "generatedSamples", default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: VideoRef,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    state: String,
    #[serde(rename = "mimeType", default)]
    mime_type: String,
}

impl From<FileResource> for RemoteFile {
    fn from(file: FileResource) -> Self {
        Self {
            name: file.name,
            uri: file.uri,
            state: file.state,
            mime_type: file.mime_type,
        }
    }
}
