//! Remote inpainting service client
//!
//! The service receives the original image bytes, the strict mask as PNG and
//! the iteration count as one multipart request, and answers with the
//! reconstructed image. Requests are bounded by the configured timeout.

use crate::config::InpaintConfig;
use crate::error::{InpaintError, Result};
use crate::types::{JobId, ResultImage};
use crate::workflow::SubmissionRequest;
use async_trait::async_trait;
use chrono::Utc;
use instant::Instant;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::Instrument;

/// Longest slice of an error body kept in a failure message
const ERROR_BODY_LIMIT: usize = 512;

/// Decoded outcome of a successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InpaintOutput {
    pub result_image: ResultImage,
    /// Identifier from the service, or one derived from the completion time
    pub job_id: JobId,
}

/// Wire form of the service's answer to a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InpaintResponse {
    /// Data URL or bare base64 payload of the result image
    pub result_image: String,
    /// Job identifier; some deployments send it as a number
    #[serde(default)]
    pub job_id: Option<serde_json::Value>,
}

impl InpaintResponse {
    /// Decode the result image and settle on an identifier
    pub fn into_output(self) -> Result<InpaintOutput> {
        let result_image = ResultImage::from_service_field(&self.result_image)?;
        let job_id = match self.job_id {
            Some(serde_json::Value::String(id)) if !id.is_empty() => JobId::new(id),
            Some(serde_json::Value::Number(id)) => JobId::new(id.to_string()),
            _ => JobId::from_timestamp(Utc::now()),
        };
        Ok(InpaintOutput {
            result_image,
            job_id,
        })
    }
}

/// Status of a previously submitted job, passed through as reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// A service able to reconstruct masked regions of an image
#[async_trait]
pub trait InpaintService: Send + Sync {
    /// Send image, mask and iteration count; resolves once with the outcome
    async fn submit(&self, request: &SubmissionRequest) -> Result<InpaintOutput>;

    /// Look up a previously submitted job
    async fn job_status(&self, job_id: &JobId) -> Result<JobStatus> {
        Err(InpaintError::submission(format!(
            "Job status lookup for {} is not supported by this service",
            job_id
        )))
    }

    /// Name used in logs
    fn name(&self) -> &'static str {
        "inpaint-service"
    }
}

/// [`InpaintService`] talking to the HTTP API
#[derive(Debug, Clone)]
pub struct HttpInpaintClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpInpaintClient {
    /// Create a client for the configured base URL and timeout
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Failed to create the HTTP client
    pub fn new(config: &InpaintConfig) -> Result<Self> {
        config.validate()?;
        let timeout = config.request_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InpaintError::network_error("Failed to create HTTP client", &e))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn inpaint_url(&self) -> String {
        format!("{}/inpaint/", self.base_url)
    }

    fn job_url(&self, job_id: &JobId) -> String {
        format!("{}/jobs/{}/", self.base_url, job_id)
    }

    fn build_form(request: &SubmissionRequest) -> Result<Form> {
        let image = Part::bytes(request.image.bytes().to_vec())
            .file_name(format!("image.{}", request.image.extension()))
            .mime_str(request.image.mime())
            .map_err(|e| InpaintError::network_error("Invalid image MIME type", &e))?;
        let mask = Part::bytes(request.mask.to_png_bytes()?)
            .file_name("mask.png")
            .mime_str("image/png")
            .map_err(|e| InpaintError::network_error("Invalid mask MIME type", &e))?;

        Ok(Form::new()
            .part("image", image)
            .part("mask", mask)
            .text("iterations", request.iterations.to_string()))
    }

    fn transport_error(&self, context: &str, error: &reqwest::Error) -> InpaintError {
        if error.is_timeout() {
            InpaintError::Timeout(self.timeout)
        } else {
            InpaintError::network_error(context, error)
        }
    }

    async fn send_submission(&self, request: &SubmissionRequest) -> Result<InpaintOutput> {
        let url = self.inpaint_url();
        let form = Self::build_form(request)?;
        let started = Instant::now();
        log::debug!("Submitting inpainting request to {}", url);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(&format!("Failed to reach {}", url), &e))?;
        let response = Self::error_for_status(&url, response).await?;
        let body: InpaintResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error("Malformed inpainting response", &e))?;

        let output = body.into_output()?;
        crate::tracing_config::events::submission_completed(&output.job_id, started.elapsed());
        Ok(output)
    }

    async fn error_for_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        Err(InpaintError::submission(format!(
            "HTTP error {} for {}: {}",
            status, url, body
        )))
    }
}

#[async_trait]
impl InpaintService for HttpInpaintClient {
    async fn submit(&self, request: &SubmissionRequest) -> Result<InpaintOutput> {
        let span = crate::tracing_config::spans::submission(
            request.ticket.sequence(),
            request.iterations.get(),
        );
        self.send_submission(request).instrument(span).await
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatus> {
        let url = self.job_url(job_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(&format!("Failed to reach {}", url), &e))?;
        let response = Self::error_for_status(&url, response).await?;
        response
            .json()
            .await
            .map_err(|e| self.transport_error("Malformed job status response", &e))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    const PIXEL_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    #[test]
    fn test_response_with_string_job_id() {
        let json = format!(
            r#"{{"result_image":"data:image/png;base64,{}","job_id":"abc-123"}}"#,
            STANDARD.encode(PIXEL_PNG)
        );
        let response: InpaintResponse = serde_json::from_str(&json).unwrap();
        let output = response.into_output().unwrap();
        assert_eq!(output.job_id.as_str(), "abc-123");
        assert_eq!(output.result_image.bytes(), PIXEL_PNG);
    }

    #[test]
    fn test_response_with_numeric_job_id() {
        let json = format!(
            r#"{{"result_image":"{}","job_id":42}}"#,
            STANDARD.encode(PIXEL_PNG)
        );
        let response: InpaintResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(response.into_output().unwrap().job_id.as_str(), "42");
    }

    #[test]
    fn test_missing_job_id_falls_back_to_timestamp() {
        let before = Utc::now().timestamp_millis();
        let response = InpaintResponse {
            result_image: STANDARD.encode(PIXEL_PNG),
            job_id: None,
        };
        let id: i64 = response.into_output().unwrap().job_id.as_str().parse().unwrap();
        assert!(id >= before);
    }

    #[test]
    fn test_malformed_result_is_a_submission_failure() {
        let response = InpaintResponse {
            result_image: "%%%".to_string(),
            job_id: Some(serde_json::Value::String("x".into())),
        };
        assert!(response.into_output().unwrap_err().is_submission_failure());
    }

    #[test]
    fn test_urls_follow_base() {
        let config = InpaintConfig::builder()
            .api_base_url("http://example.test/api/")
            .build()
            .unwrap();
        let client = HttpInpaintClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://example.test/api");
        assert_eq!(client.inpaint_url(), "http://example.test/api/inpaint/");
        assert_eq!(
            client.job_url(&JobId::new("7")),
            "http://example.test/api/jobs/7/"
        );
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_job_status_keeps_unknown_fields() {
        let status: JobStatus =
            serde_json::from_str(r#"{"status":"completed","progress":100}"#).unwrap();
        assert_eq!(status.status.as_deref(), Some("completed"));
        assert_eq!(status.fields["progress"], 100);
    }
}
