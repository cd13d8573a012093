//! Multipart HTTP upload sink.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::entities::{ApiKey, ProcessedResult, UploadOptions, UploadReceipt};
use crate::domain::errors::UploadError;
use crate::domain::ports::UploadSinkPort;

const USER_AGENT: &str = concat!("imagepress/", env!("CARGO_PKG_VERSION"));
const DEFAULT_REJECTION_MESSAGE: &str = "Upload failed";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    image_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

/// Uploads images as `multipart/form-data` with bearer authentication.
pub struct HttpUploadSink {
    client: Client,
    upload_url: String,
    api_key: ApiKey,
}

impl HttpUploadSink {
    /// Creates a sink posting to `upload_url`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(upload_url: impl Into<String>, api_key: ApiKey) -> Result<Self, UploadError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| UploadError::network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            upload_url: upload_url.into(),
            api_key,
        })
    }

    fn build_form(result: &ProcessedResult, options: &UploadOptions) -> Result<Form, UploadError> {
        let image = Part::bytes(result.bytes.to_vec())
            .file_name(result.derived_filename.clone())
            .mime_str(mime_for(&result.derived_filename))
            .map_err(|e| UploadError::invalid_response(format!("invalid mime type: {e}")))?;

        let mut form = Form::new().part("image", image);

        if let Some(product_id) = &options.product_id {
            form = form.text("productId", product_id.clone());
        }
        if let Some(title) = &options.title {
            form = form.text("title", title.clone());
        }
        if !options.categories.is_empty() {
            let categories = serde_json::to_string(&options.categories)
                .map_err(|e| UploadError::invalid_response(e.to_string()))?;
            form = form.text("categories", categories);
        }
        if !options.tags.is_empty() {
            let tags = serde_json::to_string(&options.tags)
                .map_err(|e| UploadError::invalid_response(e.to_string()))?;
            form = form.text("tags", tags);
        }

        Ok(form)
    }

    async fn handle_error_response(status: StatusCode, response: reqwest::Response) -> UploadError {
        let message = match response.json::<ErrorResponse>().await {
            Ok(ErrorResponse {
                message: Some(message),
            }) if !message.is_empty() => message,
            _ => DEFAULT_REJECTION_MESSAGE.to_string(),
        };
        warn!(status = %status, message = %message, "Upload rejected");
        UploadError::rejected(message)
    }
}

#[async_trait]
impl UploadSinkPort for HttpUploadSink {
    async fn upload(
        &self,
        result: &ProcessedResult,
        options: &UploadOptions,
    ) -> Result<UploadReceipt, UploadError> {
        let form = Self::build_form(result, options)?;

        debug!(
            file = %result.derived_filename,
            size = result.processed_size(),
            key = %self.api_key,
            "Uploading image"
        );

        let response = self
            .client
            .post(&self.upload_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key.as_str()))
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::handle_error_response(status, response).await);
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| UploadError::invalid_response(e.to_string()))?;

        debug!(file = %result.derived_filename, url = %body.image_url, "Upload accepted");
        Ok(UploadReceipt {
            url: body.image_url,
        })
    }
}

fn mime_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("photo-10x10.jpg", "image/jpeg" ; "jpeg")]
    #[test_case("photo-10x10.PNG", "image/png" ; "uppercase_png")]
    #[test_case("photo.webp", "image/webp" ; "webp")]
    #[test_case("photo", "image/jpeg" ; "no_extension")]
    fn test_mime_for(filename: &str, expected: &str) {
        assert_eq!(mime_for(filename), expected);
    }

    #[test]
    fn test_upload_response_shape() {
        let body: UploadResponse =
            serde_json::from_str(r#"{"imageUrl":"https://cdn.example.com/a.jpg","id":7}"#).unwrap();
        assert_eq!(body.image_url, "https://cdn.example.com/a.jpg");
    }

    #[test]
    fn test_sink_creation() {
        let sink = HttpUploadSink::new(
            "https://uploads.example.com/api/images",
            ApiKey::new("secret-key-value").unwrap(),
        );
        assert!(sink.is_ok());
    }
}
