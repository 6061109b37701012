use crate::errors::{FootprintError, Result};
use crate::paths;
use crate::store::{ArtifactStore, RasterArtifact};
use crate::types::LonLat;
use reqwest::multipart::{Form, Part};
use std::path::PathBuf;
use std::time::Duration;

/// Detector response persisted as the current detection result.
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub path: PathBuf,
    pub size: u64,
}

/// Client for the remote building detector (`POST <base>/detect`).
#[derive(Debug, Clone)]
pub struct DetectionClient {
    http: reqwest::Client,
    endpoint: String,
}

impl DetectionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FootprintError::Client)?;

        Ok(Self {
            http,
            endpoint: format!("{}/detect", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send the raster and `[lon, lat]` points in one multipart request and
    /// store the response body verbatim. No retries.
    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint, points = points.len()))]
    pub async fn detect(
        &self,
        store: &ArtifactStore,
        raster: &RasterArtifact,
        points: &[LonLat],
    ) -> Result<RawDetection> {
        let image = store.read(&raster.path)?;
        tracing::info!(size_bytes = image.len(), image_id = %raster.token, "Sending image to detector");

        let image_part = raster_part(image, raster.file_name(), paths::RASTER_MIME)?;
        let form = Form::new()
            .part("image", image_part)
            .text("points", serde_json::to_string(points)?);

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(FootprintError::RemoteUnavailable)?;

        let status = response.status();
        tracing::info!(status = status.as_u16(), "Detector responded");

        if !status.is_success() {
            let body = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "Could not decode detector response text");
                    String::new()
                }
            };
            return Err(FootprintError::RemoteProcessingFailed {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(FootprintError::RemoteUnavailable)?;

        let path = store.path(paths::DETECTION_RESULT);
        store.write(&path, &body)?;
        store.set_detection(path.clone());
        tracing::info!(path = %path.display(), "Detection result saved");

        Ok(RawDetection {
            path,
            size: body.len() as u64,
        })
    }
}

/// Multipart file part for the raster upload.
pub fn raster_part(image: Vec<u8>, file_name: String, mime: &str) -> Result<Part> {
    Part::bytes(image)
        .file_name(file_name)
        .mime_str(mime)
        .map_err(FootprintError::Client)
}
