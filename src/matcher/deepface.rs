use super::types::{CapturedFrame, EnrolledIdentity};
use super::verifier::{FaceVerifier, Verification};
use crate::config::MatcherConfig;
use crate::error::VerifyError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Client for a DeepFace REST service (`POST /verify`)
pub struct DeepFaceVerifier {
    client: reqwest::Client,
    verify_url: String,
    config: MatcherConfig,
}

#[derive(Debug, Serialize)]
pub(super) struct VerifyRequest<'a> {
    pub img1: String,
    pub img2: String,
    pub model_name: &'a str,
    pub detector_backend: &'a str,
    pub distance_metric: &'a str,
    pub enforce_detection: bool,
}

impl DeepFaceVerifier {
    pub fn new(config: &MatcherConfig) -> Result<Self, VerifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            verify_url: format!("{}/verify", config.endpoint.trim_end_matches('/')),
            config: config.clone(),
        })
    }

    pub fn verify_url(&self) -> &str {
        &self.verify_url
    }

    pub(super) fn build_request(
        &self,
        frame: &CapturedFrame,
        identity: &EnrolledIdentity,
    ) -> VerifyRequest<'_> {
        VerifyRequest {
            img1: frame.image.data_uri(),
            img2: identity.reference.data_uri(),
            model_name: &self.config.model_name,
            detector_backend: &self.config.detector_backend,
            distance_metric: &self.config.distance_metric,
            enforce_detection: self.config.enforce_detection,
        }
    }
}

#[async_trait]
impl FaceVerifier for DeepFaceVerifier {
    async fn verify(
        &self,
        frame: &CapturedFrame,
        identity: &EnrolledIdentity,
    ) -> Result<Verification, VerifyError> {
        let request = self.build_request(frame, identity);
        let response = self
            .client
            .post(&self.verify_url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VerifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let verification: Verification = response.json().await?;
        debug!(
            "Frame {} vs {}: verified={} distance={:?}",
            frame.slot, identity.name, verification.verified, verification.distance
        );
        Ok(verification)
    }

    fn name(&self) -> &str {
        "deepface"
    }
}
