use super::types::{CapturedFrame, EnrolledIdentity};
use crate::error::VerifyError;
use async_trait::async_trait;
use serde::Deserialize;

/// Verdict returned by a verification backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Verification {
    pub verified: bool,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl Verification {
    pub fn accepted() -> Self {
        Self {
            verified: true,
            distance: None,
            threshold: None,
        }
    }

    pub fn rejected() -> Self {
        Self {
            verified: false,
            distance: None,
            threshold: None,
        }
    }
}

/// Compares a captured frame against an enrolled reference face
#[async_trait]
pub trait FaceVerifier: Send + Sync {
    async fn verify(
        &self,
        frame: &CapturedFrame,
        identity: &EnrolledIdentity,
    ) -> Result<Verification, VerifyError>;

    fn name(&self) -> &str;
}
