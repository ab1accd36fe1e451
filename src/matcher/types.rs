use crate::error::VerifyError;
use crate::storage::StoredIdentity;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use image::ImageFormat;

/// An encoded image that is known to decode
#[derive(Debug, Clone)]
pub struct FaceImage {
    pub bytes: Bytes,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl FaceImage {
    /// Validate encoded bytes by decoding them once
    pub fn decode(bytes: impl Into<Bytes>) -> Result<Self, image::ImageError> {
        let bytes = bytes.into();
        let format = image::guess_format(&bytes)?;
        let decoded = image::load_from_memory_with_format(&bytes, format)?;

        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            format,
            bytes,
        })
    }

    pub fn mime_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::WebP => "image/webp",
            _ => "image/jpeg",
        }
    }

    /// `data:` URI form accepted by the verification service
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), STANDARD.encode(&self.bytes))
    }
}

/// A decoded camera frame and the batch slot it arrived in
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub slot: usize,
    pub image: FaceImage,
}

/// An enrolled reference face ready for comparison
#[derive(Debug, Clone)]
pub struct EnrolledIdentity {
    pub name: String,
    pub user_id: i64,
    pub reference: FaceImage,
}

impl EnrolledIdentity {
    pub fn decode(stored: StoredIdentity) -> Result<Self, VerifyError> {
        let reference =
            FaceImage::decode(stored.face_image).map_err(|source| VerifyError::Reference {
                name: stored.name.clone(),
                source,
            })?;

        Ok(Self {
            name: stored.name,
            user_id: stored.user_id,
            reference,
        })
    }
}

/// Outcome of matching one batch
#[derive(Debug, Clone)]
pub enum MatchResult {
    Matched {
        identity: EnrolledIdentity,
        frame: CapturedFrame,
    },
    /// `frame` is the last frame examined, if any
    Unmatched { frame: Option<CapturedFrame> },
}

impl MatchResult {
    pub fn matched_name(&self) -> Option<&str> {
        match self {
            MatchResult::Matched { identity, .. } => Some(&identity.name),
            MatchResult::Unmatched { .. } => None,
        }
    }
}
