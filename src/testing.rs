//! Shared fixtures for unit tests

use crate::error::VerifyError;
use crate::matcher::{CapturedFrame, EnrolledIdentity, FaceImage, FaceVerifier, Verification};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use parking_lot::Mutex;
use std::collections::HashSet;

/// A small solid-colour JPEG
pub(crate) fn jpeg_bytes(shade: u8) -> Vec<u8> {
    let (width, height) = (8u32, 8u32);
    let pixels = vec![shade; (width * height * 3) as usize];
    let mut encoded = Vec::new();
    JpegEncoder::new(&mut encoded)
        .encode(&pixels, width, height, ColorType::Rgb8)
        .unwrap();
    encoded
}

pub(crate) fn frame(slot: usize) -> CapturedFrame {
    CapturedFrame {
        slot,
        image: FaceImage::decode(jpeg_bytes(slot as u8 * 10)).unwrap(),
    }
}

pub(crate) fn identity(name: &str, user_id: i64) -> EnrolledIdentity {
    EnrolledIdentity {
        name: name.to_string(),
        user_id,
        reference: FaceImage::decode(jpeg_bytes(200)).unwrap(),
    }
}

/// Verifier whose verdicts are keyed by (frame slot, identity name)
#[derive(Default)]
pub(crate) struct ScriptedVerifier {
    accepted: HashSet<(usize, String)>,
    failing: HashSet<(usize, String)>,
    calls: Mutex<Vec<(usize, String)>>,
}

impl ScriptedVerifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn accept(mut self, slot: usize, name: &str) -> Self {
        self.accepted.insert((slot, name.to_string()));
        self
    }

    pub(crate) fn fail(mut self, slot: usize, name: &str) -> Self {
        self.failing.insert((slot, name.to_string()));
        self
    }

    pub(crate) fn calls(&self) -> Vec<(usize, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl FaceVerifier for ScriptedVerifier {
    async fn verify(
        &self,
        frame: &CapturedFrame,
        identity: &EnrolledIdentity,
    ) -> Result<Verification, VerifyError> {
        let key = (frame.slot, identity.name.clone());
        self.calls.lock().push(key.clone());

        if self.failing.contains(&key) {
            return Err(VerifyError::Failed {
                details: "Face could not be detected".to_string(),
            });
        }
        if self.accepted.contains(&key) {
            Ok(Verification::accepted())
        } else {
            Ok(Verification::rejected())
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
