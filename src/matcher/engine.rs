use super::types::{CapturedFrame, EnrolledIdentity, MatchResult};
use super::verifier::FaceVerifier;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs a batch of frames against the enrolled identities
///
/// Frames are examined in slot order and identities in enrollment order. The
/// first verified pair wins and ends the pass; a comparison error counts as a
/// non-match.
#[derive(Clone)]
pub struct FaceMatcher {
    verifier: Arc<dyn FaceVerifier>,
}

impl FaceMatcher {
    pub fn new(verifier: Arc<dyn FaceVerifier>) -> Self {
        Self { verifier }
    }

    pub async fn match_batch(
        &self,
        frames: &[CapturedFrame],
        identities: &[EnrolledIdentity],
    ) -> MatchResult {
        let mut ordered: Vec<&CapturedFrame> = frames.iter().collect();
        ordered.sort_by_key(|frame| frame.slot);

        for frame in &ordered {
            for identity in identities {
                match self.verifier.verify(frame, identity).await {
                    Ok(verification) if verification.verified => {
                        info!(
                            "Frame {} verified as {} by {}",
                            frame.slot,
                            identity.name,
                            self.verifier.name()
                        );
                        return MatchResult::Matched {
                            identity: identity.clone(),
                            frame: (*frame).clone(),
                        };
                    }
                    Ok(_) => debug!("Frame {} does not match {}", frame.slot, identity.name),
                    Err(e) => warn!("Error in verification of frame {}: {}", frame.slot, e),
                }
            }
        }

        MatchResult::Unmatched {
            frame: ordered.last().map(|frame| (*frame).clone()),
        }
    }
}
