mod deepface;
mod engine;
mod types;
mod verifier;
#[cfg(test)]
mod tests;

pub use deepface::DeepFaceVerifier;
pub use engine::FaceMatcher;
pub use types::{CapturedFrame, EnrolledIdentity, FaceImage, MatchResult};
pub use verifier::{FaceVerifier, Verification};
