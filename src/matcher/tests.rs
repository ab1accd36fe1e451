use super::*;
use crate::config::MatcherConfig;
use crate::error::VerifyError;
use crate::storage::StoredIdentity;
use crate::testing::{frame, identity, jpeg_bytes, ScriptedVerifier};
use std::sync::Arc;

fn five_frames() -> Vec<CapturedFrame> {
    (1..=5).map(frame).collect()
}

#[tokio::test]
async fn test_earliest_frame_wins_over_identity_order() {
    let verifier = Arc::new(
        ScriptedVerifier::new()
            .accept(2, "Alice")
            .accept(3, "Bob"),
    );
    let matcher = FaceMatcher::new(verifier.clone());
    let identities = vec![identity("Bob", 2), identity("Alice", 1)];

    let result = matcher.match_batch(&five_frames(), &identities).await;

    match &result {
        MatchResult::Matched { identity, frame } => {
            assert_eq!(identity.name, "Alice");
            assert_eq!(identity.user_id, 1);
            assert_eq!(frame.slot, 2);
        }
        other => panic!("Expected a match, got {:?}", other),
    }
    // Matching stops at the first verified pair
    assert_eq!(verifier.calls().last(), Some(&(2, "Alice".to_string())));
    assert_eq!(verifier.calls().len(), 4);
}

#[tokio::test]
async fn test_verification_error_counts_as_non_match() {
    let verifier = Arc::new(
        ScriptedVerifier::new()
            .fail(1, "Carol")
            .accept(1, "Dave"),
    );
    let matcher = FaceMatcher::new(verifier);
    let identities = vec![identity("Carol", 3), identity("Dave", 4)];

    let result = matcher.match_batch(&five_frames(), &identities).await;
    assert_eq!(result.matched_name(), Some("Dave"));
}

#[tokio::test]
async fn test_no_identities_reports_last_frame() {
    let matcher = FaceMatcher::new(Arc::new(ScriptedVerifier::new()));

    let result = matcher.match_batch(&five_frames(), &[]).await;

    match result {
        MatchResult::Unmatched { frame: Some(frame) } => assert_eq!(frame.slot, 5),
        other => panic!("Expected unmatched with a frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_frames_is_unmatched_without_frame() {
    let verifier = Arc::new(ScriptedVerifier::new().accept(1, "Alice"));
    let matcher = FaceMatcher::new(verifier.clone());

    let result = matcher.match_batch(&[], &[identity("Alice", 1)]).await;

    assert!(matches!(result, MatchResult::Unmatched { frame: None }));
    assert!(verifier.calls().is_empty());
}

#[tokio::test]
async fn test_frames_examined_in_slot_order() {
    let verifier = Arc::new(ScriptedVerifier::new());
    let matcher = FaceMatcher::new(verifier.clone());
    let frames = vec![frame(4), frame(2), frame(5)];

    let result = matcher.match_batch(&frames, &[identity("Alice", 1)]).await;

    let slots: Vec<usize> = verifier.calls().into_iter().map(|(slot, _)| slot).collect();
    assert_eq!(slots, vec![2, 4, 5]);
    match result {
        MatchResult::Unmatched { frame: Some(frame) } => assert_eq!(frame.slot, 5),
        other => panic!("Unexpected result: {:?}", other),
    }
}

#[test]
fn test_face_image_decode() {
    let image = FaceImage::decode(jpeg_bytes(128)).unwrap();

    assert_eq!(image.format, image::ImageFormat::Jpeg);
    assert_eq!((image.width, image.height), (8, 8));
    assert!(image.data_uri().starts_with("data:image/jpeg;base64,"));
    assert!(FaceImage::decode(b"not an image".to_vec()).is_err());
}

#[test]
fn test_enrolled_identity_rejects_bad_reference() {
    let stored = StoredIdentity {
        name: "Eve".to_string(),
        face_image: b"garbage".to_vec(),
        user_id: 9,
    };

    let result = EnrolledIdentity::decode(stored);
    assert!(matches!(result, Err(VerifyError::Reference { name, .. }) if name == "Eve"));
}

#[test]
fn test_deepface_request_body() {
    let config = MatcherConfig {
        endpoint: "http://faces.local:5005/".to_string(),
        ..crate::config::SmartDoorConfig::default().matcher
    };
    let verifier = DeepFaceVerifier::new(&config).unwrap();
    assert_eq!(verifier.verify_url(), "http://faces.local:5005/verify");

    let request = verifier.build_request(&frame(1), &identity("Alice", 1));
    let body = serde_json::to_value(&request).unwrap();

    assert_eq!(body["model_name"], "Facenet512");
    assert_eq!(body["enforce_detection"], true);
    assert!(body["img1"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));
}

#[cfg(feature = "http")]
mod service {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", address)
    }

    fn config_for(endpoint: String) -> MatcherConfig {
        MatcherConfig {
            endpoint,
            request_timeout_seconds: 5,
            ..crate::config::SmartDoorConfig::default().matcher
        }
    }

    #[tokio::test]
    async fn test_deepface_verified_response() {
        let router = Router::new().route(
            "/verify",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model_name"], "Facenet512");
                Json(json!({"verified": true, "distance": 0.21, "threshold": 0.3}))
            }),
        );
        let verifier = DeepFaceVerifier::new(&config_for(serve(router).await)).unwrap();

        let verification = verifier
            .verify(&frame(1), &identity("Alice", 1))
            .await
            .unwrap();

        assert!(verification.verified);
        assert_eq!(verification.distance, Some(0.21));
    }

    #[tokio::test]
    async fn test_deepface_error_status() {
        let router = Router::new().route(
            "/verify",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "Face could not be detected"})),
                )
            }),
        );
        let verifier = DeepFaceVerifier::new(&config_for(serve(router).await)).unwrap();

        let result = verifier.verify(&frame(1), &identity("Alice", 1)).await;
        assert!(matches!(result, Err(VerifyError::Rejected { status: 400, .. })));
    }
}
