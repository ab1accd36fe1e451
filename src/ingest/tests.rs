use super::*;
use crate::actuation::{ActuationReport, Actuator};
use crate::broker::{Feed, RecordingPublisher};
use crate::config::{IngestConfig, SmartDoorConfig};
use crate::events::EventBus;
use crate::matcher::FaceMatcher;
use crate::storage::{AccessStore, AuditKind, NewUser, UNKNOWN_PERSON};
use crate::testing::{jpeg_bytes, ScriptedVerifier};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;

struct Fixture {
    dir: TempDir,
    store: AccessStore,
    publisher: Arc<RecordingPublisher>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = AccessStore::open(dir.path().join("data.db"), chrono_tz::Asia::Ho_Chi_Minh)
            .unwrap();
        Self {
            dir,
            store,
            publisher: Arc::new(RecordingPublisher::new()),
        }
    }

    fn ingest(&self, verifier: ScriptedVerifier) -> FrameIngest {
        let event_bus = Arc::new(EventBus::new(64));
        let actuator = Actuator::new(
            self.publisher.clone(),
            self.store.clone(),
            SmartDoorConfig::default().actuation,
            Arc::clone(&event_bus),
        );
        let pass = BatchPass::new(
            self.store.clone(),
            FaceMatcher::new(Arc::new(verifier)),
            actuator,
            Arc::clone(&event_bus),
        );
        let config = IngestConfig {
            frame_dir: self.frame_dir().to_string_lossy().into_owned(),
            ..SmartDoorConfig::default().ingest
        };
        FrameIngest::new(&config, pass, event_bus)
    }

    fn frame_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("frames")
    }

    fn enroll(&self, username: &str, name: &str) -> i64 {
        let user_id = self
            .store
            .create_user(&NewUser {
                username: username.to_string(),
                name: Some(name.to_string()),
                ..NewUser::default()
            })
            .unwrap();
        self.store
            .enroll_identity(user_id, "face-1", None, &jpeg_bytes(200))
            .unwrap();
        user_id
    }
}

fn encoded(shade: u8) -> Vec<u8> {
    STANDARD.encode(jpeg_bytes(shade)).into_bytes()
}

#[tokio::test]
async fn test_counter_resets_after_batch_with_decode_failures() {
    let fixture = Fixture::new();
    let mut ingest = fixture.ingest(ScriptedVerifier::new());

    let payloads = vec![
        encoded(10),
        b"%%% not base64 %%%".to_vec(),
        STANDARD.encode(b"valid base64, not an image").into_bytes(),
        encoded(40),
    ];
    for (index, payload) in payloads.iter().enumerate() {
        assert!(ingest.accept(payload).await.unwrap().is_none());
        assert_eq!(ingest.pending_frames(), index + 1);
    }

    let last = jpeg_bytes(50);
    let report = ingest
        .accept(STANDARD.encode(&last).as_bytes())
        .await
        .unwrap()
        .expect("fifth frame completes the batch");

    assert_eq!(ingest.pending_frames(), 0);
    assert_eq!(report.frames, 3);
    assert_eq!(report.identities, 0);
    assert!(report.matched.is_none());

    // Zero identities: the batch is unmatched and keeps the last frame
    assert_eq!(fixture.publisher.payloads_for(Feed::Status), vec![UNKNOWN_PERSON]);
    let audit = fixture.store.latest_audit(5).unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].kind, AuditKind::Unknown);
    assert_eq!(audit[0].image.as_deref(), Some(last.as_slice()));
}

#[tokio::test]
async fn test_exactly_one_pass_per_batch() {
    let fixture = Fixture::new();
    let mut ingest = fixture.ingest(ScriptedVerifier::new());

    let mut reports = 0;
    for shade in 0..12u8 {
        if ingest.accept(&encoded(shade)).await.unwrap().is_some() {
            reports += 1;
        }
    }

    assert_eq!(reports, 2);
    assert_eq!(ingest.pending_frames(), 2);
    assert_eq!(fixture.store.latest_audit(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_matching_batch_opens_door() {
    let fixture = Fixture::new();
    fixture.enroll("bob", "Bob");
    let alice = fixture.enroll("alice", "Alice");
    let mut ingest = fixture.ingest(
        ScriptedVerifier::new()
            .accept(2, "Alice")
            .accept(3, "Bob"),
    );

    let mut last = None;
    for shade in 1..=5u8 {
        last = ingest.accept(&encoded(shade * 20)).await.unwrap();
    }
    let report = last.expect("batch report");

    assert_eq!(report.matched.as_deref(), Some("Alice"));
    assert_eq!(fixture.publisher.payloads_for(Feed::Door), vec!["ON"]);
    assert_eq!(fixture.publisher.payloads_for(Feed::Status), vec!["Alice"]);
    match report.actuation {
        ActuationReport::DoorOpened { control, .. } => assert_eq!(control.user_id, alice),
        other => panic!("Unexpected actuation: {:?}", other),
    }

    let audit = fixture.store.latest_audit(5).unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].kind, AuditKind::DoorOpen);
    assert_eq!(audit[0].name.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn test_frames_written_to_slot_files() {
    let fixture = Fixture::new();
    let mut ingest = fixture.ingest(ScriptedVerifier::new());

    ingest.accept(&encoded(10)).await.unwrap();
    let data_uri = format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg_bytes(20)));
    ingest.accept(data_uri.as_bytes()).await.unwrap();

    let first = std::fs::read(fixture.frame_dir().join("1.jpg")).unwrap();
    let second = std::fs::read(fixture.frame_dir().join("2.jpg")).unwrap();
    assert_eq!(first, jpeg_bytes(10));
    assert_eq!(second, jpeg_bytes(20));
}

#[tokio::test]
async fn test_bad_payload_removes_stale_slot_file() {
    let fixture = Fixture::new();
    let mut ingest = fixture.ingest(ScriptedVerifier::new());

    for shade in 0..5u8 {
        ingest.accept(&encoded(shade)).await.unwrap();
    }
    assert!(fixture.frame_dir().join("1.jpg").exists());

    ingest.accept(b"***").await.unwrap();
    assert!(!fixture.frame_dir().join("1.jpg").exists());
    assert_eq!(ingest.pending_frames(), 1);
}

#[tokio::test]
async fn test_persistence_failure_still_resets_counter() {
    let fixture = Fixture::new();
    let mut ingest = fixture.ingest(ScriptedVerifier::new());

    for shade in 0..4u8 {
        ingest.accept(&encoded(shade)).await.unwrap();
    }

    // Replace the database with an empty file so identity loading fails
    let db = fixture.dir.path().join("data.db");
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", db.display(), suffix));
    }

    let result = ingest.accept(&encoded(4)).await;
    assert!(result.is_err());
    assert_eq!(ingest.pending_frames(), 0);
}

#[tokio::test]
async fn test_run_consumes_queue_until_cancelled() {
    let fixture = Fixture::new();
    let ingest = fixture.ingest(ScriptedVerifier::new());
    let (handle, receiver) = IngestHandle::channel(8);
    let token = CancellationToken::new();
    let task = tokio::spawn(ingest.run(receiver, token.clone()));

    for shade in 0..5u8 {
        handle.submit(Bytes::from(encoded(shade))).await.unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while fixture.store.latest_audit(1).unwrap().is_empty() {
        assert!(Instant::now() < deadline, "batch pass did not run");
        sleep(Duration::from_millis(20)).await;
    }

    token.cancel();
    task.await.unwrap();
    assert!(handle.submit(Bytes::from_static(b"late")).await.is_err());
}
