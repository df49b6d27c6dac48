use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use saconfig::WebhookConfig;
use sacontrol::{
    AlertController, AlertTimings, ControlError, MediaInfo, MediaSource, PlaybackPosition,
    PlaybackState, PlaybackStatus, PositionInfo, QueueControl, TransportControl,
};
use saserver::signature::{FormParams, compute_signature};
use saserver::{SIGNATURE_HEADER, doorbell_router, incident_router};
use tower::ServiceExt;

const ALERT_URL: &str = "http://nas.local/sounds/klaxon.mp3";
const URL_ROOT: &str = "https://hooks.example.org/sonos";
const SECRET: &str = "vo-key";

/// Speaker that records the operations it is asked for.
///
/// When `playing`, it sits on the third item of a twelve-track queue.
#[derive(Default)]
struct FakeSpeaker {
    calls: Mutex<Vec<String>>,
    broken: bool,
    playing: bool,
}

impl FakeSpeaker {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) -> Result<(), ControlError> {
        self.calls.lock().unwrap().push(call.to_string());
        if self.broken {
            return Err(ControlError::Http(call.to_string(), "unreachable".to_string()));
        }
        Ok(())
    }
}

impl PlaybackStatus for FakeSpeaker {
    fn playback_state(&self) -> Result<PlaybackState, ControlError> {
        self.record("state")?;
        if self.playing {
            Ok(PlaybackState::Playing)
        } else {
            Ok(PlaybackState::Stopped)
        }
    }
}

impl PlaybackPosition for FakeSpeaker {
    fn playback_position(&self) -> Result<PositionInfo, ControlError> {
        let interrupted = self.calls().last().map(String::as_str) == Some("state");
        self.record("position")?;
        if self.playing && interrupted {
            return Ok(PositionInfo {
                track: 3,
                track_duration: Some("0:04:12".to_string()),
                rel_time: Some("0:01:30".to_string()),
                ..PositionInfo::default()
            });
        }
        Ok(PositionInfo {
            track: 1,
            track_duration: Some("0:00:00".to_string()),
            ..PositionInfo::default()
        })
    }
}

impl MediaSource for FakeSpeaker {
    fn media_info(&self) -> Result<MediaInfo, ControlError> {
        self.record("media")?;
        Ok(MediaInfo {
            current_uri: "x-rincon-queue:RINCON_000E58A0B1C201400#0".to_string(),
            current_uri_metadata: String::new(),
        })
    }
}

impl TransportControl for FakeSpeaker {
    fn play_uri(&self, uri: &str, _meta: &str) -> Result<(), ControlError> {
        self.record(&format!("play {}", uri))
    }

    fn seek_rel_time(&self, hhmmss: &str) -> Result<(), ControlError> {
        self.record(&format!("seek {}", hhmmss))
    }
}

impl QueueControl for FakeSpeaker {
    fn queue_len(&self) -> Result<usize, ControlError> {
        self.record("queue_len")?;
        Ok(if self.playing { 12 } else { 0 })
    }

    fn play_from_queue(&self, index: usize) -> Result<(), ControlError> {
        self.record(&format!("queue {}", index))
    }
}

fn controller(speaker: &Arc<FakeSpeaker>) -> Arc<AlertController> {
    let timings = AlertTimings {
        fallback_wait: Duration::from_millis(50),
        ..AlertTimings::default()
    };
    Arc::new(AlertController::new(speaker.clone(), ALERT_URL, timings))
}

fn incident_app(speaker: &Arc<FakeSpeaker>) -> Router {
    incident_router(
        controller(speaker),
        WebhookConfig {
            url_root: URL_ROOT.to_string(),
            auth_key: SECRET.to_string(),
        },
    )
}

const INCIDENT_BODY: &str =
    "state_message=Database+down&message_type=CRITICAL&alert_id=INC-42";

fn signed_body_signature() -> String {
    let params: FormParams = [
        ("state_message", "Database down"),
        ("message_type", "CRITICAL"),
        ("alert_id", "INC-42"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    compute_signature(SECRET, URL_ROOT, &params).unwrap()
}

fn incident_request(signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(INCIDENT_BODY)).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[test]
fn reference_signature_is_reproduced() {
    assert_eq!(signed_body_signature(), "iZu3qwueApfAHlElKYHdd48CWVw=");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn signed_incident_plays_alert() {
    let speaker = Arc::new(FakeSpeaker::default());
    let signature = signed_body_signature();

    let response = incident_app(&speaker)
        .oneshot(incident_request(Some(&signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
    assert_eq!(
        speaker.calls(),
        vec![
            "state".to_string(),
            format!("play {}", ALERT_URL),
            "position".to_string()
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn signed_incident_interrupts_and_resumes_queue() {
    let speaker = Arc::new(FakeSpeaker {
        playing: true,
        ..FakeSpeaker::default()
    });
    let signature = signed_body_signature();

    let response = incident_app(&speaker)
        .oneshot(incident_request(Some(&signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
    assert_eq!(
        speaker.calls(),
        vec![
            "state".to_string(),
            "position".to_string(),
            "media".to_string(),
            format!("play {}", ALERT_URL),
            "position".to_string(),
            "queue_len".to_string(),
            "queue 2".to_string(),
            "seek 0:01:30".to_string(),
        ]
    );
}

#[tokio::test]
async fn bad_signature_never_reaches_speaker() {
    let speaker = Arc::new(FakeSpeaker::default());

    let response = incident_app(&speaker)
        .oneshot(incident_request(Some("u7rtn56FpxUrXZ4I+S0zf+Enrxk=")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, "Nope");
    assert!(speaker.calls().is_empty());
}

#[tokio::test]
async fn missing_signature_never_reaches_speaker() {
    let speaker = Arc::new(FakeSpeaker::default());

    let response = incident_app(&speaker)
        .oneshot(incident_request(None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, "Nope");
    assert!(speaker.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn doorbell_press_needs_no_signature() {
    let speaker = Arc::new(FakeSpeaker::default());
    let request = Request::builder()
        .method("POST")
        .uri("/doorbellpress?button=front")
        .body(Body::empty())
        .unwrap();

    let response = doorbell_router(controller(&speaker))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
    assert_eq!(speaker.calls()[1], format!("play {}", ALERT_URL));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_speaker_answers_error() {
    let speaker = Arc::new(FakeSpeaker {
        broken: true,
        ..FakeSpeaker::default()
    });
    let request = Request::builder()
        .method("POST")
        .uri("/doorbellpress")
        .body(Body::empty())
        .unwrap();

    let response = doorbell_router(controller(&speaker))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Error");
}

#[tokio::test]
async fn doorbell_route_only_accepts_post() {
    let speaker = Arc::new(FakeSpeaker::default());
    let request = Request::builder()
        .method("GET")
        .uri("/doorbellpress")
        .body(Body::empty())
        .unwrap();

    let response = doorbell_router(controller(&speaker))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(speaker.calls().is_empty());
}
