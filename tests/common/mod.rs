#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fac_gym::api::{
    ApiError, CaseStudy, SessionApi, StartSessionResponse, StopSessionResponse, TokenResponse,
    Transcript, Utterance, UtteranceKind,
};
use fac_gym::config::ParticipantsConfig;
use fac_gym::protocol::{self, ControlMessage};
use fac_gym::room::{RemoteParticipant, RoomEvent, RoomTransport};
use fac_gym::session::{ControllerSettings, SessionController, SessionHandle, SessionRuntime};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const SESSION: &str = "sess-1";
pub const ROOT_BRANCH: &str = "branch-root";

// ============================================================================
// Room
// ============================================================================

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TrackState {
    pub published: bool,
    pub muted: bool,
}

/// In-memory room recording everything the session does to it
pub struct FakeRoom {
    pub sent: Mutex<Vec<ControlMessage>>,
    pub track: Mutex<TrackState>,
    pub volume: Mutex<f32>,
    pub participants: Vec<RemoteParticipant>,
    pub fail_publish_audio: AtomicBool,
    pub left: AtomicBool,
}

impl FakeRoom {
    pub fn new() -> Arc<Self> {
        Self::with_participants(Vec::new())
    }

    pub fn with_participants(participants: Vec<RemoteParticipant>) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            track: Mutex::new(TrackState::default()),
            volume: Mutex::new(1.0),
            participants,
            fail_publish_audio: AtomicBool::new(false),
            left: AtomicBool::new(false),
        })
    }

    pub fn sent(&self) -> Vec<ControlMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_kinds(&self) -> Vec<&'static str> {
        self.sent().iter().map(|m| m.kind()).collect()
    }

    pub fn track(&self) -> TrackState {
        *self.track.lock().unwrap()
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock().unwrap()
    }
}

#[async_trait]
impl RoomTransport for FakeRoom {
    async fn publish_reliable(&self, payload: Vec<u8>) -> Result<()> {
        let message = protocol::decode(&payload)?;
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn has_local_audio_track(&self) -> bool {
        self.track.lock().unwrap().published
    }

    async fn publish_local_audio(&self) -> Result<()> {
        if self.fail_publish_audio.load(Ordering::SeqCst) {
            return Err(anyhow!("microphone permission denied"));
        }
        *self.track.lock().unwrap() = TrackState {
            published: true,
            muted: false,
        };
        Ok(())
    }

    async fn unmute_local_audio(&self) -> Result<()> {
        self.track.lock().unwrap().muted = false;
        Ok(())
    }

    async fn mute_local_audio(&self) -> Result<()> {
        self.track.lock().unwrap().muted = true;
        Ok(())
    }

    async fn set_remote_volume(&self, volume: f32) -> Result<()> {
        *self.volume.lock().unwrap() = volume;
        Ok(())
    }

    async fn remote_participants(&self) -> Vec<RemoteParticipant> {
        self.participants.clone()
    }

    async fn leave(&self) -> Result<()> {
        self.left.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub fn settings() -> ControllerSettings {
    ControllerSettings {
        ptt_watchdog: Duration::from_millis(1500),
        floor_open: Duration::from_millis(3000),
        participants: ParticipantsConfig::default(),
    }
}

pub struct Running {
    pub handle: SessionHandle,
    pub task: JoinHandle<()>,
    pub events: mpsc::Sender<RoomEvent>,
}

impl Running {
    pub async fn event(&self, event: RoomEvent) {
        self.events.send(event).await.unwrap();
        settle().await;
    }

    /// Deliver a JSON control message on the data channel
    pub async fn data(&self, json: &str) {
        self.event(RoomEvent::Data {
            sender: Some("conductor-bot".to_string()),
            payload: json.as_bytes().to_vec(),
        })
        .await;
    }
}

/// Spawn a runtime over `room` and mark the room connected.
pub async fn spawn_session(room: Arc<FakeRoom>) -> Running {
    let controller = SessionController::new(SESSION, ROOT_BRANCH, &settings());
    let (events, rx) = mpsc::channel(16);
    let (handle, task) =
        SessionRuntime::new(controller, room, rx, Duration::from_millis(100)).spawn();
    let running = Running {
        handle,
        task,
        events,
    };
    running.event(RoomEvent::Connected).await;
    running
}

/// Let the runtime drain everything queued so far.
///
/// Under a paused clock the sleep only completes once every other task is idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// ============================================================================
// Session API
// ============================================================================

pub fn utterance(id: &str, speaker: &str, kind: UtteranceKind) -> Utterance {
    Utterance {
        utterance_id: id.to_string(),
        speaker_id: Some(speaker.to_string()),
        kind,
        text: format!("text of {}", id),
        display_id: id.to_uppercase(),
    }
}

pub fn transcript_utterances() -> Vec<Utterance> {
    vec![
        utterance("u1", "alice", UtteranceKind::Seed),
        utterance("u2", "bob", UtteranceKind::Ai),
        utterance("u3", "user", UtteranceKind::UserIntervention),
        utterance("u4", "charlie", UtteranceKind::Ai),
    ]
}

/// Scripted session service
pub struct FakeApi {
    pub fail_start: AtomicBool,
    pub fail_mint: AtomicBool,
    pub fail_stop: AtomicBool,
    /// `stop_session` never resolves
    pub hang_stop: AtomicBool,
    /// Virtual latency of `fetch_transcript`
    pub transcript_delay: Mutex<Duration>,
    pub starts: AtomicUsize,
    pub stops: Mutex<Vec<String>>,
    pub transcript_requests: Mutex<Vec<(String, String)>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_start: AtomicBool::new(false),
            fail_mint: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            hang_stop: AtomicBool::new(false),
            transcript_delay: Mutex::new(Duration::ZERO),
            starts: AtomicUsize::new(0),
            stops: Mutex::new(Vec::new()),
            transcript_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn stops(&self) -> Vec<String> {
        self.stops.lock().unwrap().clone()
    }
}

fn unavailable(operation: &'static str) -> ApiError {
    ApiError::Other {
        operation,
        message: "service unavailable".to_string(),
    }
}

#[async_trait]
impl SessionApi for FakeApi {
    async fn start_session(
        &self,
        case_study_id: &str,
        _created_by: &str,
    ) -> Result<StartSessionResponse, ApiError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(unavailable("start session"));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(StartSessionResponse {
            session_id: SESSION.to_string(),
            root_branch_id: ROOT_BRANCH.to_string(),
            active_branch_id: ROOT_BRANCH.to_string(),
            room_name: format!("room-{}", case_study_id),
            last_seed_utterance_id: Some("u1".to_string()),
        })
    }

    async fn stop_session(&self, session_id: &str) -> Result<StopSessionResponse, ApiError> {
        self.stops.lock().unwrap().push(session_id.to_string());
        if self.hang_stop.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(unavailable("stop session"));
        }
        Ok(StopSessionResponse {
            status: "stopped".to_string(),
        })
    }

    async fn mint_token(&self, session_id: &str, identity: &str) -> Result<TokenResponse, ApiError> {
        if self.fail_mint.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                operation: "mint token",
                status: 500,
            });
        }
        Ok(TokenResponse {
            token: format!("token-{}-{}", session_id, identity),
            room_name: format!("room-{}", session_id),
        })
    }

    async fn list_case_studies(&self) -> Result<Vec<CaseStudy>, ApiError> {
        Ok(vec![CaseStudy {
            case_study_id: "cs-1".to_string(),
            title: Some("Budget review".to_string()),
            description: None,
            participants: vec!["alice".into(), "bob".into(), "charlie".into()],
        }])
    }

    async fn fetch_transcript(
        &self,
        session_id: &str,
        branch_id: &str,
    ) -> Result<Transcript, ApiError> {
        self.transcript_requests
            .lock()
            .unwrap()
            .push((session_id.to_string(), branch_id.to_string()));
        let delay = *self.transcript_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(Transcript {
            session_id: session_id.to_string(),
            branch_id: branch_id.to_string(),
            utterances: transcript_utterances(),
        })
    }
}
