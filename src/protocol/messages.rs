use serde::{Deserialize, Deserializer, Serialize};

/// Control message exchanged with the conductor over the room data channel.
///
/// The `type` field is the discriminator. Outbound intents carry the session id
/// at top level; inbound messages may omit it. Unknown types decode to
/// [`ControlMessage::Unknown`] so newer conductors never break older clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    // Facilitator -> Conductor
    FacStart {
        session_id: String,
    },
    FacEnd {
        session_id: String,
    },
    TimeStop {
        session_id: String,
    },
    RewindTo {
        session_id: String,
        payload: RewindToPayload,
    },
    RewindCancel {
        session_id: String,
    },
    Finish {
        session_id: String,
    },

    // Conductor -> Facilitator
    FacAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    MicSeen {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    SilenceStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    SpeakCmd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        /// Older conductors put the speaker at top level.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speaker_id: Option<String>,
        #[serde(default)]
        payload: SpeakerPayload,
    },
    PlaybackDone {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speaker_id: Option<String>,
        #[serde(default)]
        payload: SpeakerPayload,
    },
    TranscriptComplete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        payload: TranscriptPayload,
    },
    ClockSync {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        payload: ClockPoint,
    },
    ClockPause {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default)]
        payload: ClockMark,
    },
    ClockResume {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default)]
        payload: ClockMark,
    },
    ClockRewind {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        payload: ClockPoint,
    },
    BranchSwitched {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        payload: BranchPayload,
    },
    ReplayProgress {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default)]
        payload: ReplayProgressPayload,
    },

    /// Any type this client does not understand.
    #[serde(other)]
    Unknown,
}

impl ControlMessage {
    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FacStart { .. } => "fac_start",
            Self::FacEnd { .. } => "fac_end",
            Self::TimeStop { .. } => "time_stop",
            Self::RewindTo { .. } => "rewind_to",
            Self::RewindCancel { .. } => "rewind_cancel",
            Self::Finish { .. } => "finish",
            Self::FacAck { .. } => "fac_ack",
            Self::MicSeen { .. } => "mic_seen",
            Self::SilenceStart { .. } => "silence_start",
            Self::SpeakCmd { .. } => "speak_cmd",
            Self::PlaybackDone { .. } => "playback_done",
            Self::TranscriptComplete { .. } => "transcript_complete",
            Self::ClockSync { .. } => "clock_sync",
            Self::ClockPause { .. } => "clock_pause",
            Self::ClockResume { .. } => "clock_resume",
            Self::ClockRewind { .. } => "clock_rewind",
            Self::BranchSwitched { .. } => "branch_switched",
            Self::ReplayProgress { .. } => "replay_progress",
            Self::Unknown => "unknown",
        }
    }

    /// Session the message belongs to, when it says
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::FacStart { session_id }
            | Self::FacEnd { session_id }
            | Self::TimeStop { session_id }
            | Self::RewindTo { session_id, .. }
            | Self::RewindCancel { session_id }
            | Self::Finish { session_id } => Some(session_id.as_str()),
            Self::FacAck { session_id }
            | Self::MicSeen { session_id }
            | Self::SilenceStart { session_id }
            | Self::SpeakCmd { session_id, .. }
            | Self::PlaybackDone { session_id, .. }
            | Self::TranscriptComplete { session_id, .. }
            | Self::ClockSync { session_id, .. }
            | Self::ClockPause { session_id, .. }
            | Self::ClockResume { session_id, .. }
            | Self::ClockRewind { session_id, .. }
            | Self::BranchSwitched { session_id, .. }
            | Self::ReplayProgress { session_id, .. } => session_id.as_deref(),
            Self::Unknown => None,
        }
    }

    pub fn rewind_to(session_id: &str, target_utterance_id: &str, created_by: &str) -> Self {
        Self::RewindTo {
            session_id: session_id.to_string(),
            payload: RewindToPayload {
                target_utterance_id: target_utterance_id.to_string(),
                created_by: created_by.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewindToPayload {
    pub target_utterance_id: String,
    pub created_by: String,
}

/// Speaker reference carried by `speak_cmd` / `playback_done`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeakerPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
}

/// Resolve the speaker of a speak/stop command, preferring the payload field.
pub fn resolve_speaker<'a>(
    top_level: &'a Option<String>,
    payload: &'a SpeakerPayload,
) -> Option<&'a str> {
    payload
        .speaker_id
        .as_deref()
        .or(top_level.as_deref())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptPayload {
    pub text: String,
}

/// Authoritative clock position (`clock_sync`, `clock_rewind`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockPoint {
    #[serde(deserialize_with = "deserialize_millis")]
    pub session_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_paused: Option<bool>,
}

/// Clock edge (`clock_pause`, `clock_resume`); the position may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClockMark {
    #[serde(
        default,
        deserialize_with = "deserialize_opt_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_time_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchPayload {
    pub branch_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayProgressPayload {
    #[serde(default)]
    pub replayed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
}

impl ReplayProgressPayload {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }
}

// The conductor clock reports fractional milliseconds.
fn millis_from_f64(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.trunc() as u64
    } else {
        0
    }
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(millis_from_f64)
}

fn deserialize_opt_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(|v| v.map(millis_from_f64))
}
