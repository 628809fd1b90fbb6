use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartSessionRequest {
    pub case_study_id: String,
    pub created_by: String,
    /// Session tuning; the server fills defaults for anything omitted
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub root_branch_id: String,
    pub active_branch_id: String,
    pub room_name: String,
    #[serde(default)]
    pub last_seed_utterance_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenRequest {
    pub identity: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub room_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StopSessionResponse {
    pub status: String,
}

/// A scenario the facilitator can practise on
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CaseStudy {
    pub case_study_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
}

/// Transcript entry kind. Kinds this client does not know are carried
/// through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum UtteranceKind {
    Seed,
    Ai,
    /// A facilitator turn
    UserIntervention,
    SystemSilence,
    Other(String),
}

impl UtteranceKind {
    pub fn as_str(&self) -> &str {
        match self {
            UtteranceKind::Seed => "seed",
            UtteranceKind::Ai => "ai",
            UtteranceKind::UserIntervention => "user_intervention",
            UtteranceKind::SystemSilence => "system_silence",
            UtteranceKind::Other(kind) => kind,
        }
    }
}

impl From<String> for UtteranceKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "seed" => UtteranceKind::Seed,
            "ai" => UtteranceKind::Ai,
            "user_intervention" => UtteranceKind::UserIntervention,
            "system_silence" => UtteranceKind::SystemSilence,
            _ => UtteranceKind::Other(kind),
        }
    }
}

impl From<UtteranceKind> for String {
    fn from(kind: UtteranceKind) -> Self {
        match kind {
            UtteranceKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Utterance {
    pub utterance_id: String,
    #[serde(default)]
    pub speaker_id: Option<String>,
    pub kind: UtteranceKind,
    pub text: String,
    /// Human-readable ordinal within the branch (e.g. "3" or "3.1")
    pub display_id: String,
}

/// Linear utterance sequence of one branch
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Transcript {
    pub session_id: String,
    pub branch_id: String,
    pub utterances: Vec<Utterance>,
}
