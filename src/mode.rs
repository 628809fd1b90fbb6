//! Session mode state machine (LIVE / PAUSED / REPLAYING)
//!
//! Owns the active branch id and decides which affordances are available:
//! PTT only while LIVE, the rewind panel only while PAUSED.

use crate::api::{Utterance, UtteranceKind};
use crate::effect::Effect;
use crate::protocol::{ControlMessage, ReplayProgressPayload};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Value of `created_by` on rewinds issued from this client
pub const REWIND_CREATED_BY: &str = "facilitator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionMode {
    Live,
    Paused,
    Replaying,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Live => "LIVE",
            Self::Paused => "PAUSED",
            Self::Replaying => "REPLAYING",
        };
        f.write_str(s)
    }
}

/// A user intent that is not valid right now
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntentError {
    #[error("no active session")]
    NoSession,

    #[error("{intent} is not available while {mode}")]
    InvalidMode {
        intent: &'static str,
        mode: SessionMode,
    },

    #[error("utterance {0} is not in the loaded transcript")]
    UnknownTarget(String),

    #[error("utterance {0} is a facilitator turn and cannot be rewound onto")]
    IneligibleTarget(String),
}

/// An utterance as listed in the rewind panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewindTarget {
    #[serde(flatten)]
    pub utterance: Utterance,
    pub eligible: bool,
}

/// Facilitator turns are immutable history.
pub fn is_rewind_eligible(utterance: &Utterance, facilitator_identity: &str) -> bool {
    utterance.kind != UtteranceKind::UserIntervention
        && utterance.speaker_id.as_deref() != Some(facilitator_identity)
}

/// Annotate a branch transcript with rewind eligibility, preserving order.
pub fn rewind_targets(utterances: Vec<Utterance>, facilitator_identity: &str) -> Vec<RewindTarget> {
    utterances
        .into_iter()
        .map(|utterance| {
            let eligible = is_rewind_eligible(&utterance, facilitator_identity);
            RewindTarget { utterance, eligible }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStatus {
    pub replayed: u32,
    pub total: Option<u32>,
}

pub struct ModeMachine {
    mode: SessionMode,
    branch_id: String,
    targets: Vec<RewindTarget>,
    /// Utterance a committed rewind is replaying towards
    pending_target: Option<String>,
    replay: Option<ReplayStatus>,
}

impl ModeMachine {
    pub fn new(branch_id: impl Into<String>) -> Self {
        Self {
            mode: SessionMode::Live,
            branch_id: branch_id.into(),
            targets: Vec::new(),
            pending_target: None,
            replay: None,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn branch_id(&self) -> &str {
        &self.branch_id
    }

    pub fn ptt_available(&self) -> bool {
        self.mode == SessionMode::Live
    }

    pub fn rewind_panel_open(&self) -> bool {
        self.mode == SessionMode::Paused
    }

    pub fn targets(&self) -> &[RewindTarget] {
        &self.targets
    }

    pub fn pending_target(&self) -> Option<&str> {
        self.pending_target.as_deref()
    }

    pub fn replay(&self) -> Option<&ReplayStatus> {
        self.replay.as_ref()
    }

    /// LIVE -> PAUSED. The clock itself pauses on the conductor's echo.
    pub fn time_stop(&mut self, session_id: &str) -> Result<Vec<Effect>, IntentError> {
        self.require(SessionMode::Live, "time_stop")?;
        self.mode = SessionMode::Paused;
        self.targets.clear();
        info!("Time stop requested");
        Ok(vec![Effect::Send(ControlMessage::TimeStop {
            session_id: session_id.to_string(),
        })])
    }

    /// Load the fetched transcript into the open rewind panel.
    pub fn load_targets(&mut self, targets: Vec<RewindTarget>) -> Result<(), IntentError> {
        self.require(SessionMode::Paused, "rewind selection")?;
        debug!("Loaded {} rewind candidates", targets.len());
        self.targets = targets;
        Ok(())
    }

    /// PAUSED -> REPLAYING. The branch id is not updated until the conductor confirms.
    pub fn rewind_to(
        &mut self,
        session_id: &str,
        target_utterance_id: &str,
    ) -> Result<Vec<Effect>, IntentError> {
        self.require(SessionMode::Paused, "rewind_to")?;

        let target = self
            .targets
            .iter()
            .find(|t| t.utterance.utterance_id == target_utterance_id)
            .ok_or_else(|| IntentError::UnknownTarget(target_utterance_id.to_string()))?;
        if !target.eligible {
            return Err(IntentError::IneligibleTarget(target_utterance_id.to_string()));
        }

        info!("Rewinding to utterance {}", target_utterance_id);
        self.mode = SessionMode::Replaying;
        self.targets.clear();
        self.pending_target = Some(target_utterance_id.to_string());
        self.replay = Some(ReplayStatus::default());

        Ok(vec![Effect::Send(ControlMessage::rewind_to(
            session_id,
            target_utterance_id,
            REWIND_CREATED_BY,
        ))])
    }

    /// PAUSED -> LIVE
    pub fn cancel(&mut self, session_id: &str) -> Result<Vec<Effect>, IntentError> {
        self.require(SessionMode::Paused, "rewind_cancel")?;
        self.mode = SessionMode::Live;
        self.targets.clear();
        info!("Rewind cancelled");
        Ok(vec![Effect::Send(ControlMessage::RewindCancel {
            session_id: session_id.to_string(),
        })])
    }

    /// `branch_switched`: the conductor made `branch_id` active.
    pub fn on_branch_switched(&mut self, branch_id: &str) {
        if self.branch_id != branch_id {
            info!("Active branch {} -> {}", self.branch_id, branch_id);
            self.branch_id = branch_id.to_string();
        }
        if self.mode == SessionMode::Replaying {
            info!("Replay complete, back to LIVE");
            self.mode = SessionMode::Live;
            self.pending_target = None;
            self.replay = None;
        }
    }

    pub fn on_replay_progress(&mut self, progress: &ReplayProgressPayload) {
        if self.mode != SessionMode::Replaying {
            debug!("replay_progress outside REPLAYING ignored");
            return;
        }

        if progress.is_completed() {
            match progress.branch_id.as_deref() {
                Some(branch_id) => {
                    let branch_id = branch_id.to_string();
                    self.on_branch_switched(&branch_id);
                }
                None => warn!("Replay completed without a branch id, waiting for branch_switched"),
            }
            return;
        }

        self.replay = Some(ReplayStatus {
            replayed: progress.replayed,
            total: progress.total,
        });
    }

    fn require(&self, mode: SessionMode, intent: &'static str) -> Result<(), IntentError> {
        if self.mode == mode {
            Ok(())
        } else {
            Err(IntentError::InvalidMode {
                intent,
                mode: self.mode,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utt(id: &str, speaker: &str, kind: UtteranceKind) -> Utterance {
        Utterance {
            utterance_id: id.to_string(),
            speaker_id: Some(speaker.to_string()),
            kind,
            text: format!("text of {id}"),
            display_id: id.to_uppercase(),
        }
    }

    fn transcript() -> Vec<RewindTarget> {
        rewind_targets(
            vec![
                utt("u1", "alice", UtteranceKind::Seed),
                utt("u2", "user", UtteranceKind::UserIntervention),
                utt("u3", "bob", UtteranceKind::Ai),
                utt("u4", "user", UtteranceKind::Ai),
            ],
            "user",
        )
    }

    #[test]
    fn facilitator_turns_are_never_eligible() {
        let eligible: Vec<_> = transcript()
            .into_iter()
            .filter(|t| t.eligible)
            .map(|t| t.utterance.utterance_id)
            .collect();
        assert_eq!(eligible, vec!["u1", "u3"]);
    }

    #[test]
    fn intervention_kind_is_ineligible_whoever_spoke_it() {
        let u = utt("u9", "alice", UtteranceKind::UserIntervention);
        assert!(!is_rewind_eligible(&u, "user"));
    }

    #[test]
    fn full_rewind_cycle() {
        let mut mode = ModeMachine::new("b-root");
        assert!(mode.ptt_available());

        let effects = mode.time_stop("s").unwrap();
        assert_eq!(mode.mode(), SessionMode::Paused);
        assert_eq!(
            effects,
            vec![Effect::Send(ControlMessage::TimeStop {
                session_id: "s".into()
            })]
        );
        assert!(!mode.ptt_available());

        mode.load_targets(transcript()).unwrap();
        let effects = mode.rewind_to("s", "u3").unwrap();
        assert_eq!(mode.mode(), SessionMode::Replaying);
        assert_eq!(
            effects,
            vec![Effect::Send(ControlMessage::rewind_to("s", "u3", "facilitator"))]
        );
        // No optimistic branch update
        assert_eq!(mode.branch_id(), "b-root");

        mode.on_branch_switched("b-2");
        assert_eq!(mode.mode(), SessionMode::Live);
        assert_eq!(mode.branch_id(), "b-2");
        assert!(mode.replay().is_none());
    }

    #[test]
    fn rejects_ineligible_and_unknown_targets() {
        let mut mode = ModeMachine::new("b");
        mode.time_stop("s").unwrap();
        mode.load_targets(transcript()).unwrap();

        assert_eq!(
            mode.rewind_to("s", "u2"),
            Err(IntentError::IneligibleTarget("u2".into()))
        );
        assert_eq!(
            mode.rewind_to("s", "nope"),
            Err(IntentError::UnknownTarget("nope".into()))
        );
        assert_eq!(mode.mode(), SessionMode::Paused);
    }

    #[test]
    fn cancel_returns_to_live() {
        let mut mode = ModeMachine::new("b");
        mode.time_stop("s").unwrap();
        let effects = mode.cancel("s").unwrap();
        assert_eq!(mode.mode(), SessionMode::Live);
        assert_eq!(
            effects,
            vec![Effect::Send(ControlMessage::RewindCancel {
                session_id: "s".into()
            })]
        );
    }

    #[test]
    fn intents_outside_their_mode_are_rejected() {
        let mut mode = ModeMachine::new("b");
        assert!(matches!(
            mode.cancel("s"),
            Err(IntentError::InvalidMode { mode: SessionMode::Live, .. })
        ));
        assert!(mode.rewind_to("s", "u1").is_err());
        mode.time_stop("s").unwrap();
        assert!(mode.time_stop("s").is_err());
    }

    #[test]
    fn replay_progress_is_tracked_and_completion_switches_branch() {
        let mut mode = ModeMachine::new("b");
        mode.time_stop("s").unwrap();
        mode.load_targets(transcript()).unwrap();
        mode.rewind_to("s", "u1").unwrap();

        mode.on_replay_progress(&ReplayProgressPayload {
            replayed: 2,
            total: Some(5),
            ..Default::default()
        });
        assert_eq!(
            mode.replay(),
            Some(&ReplayStatus {
                replayed: 2,
                total: Some(5)
            })
        );

        mode.on_replay_progress(&ReplayProgressPayload {
            status: Some("completed".into()),
            branch_id: Some("b-new".into()),
            ..Default::default()
        });
        assert_eq!(mode.mode(), SessionMode::Live);
        assert_eq!(mode.branch_id(), "b-new");
    }

    #[test]
    fn branch_switch_while_live_only_updates_branch() {
        let mut mode = ModeMachine::new("b");
        mode.on_branch_switched("b-other");
        assert_eq!(mode.mode(), SessionMode::Live);
        assert_eq!(mode.branch_id(), "b-other");
    }
}
