use crate::effect::Notice;
use crate::mode::{ReplayStatus, RewindTarget, SessionMode};
use crate::presence::ParticipantView;
use serde::Serialize;

/// Snapshot of everything the UI renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub branch_id: String,
    pub mode: SessionMode,
    pub connected: bool,

    /// Elapsed session time as `MM:SS`
    pub timer: String,
    pub session_time_ms: u64,
    pub clock_paused: bool,

    pub ptt_pressed: bool,
    pub mic_on: bool,
    /// `fac_start` sent and not yet acknowledged
    pub awaiting_ack: bool,
    pub mic_seen: bool,

    /// Transient "floor open" indicator after `silence_start`
    pub floor_open: bool,
    pub participants: Vec<ParticipantView>,

    pub rewind_panel_open: bool,
    pub rewind_targets: Vec<RewindTarget>,
    pub pending_rewind_target: Option<String>,
    pub replay: Option<ReplayStatus>,

    /// Last recognized facilitator speech
    pub last_transcript: Option<String>,
    /// Recent notices, oldest first
    pub notices: Vec<Notice>,
}
