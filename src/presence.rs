//! Remote participant presence
//!
//! A participant is shown as speaking when the room's audio-activity detector
//! marks them active OR the conductor sent `speak_cmd` for them without a
//! matching `playback_done` since.
//!
//! When the two disagree after a stop, the explicit `playback_done` wins: the
//! identity's residual room activity is suppressed until the room itself
//! reports them inactive, or a new `speak_cmd` arrives.

use crate::config::ParticipantsConfig;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Neutral,
}

/// What a participant tile renders. Derived, never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantView {
    pub identity: String,
    pub display_name: String,
    pub avatar: String,
    pub is_speaking: bool,
    pub mood: Mood,
}

pub struct PresenceTracker {
    /// Remote identities in join order
    roster: Vec<String>,
    room_active: HashSet<String>,
    commanded: HashSet<String>,
    suppressed: HashSet<String>,
    floor_open: bool,
    floor_generation: u64,
    hidden: HashSet<String>,
    avatars: HashMap<String, String>,
    default_avatar: String,
}

impl PresenceTracker {
    pub fn new(config: &ParticipantsConfig) -> Self {
        Self {
            roster: Vec::new(),
            room_active: HashSet::new(),
            commanded: HashSet::new(),
            suppressed: HashSet::new(),
            floor_open: false,
            floor_generation: 0,
            hidden: config.hidden.iter().cloned().collect(),
            avatars: config.avatars.clone(),
            default_avatar: config.default_avatar.clone(),
        }
    }

    pub fn participant_joined(&mut self, identity: &str, is_speaking: bool) {
        if !self.roster.iter().any(|id| id == identity) {
            self.roster.push(identity.to_string());
        }
        if is_speaking {
            self.room_active.insert(identity.to_string());
        }
    }

    pub fn participant_left(&mut self, identity: &str) {
        self.roster.retain(|id| id != identity);
        self.room_active.remove(identity);
        self.commanded.remove(identity);
        self.suppressed.remove(identity);
    }

    /// Room audio-activity update: the full set of currently active speakers.
    pub fn set_active_speakers(&mut self, active: &[String]) {
        let active: HashSet<String> = active.iter().cloned().collect();
        // Suppression ends once the room agrees the identity went quiet
        self.suppressed.retain(|id| active.contains(id));
        self.room_active = active;
    }

    /// `speak_cmd`. Supersedes any open-floor indicator.
    pub fn speak_cmd(&mut self, identity: &str) {
        debug!("Speaking: {}", identity);
        self.suppressed.remove(identity);
        self.commanded.insert(identity.to_string());
        self.close_floor();
    }

    /// `playback_done`
    pub fn playback_done(&mut self, identity: &str) {
        debug!("Stopped speaking: {}", identity);
        self.commanded.remove(identity);
        if self.room_active.contains(identity) {
            self.suppressed.insert(identity.to_string());
        }
    }

    /// `silence_start`. Returns the generation the caller should expire.
    pub fn silence_start(&mut self) -> u64 {
        self.floor_generation += 1;
        self.floor_open = true;
        self.floor_generation
    }

    /// Floor-open timer fired; ignored if a newer silence or a speak command
    /// superseded it.
    pub fn floor_expired(&mut self, generation: u64) {
        if generation == self.floor_generation {
            self.floor_open = false;
        }
    }

    pub fn floor_open(&self) -> bool {
        self.floor_open
    }

    pub fn is_speaking(&self, identity: &str) -> bool {
        let room = self.room_active.contains(identity) && !self.suppressed.contains(identity);
        room || self.commanded.contains(identity)
    }

    pub fn views(&self) -> Vec<ParticipantView> {
        self.roster
            .iter()
            .filter(|id| !self.hidden.contains(*id))
            .map(|id| ParticipantView {
                identity: id.clone(),
                display_name: id.clone(),
                avatar: self
                    .avatars
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| self.default_avatar.clone()),
                is_speaking: self.is_speaking(id),
                mood: Mood::Neutral,
            })
            .collect()
    }

    fn close_floor(&mut self) {
        self.floor_generation += 1;
        self.floor_open = false;
    }
}
