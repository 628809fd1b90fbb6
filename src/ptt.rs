//! Push-to-talk floor control
//!
//! Acquiring the floor is a two-phase commit: the mic opens optimistically and
//! `fac_start` is sent, then a watchdog waits for the conductor's `fac_ack`.
//! If the ack never arrives the watchdog forces a release and warns the user,
//! which bounds how long the UI can claim "mic on" while nobody is listening.

use crate::effect::{Effect, Notice, WatchdogId};
use crate::protocol::ControlMessage;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Remote participants are silenced while the facilitator holds the floor.
pub const REMOTE_VOLUME_DUCKED: f32 = 0.0;
pub const REMOTE_VOLUME_FULL: f32 = 1.0;

pub const DEFAULT_WATCHDOG: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PttState {
    /// Local intent: the PTT control is held
    pub pressed: bool,

    /// Mic indicator shown to the user
    pub mic_on: bool,

    /// `fac_start` sent, `fac_ack` not yet received
    pub awaiting_ack: bool,

    /// Conductor confirmed it is receiving our audio
    pub mic_seen: bool,

    #[serde(skip)]
    watchdog: Option<WatchdogId>,
}

pub struct PttController {
    state: PttState,
    watchdog_after: Duration,
    next_watchdog: u64,
}

impl PttController {
    pub fn new(watchdog_after: Duration) -> Self {
        Self {
            state: PttState::default(),
            watchdog_after,
            next_watchdog: 0,
        }
    }

    pub fn state(&self) -> &PttState {
        &self.state
    }

    /// Take the floor. Repeated calls while pressed do nothing.
    pub fn start(&mut self, session_id: &str) -> Vec<Effect> {
        if self.state.pressed {
            debug!("PTT already pressed, ignoring start");
            return Vec::new();
        }

        self.next_watchdog += 1;
        let id = WatchdogId(self.next_watchdog);

        self.state.pressed = true;
        self.state.mic_on = true;
        self.state.awaiting_ack = true;
        self.state.mic_seen = false;
        self.state.watchdog = Some(id);

        info!("PTT start (watchdog {})", id.0);

        vec![
            Effect::OpenMic,
            Effect::SetRemoteVolume(REMOTE_VOLUME_DUCKED),
            Effect::Send(ControlMessage::FacStart {
                session_id: session_id.to_string(),
            }),
            Effect::ArmWatchdog {
                id,
                after: self.watchdog_after,
            },
        ]
    }

    /// Release the floor. No-op unless pressed.
    pub fn end(&mut self, session_id: &str) -> Vec<Effect> {
        if !self.state.pressed {
            return Vec::new();
        }

        info!("PTT end");
        self.release(session_id)
    }

    /// `fac_ack`: the conductor heard the start signal.
    pub fn on_ack(&mut self) -> Vec<Effect> {
        if !self.state.awaiting_ack {
            debug!("Unsolicited fac_ack");
            return Vec::new();
        }

        self.state.awaiting_ack = false;
        match self.state.watchdog.take() {
            Some(id) => {
                debug!("fac_ack received, disarming watchdog {}", id.0);
                vec![Effect::DisarmWatchdog]
            }
            None => Vec::new(),
        }
    }

    /// `mic_seen`: the conductor is receiving audio, not just the signal.
    pub fn on_mic_seen(&mut self) {
        if self.state.pressed {
            self.state.mic_seen = true;
        }
    }

    /// Watchdog expiry. Stale or post-release expiries are ignored.
    pub fn on_watchdog(&mut self, id: WatchdogId, session_id: &str) -> Vec<Effect> {
        if !self.state.pressed || self.state.watchdog != Some(id) {
            debug!("Ignoring stale watchdog {}", id.0);
            return Vec::new();
        }

        warn!("No fac_ack within {:?}, forcing PTT release", self.watchdog_after);

        let mut effects = self.release(session_id);
        effects.push(Effect::Notify(Notice::warning(
            "Speaking start was not confirmed by the session. Please try again.",
        )));
        effects
    }

    /// The mic could not be opened: undo an optimistic start before anything
    /// else of it went out. Nothing needs compensating on the wire.
    pub fn abort_start(&mut self) {
        if self.state.pressed {
            warn!("PTT start aborted");
        }
        self.state = PttState::default();
    }

    fn release(&mut self, session_id: &str) -> Vec<Effect> {
        let had_watchdog = self.state.watchdog.take().is_some();

        self.state.pressed = false;
        self.state.mic_on = false;
        self.state.awaiting_ack = false;

        let mut effects = vec![
            Effect::CloseMic,
            Effect::SetRemoteVolume(REMOTE_VOLUME_FULL),
            Effect::Send(ControlMessage::FacEnd {
                session_id: session_id.to_string(),
            }),
        ];
        if had_watchdog {
            effects.push(Effect::DisarmWatchdog);
        }
        effects
    }
}
