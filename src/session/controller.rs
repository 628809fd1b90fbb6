use super::input::{InputLatch, PttAction, PttInput};
use super::view::SessionView;
use crate::clock::ClockReconciler;
use crate::config::{Config, ParticipantsConfig};
use crate::effect::{Effect, Notice, NoticeLevel, WatchdogId};
use crate::mode::{IntentError, ModeMachine, RewindTarget};
use crate::presence::PresenceTracker;
use crate::protocol::{self, resolve_speaker, ControlMessage};
use crate::ptt::PttController;
use crate::room::RoomEvent;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MAX_NOTICES: usize = 16;

/// User intents accepted by a running session
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Ptt(PttInput),
    TimeStop,
    /// Populate the rewind panel with a freshly fetched transcript
    LoadRewindTargets(Vec<RewindTarget>),
    RewindTo { target_utterance_id: String },
    RewindCancel,
    Finish,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub ptt_watchdog: Duration,
    pub floor_open: Duration,
    pub participants: ParticipantsConfig,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ptt_watchdog: config.timing.ptt_watchdog(),
            floor_open: config.timing.floor_open(),
            participants: config.participants.clone(),
        }
    }
}

/// Pure session state machine.
///
/// Every input is a method call that updates the per-component state and
/// returns the effects to execute. Nothing here touches I/O or timers.
pub struct SessionController {
    session_id: String,
    floor_open_after: Duration,
    clock: ClockReconciler,
    ptt: PttController,
    mode: ModeMachine,
    presence: PresenceTracker,
    input: InputLatch,
    connected: bool,
    tick_running: bool,
    finished: bool,
    last_transcript: Option<String>,
    notices: VecDeque<Notice>,
}

impl SessionController {
    pub fn new(
        session_id: impl Into<String>,
        branch_id: impl Into<String>,
        settings: &ControllerSettings,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            floor_open_after: settings.floor_open,
            clock: ClockReconciler::new(),
            ptt: PttController::new(settings.ptt_watchdog),
            mode: ModeMachine::new(branch_id),
            presence: PresenceTracker::new(&settings.participants),
            input: InputLatch::default(),
            connected: false,
            tick_running: false,
            finished: false,
            last_transcript: None,
            notices: VecDeque::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_tick_running(&self) -> bool {
        self.tick_running
    }

    pub fn handle_room_event(&mut self, event: RoomEvent, now_ms: u64) -> Vec<Effect> {
        let effects = match event {
            RoomEvent::Connected => {
                if !self.connected {
                    info!("Room connected");
                }
                self.connected = true;
                Vec::new()
            }
            RoomEvent::Disconnected => {
                if self.connected {
                    warn!("Room disconnected");
                }
                self.connected = false;
                // No room, no floor
                self.ptt.end(&self.session_id)
            }
            RoomEvent::ParticipantConnected {
                identity,
                is_speaking,
            } => {
                self.presence.participant_joined(&identity, is_speaking);
                Vec::new()
            }
            RoomEvent::ParticipantDisconnected { identity } => {
                self.presence.participant_left(&identity);
                Vec::new()
            }
            RoomEvent::ActiveSpeakersChanged(active) => {
                self.presence.set_active_speakers(&active);
                Vec::new()
            }
            RoomEvent::Data { payload, .. } => self.on_data(&payload, now_ms),
        };
        self.settle(effects)
    }

    /// Decode and dispatch one data-channel payload.
    pub fn handle_data(&mut self, payload: &[u8], now_ms: u64) -> Vec<Effect> {
        let effects = self.on_data(payload, now_ms);
        self.settle(effects)
    }

    pub fn handle_message(&mut self, message: ControlMessage, now_ms: u64) -> Vec<Effect> {
        let effects = self.dispatch(message, now_ms);
        self.settle(effects)
    }

    pub fn handle_intent(&mut self, intent: Intent) -> Result<Vec<Effect>, IntentError> {
        if self.finished {
            return Err(IntentError::NoSession);
        }

        let sid = self.session_id.clone();
        let effects = match intent {
            Intent::Ptt(input) => match self.input.apply(&input) {
                Some(PttAction::Press) => self.start_ptt(),
                Some(PttAction::Release) => self.ptt.end(&sid),
                None => Vec::new(),
            },
            Intent::TimeStop => {
                let stop = self.mode.time_stop(&sid)?;
                let mut effects = self.ptt.end(&sid);
                effects.extend(stop);
                effects
            }
            Intent::LoadRewindTargets(targets) => {
                self.mode.load_targets(targets)?;
                Vec::new()
            }
            Intent::RewindTo {
                target_utterance_id,
            } => self.mode.rewind_to(&sid, &target_utterance_id)?,
            Intent::RewindCancel => self.mode.cancel(&sid)?,
            Intent::Finish => {
                let mut effects = self.ptt.end(&sid);
                effects.push(Effect::Send(ControlMessage::Finish { session_id: sid }));
                self.finished = true;
                effects
            }
        };
        Ok(self.settle(effects))
    }

    /// Periodic clock tick
    pub fn on_tick(&mut self, now_ms: u64) -> Vec<Effect> {
        self.clock.tick(now_ms);
        self.settle(Vec::new())
    }

    pub fn on_watchdog(&mut self, id: WatchdogId) -> Vec<Effect> {
        let effects = self.ptt.on_watchdog(id, &self.session_id);
        self.settle(effects)
    }

    pub fn on_floor_expired(&mut self, generation: u64) -> Vec<Effect> {
        self.presence.floor_expired(generation);
        self.settle(Vec::new())
    }

    /// Local teardown: release the floor and stop every timer.
    pub fn shutdown(&mut self) -> Vec<Effect> {
        let mut effects = self.ptt.end(&self.session_id);
        self.finished = true;
        self.connected = false;
        effects.push(Effect::DisarmWatchdog);
        self.settle(effects)
    }

    /// Roll back a PTT start whose microphone failed to open.
    pub fn abort_ptt(&mut self, reason: &str) -> Vec<Effect> {
        self.ptt.abort_start();
        let notice = Notice::error(format!("Microphone could not be opened: {}", reason));
        self.settle(vec![Effect::Notify(notice)])
    }

    pub fn push_notice(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!("Notice: {}", notice.text),
            NoticeLevel::Warning => warn!("Notice: {}", notice.text),
            NoticeLevel::Error => error!("Notice: {}", notice.text),
        }
        if self.notices.len() == MAX_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }

    pub fn view(&self) -> SessionView {
        let clock = self.clock.state();
        let ptt = self.ptt.state();
        SessionView {
            session_id: self.session_id.clone(),
            branch_id: self.mode.branch_id().to_string(),
            mode: self.mode.mode(),
            connected: self.connected,
            timer: self.clock.display(),
            session_time_ms: clock.session_time_ms,
            clock_paused: clock.paused,
            ptt_pressed: ptt.pressed,
            mic_on: ptt.mic_on,
            awaiting_ack: ptt.awaiting_ack,
            mic_seen: ptt.mic_seen,
            floor_open: self.presence.floor_open(),
            participants: self.presence.views(),
            rewind_panel_open: self.mode.rewind_panel_open(),
            rewind_targets: self.mode.targets().to_vec(),
            pending_rewind_target: self.mode.pending_target().map(str::to_string),
            replay: self.mode.replay().cloned(),
            last_transcript: self.last_transcript.clone(),
            notices: self.notices.iter().cloned().collect(),
        }
    }

    fn start_ptt(&mut self) -> Vec<Effect> {
        if !self.connected {
            debug!("PTT ignored: room not connected");
            return Vec::new();
        }
        if !self.mode.ptt_available() {
            debug!("PTT ignored while {}", self.mode.mode());
            return Vec::new();
        }
        self.ptt.start(&self.session_id)
    }

    fn on_data(&mut self, payload: &[u8], now_ms: u64) -> Vec<Effect> {
        match protocol::decode(payload) {
            Ok(message) => self.dispatch(message, now_ms),
            Err(e) => {
                debug!("Dropping undecodable control message: {}", e);
                Vec::new()
            }
        }
    }

    /// Message dispatch table
    fn dispatch(&mut self, message: ControlMessage, now_ms: u64) -> Vec<Effect> {
        if let Some(sid) = message.session_id() {
            if sid != self.session_id {
                debug!("Dropping {} for foreign session {}", message.kind(), sid);
                return Vec::new();
            }
        }

        debug!("Control message: {}", message.kind());

        match message {
            ControlMessage::FacAck { .. } => return self.ptt.on_ack(),
            ControlMessage::MicSeen { .. } => self.ptt.on_mic_seen(),
            ControlMessage::SilenceStart { .. } => {
                let generation = self.presence.silence_start();
                return vec![Effect::ArmFloorTimer {
                    generation,
                    after: self.floor_open_after,
                }];
            }
            ControlMessage::SpeakCmd {
                speaker_id, payload, ..
            } => match resolve_speaker(&speaker_id, &payload) {
                Some(speaker) => self.presence.speak_cmd(speaker),
                None => debug!("speak_cmd without speaker_id"),
            },
            ControlMessage::PlaybackDone {
                speaker_id, payload, ..
            } => match resolve_speaker(&speaker_id, &payload) {
                Some(speaker) => self.presence.playback_done(speaker),
                None => debug!("playback_done without speaker_id"),
            },
            ControlMessage::TranscriptComplete { payload, .. } => {
                info!("Transcript: {}", payload.text);
                self.last_transcript = Some(payload.text);
            }
            ControlMessage::ClockSync { payload, .. } => {
                let paused = payload.is_paused.unwrap_or(self.clock.state().paused);
                self.clock.sync(now_ms, payload.session_time_ms, paused);
            }
            ControlMessage::ClockPause { payload, .. } => {
                self.clock.pause(now_ms, payload.session_time_ms);
            }
            ControlMessage::ClockResume { payload, .. } => {
                self.clock.resume(now_ms, payload.session_time_ms);
            }
            ControlMessage::ClockRewind { payload, .. } => {
                self.clock.rewind(now_ms, payload.session_time_ms);
            }
            ControlMessage::BranchSwitched { payload, .. } => {
                self.mode.on_branch_switched(&payload.branch_id);
            }
            ControlMessage::ReplayProgress { payload, .. } => {
                self.mode.on_replay_progress(&payload);
            }
            ControlMessage::FacStart { .. }
            | ControlMessage::FacEnd { .. }
            | ControlMessage::TimeStop { .. }
            | ControlMessage::RewindTo { .. }
            | ControlMessage::RewindCancel { .. }
            | ControlMessage::Finish { .. } => {
                debug!("Ignoring outbound-only message type");
            }
            ControlMessage::Unknown => debug!("Ignoring unknown message type"),
        }
        Vec::new()
    }

    /// Absorb notices and keep the clock tick armed exactly while needed.
    fn settle(&mut self, effects: Vec<Effect>) -> Vec<Effect> {
        let mut out = Vec::with_capacity(effects.len() + 1);
        for effect in effects {
            match effect {
                Effect::Notify(notice) => self.push_notice(notice),
                other => out.push(other),
            }
        }

        let want_tick = self.connected && self.clock.is_running() && !self.finished;
        if want_tick != self.tick_running {
            self.tick_running = want_tick;
            out.push(if want_tick {
                Effect::StartTick
            } else {
                Effect::StopTick
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{BranchPayload, ClockMark, ClockPoint};

    fn controller() -> SessionController {
        let settings = ControllerSettings {
            ptt_watchdog: Duration::from_millis(1500),
            floor_open: Duration::from_millis(3000),
            participants: ParticipantsConfig::default(),
        };
        let mut c = SessionController::new("s", "b0", &settings);
        c.handle_room_event(RoomEvent::Connected, 0);
        c
    }

    fn sync(ms: u64, paused: bool) -> ControlMessage {
        ControlMessage::ClockSync {
            session_id: None,
            payload: ClockPoint {
                session_time_ms: ms,
                is_paused: Some(paused),
            },
        }
    }

    #[test]
    fn tick_follows_clock_and_connection() {
        let mut c = controller();
        assert!(!c.is_tick_running());

        assert_eq!(c.handle_message(sync(5000, false), 10), vec![Effect::StartTick]);
        assert!(c.is_tick_running());

        let pause = ControlMessage::ClockPause {
            session_id: None,
            payload: ClockMark::default(),
        };
        assert_eq!(c.handle_message(pause, 20), vec![Effect::StopTick]);

        let resume = ControlMessage::ClockResume {
            session_id: None,
            payload: ClockMark::default(),
        };
        assert_eq!(c.handle_message(resume, 30), vec![Effect::StartTick]);
        assert_eq!(
            c.handle_room_event(RoomEvent::Disconnected, 40),
            vec![Effect::StopTick]
        );
        assert_eq!(
            c.handle_room_event(RoomEvent::Connected, 50),
            vec![Effect::StartTick]
        );
    }

    #[test]
    fn sync_without_pause_flag_keeps_current_state() {
        let mut c = controller();
        c.handle_message(sync(1000, false), 0);
        c.handle_data(br#"{"type":"clock_sync","payload":{"session_time_ms":2000}}"#, 0);
        assert!(!c.view().clock_paused);
        assert_eq!(c.view().session_time_ms, 2000);
    }

    #[test]
    fn foreign_session_messages_are_ignored() {
        let mut c = controller();
        let foreign = ControlMessage::BranchSwitched {
            session_id: Some("other".into()),
            payload: BranchPayload {
                branch_id: "b9".into(),
            },
        };
        assert!(c.handle_message(foreign, 0).is_empty());
        assert_eq!(c.view().branch_id, "b0");
    }

    #[test]
    fn silence_start_arms_floor_timer() {
        let mut c = controller();
        let effects = c.handle_data(br#"{"type":"silence_start"}"#, 0);
        assert_eq!(
            effects,
            vec![Effect::ArmFloorTimer {
                generation: 1,
                after: Duration::from_millis(3000)
            }]
        );
        assert!(c.view().floor_open);

        c.on_floor_expired(1);
        assert!(!c.view().floor_open);
    }

    #[test]
    fn watchdog_notice_is_absorbed() {
        let mut c = controller();
        let effects = c.handle_intent(Intent::Ptt(PttInput::PointerDown)).unwrap();
        let id = effects
            .iter()
            .find_map(|e| match e {
                Effect::ArmWatchdog { id, .. } => Some(*id),
                _ => None,
            })
            .unwrap();

        let effects = c.on_watchdog(id);
        assert!(effects.iter().all(|e| !matches!(e, Effect::Notify(_))));
        assert!(effects.contains(&Effect::CloseMic));
        assert_eq!(c.view().notices.len(), 1);
        assert_eq!(c.view().notices[0].level, NoticeLevel::Warning);

        // Second expiry of the same watchdog is stale
        assert!(c.on_watchdog(id).is_empty());
        assert_eq!(c.view().notices.len(), 1);
    }

    #[test]
    fn failed_microphone_rolls_back_ptt() {
        let mut c = controller();
        c.handle_intent(Intent::Ptt(PttInput::PointerDown)).unwrap();
        assert!(c.view().mic_on);

        let effects = c.abort_ptt("device busy");
        assert!(effects.is_empty());
        let view = c.view();
        assert!(!view.mic_on);
        assert!(!view.ptt_pressed);
        assert!(!view.awaiting_ack);
        assert_eq!(view.notices.len(), 1);
        assert_eq!(view.notices[0].level, NoticeLevel::Error);
        assert!(view.notices[0].text.contains("device busy"));
    }

    #[test]
    fn finished_session_rejects_intents() {
        let mut c = controller();
        let effects = c.handle_intent(Intent::Finish).unwrap();
        assert_eq!(
            effects,
            vec![Effect::Send(ControlMessage::Finish {
                session_id: "s".into()
            })]
        );
        assert_eq!(c.handle_intent(Intent::TimeStop), Err(IntentError::NoSession));
    }
}
