use super::controller::{Intent, SessionController};
use super::view::SessionView;
use crate::effect::{Effect, WatchdogId};
use crate::mode::IntentError;
use crate::protocol;
use crate::room::{RoomEvent, RoomTransport};
use std::collections::VecDeque;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const COMMAND_BUFFER: usize = 64;

enum Command {
    Intent {
        intent: Intent,
        reply: oneshot::Sender<Result<(), IntentError>>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SessionView>,
}

impl SessionHandle {
    /// Submit a user intent and wait until the session has applied it.
    pub async fn send(&self, intent: Intent) -> Result<(), IntentError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Intent { intent, reply })
            .await
            .map_err(|_| IntentError::NoSession)?;
        rx.await.map_err(|_| IntentError::NoSession)?
    }

    /// Stop the session task. Returns once local teardown is complete.
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown { done }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Latest snapshot
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Deadlines for the delayed actions the controller may request
#[derive(Default)]
struct Timers {
    tick: Option<Interval>,
    watchdog: Option<(WatchdogId, Instant)>,
    floor: Option<(u64, Instant)>,
}

async fn next_tick(tick: &mut Option<Interval>) {
    match tick {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn expiry<T: Copy>(slot: Option<(T, Instant)>) -> T {
    match slot {
        Some((value, at)) => {
            sleep_until(at).await;
            value
        }
        None => pending().await,
    }
}

/// Single task that owns the [`SessionController`] and executes its effects
/// against the room.
pub struct SessionRuntime {
    controller: SessionController,
    room: Arc<dyn RoomTransport>,
    events: mpsc::Receiver<RoomEvent>,
    tick_period: Duration,
}

impl SessionRuntime {
    pub fn new(
        controller: SessionController,
        room: Arc<dyn RoomTransport>,
        events: mpsc::Receiver<RoomEvent>,
        tick_period: Duration,
    ) -> Self {
        Self {
            controller,
            room,
            events,
            tick_period,
        }
    }

    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (view_tx, view_rx) = watch::channel(self.controller.view());

        let task = tokio::spawn(self.run(commands_rx, view_tx));

        (
            SessionHandle {
                commands: commands_tx,
                view: view_rx,
            },
            task,
        )
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>, view: watch::Sender<SessionView>) {
        info!(
            "Session {} runtime started on {} room",
            self.controller.session_id(),
            self.room.name()
        );

        let base = Instant::now();
        let now_ms = || base.elapsed().as_millis() as u64;
        let mut timers = Timers::default();
        let mut events_open = true;

        self.prepare_microphone().await;

        for participant in self.room.remote_participants().await {
            let event = RoomEvent::ParticipantConnected {
                identity: participant.identity,
                is_speaking: participant.is_speaking,
            };
            let effects = self.controller.handle_room_event(event, now_ms());
            self.execute(effects, &mut timers).await;
        }
        view.send_replace(self.controller.view());

        let shutdown_ack = loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Intent { intent, reply }) => {
                        match self.controller.handle_intent(intent) {
                            Ok(effects) => {
                                self.execute(effects, &mut timers).await;
                                // Callers read the view right after the reply
                                view.send_replace(self.controller.view());
                                let _ = reply.send(Ok(()));
                            }
                            Err(e) => {
                                debug!("Intent rejected: {}", e);
                                let _ = reply.send(Err(e));
                            }
                        }
                    }
                    Some(Command::Shutdown { done }) => break Some(done),
                    None => break None,
                },
                event = self.events.recv(), if events_open => {
                    let event = event.unwrap_or_else(|| {
                        events_open = false;
                        RoomEvent::Disconnected
                    });
                    let effects = self.controller.handle_room_event(event, now_ms());
                    self.execute(effects, &mut timers).await;
                }
                _ = next_tick(&mut timers.tick) => {
                    let effects = self.controller.on_tick(now_ms());
                    self.execute(effects, &mut timers).await;
                }
                id = expiry(timers.watchdog) => {
                    timers.watchdog = None;
                    let effects = self.controller.on_watchdog(id);
                    self.execute(effects, &mut timers).await;
                }
                generation = expiry(timers.floor) => {
                    timers.floor = None;
                    let effects = self.controller.on_floor_expired(generation);
                    self.execute(effects, &mut timers).await;
                }
            }
            view.send_replace(self.controller.view());
        };

        let effects = self.controller.shutdown();
        self.execute(effects, &mut timers).await;
        view.send_replace(self.controller.view());

        if let Err(e) = self.room.leave().await {
            error!("Failed to leave room: {}", e);
        }

        info!("Session {} runtime stopped", self.controller.session_id());

        if let Some(done) = shutdown_ack {
            let _ = done.send(());
        }
    }

    /// Publish the mic track on join but keep it muted until PTT.
    async fn prepare_microphone(&self) {
        if let Err(e) = self.room.publish_local_audio().await {
            warn!("Failed to publish microphone track: {}", e);
            return;
        }
        if let Err(e) = self.room.mute_local_audio().await {
            warn!("Failed to mute microphone track: {}", e);
        }
    }

    async fn execute(&mut self, effects: Vec<Effect>, timers: &mut Timers) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Send(message) => {
                    let kind = message.kind();
                    let bytes = match protocol::encode(&message) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            error!("{}", e);
                            continue;
                        }
                    };
                    if let Err(e) = self.room.publish_reliable(bytes).await {
                        warn!("Failed to publish {}: {}", kind, e);
                    } else {
                        debug!("Sent {}", kind);
                    }
                }
                Effect::OpenMic => {
                    let result = if self.room.has_local_audio_track().await {
                        self.room.unmute_local_audio().await
                    } else {
                        self.room.publish_local_audio().await
                    };
                    if let Err(e) = result {
                        // The rest of the batch announces a floor we cannot use
                        queue.clear();
                        queue.extend(self.controller.abort_ptt(&e.to_string()));
                    }
                }
                Effect::CloseMic => {
                    if let Err(e) = self.room.mute_local_audio().await {
                        warn!("Failed to mute microphone: {}", e);
                    }
                }
                Effect::SetRemoteVolume(volume) => {
                    if let Err(e) = self.room.set_remote_volume(volume).await {
                        warn!("Failed to set remote volume: {}", e);
                    }
                }
                Effect::ArmWatchdog { id, after } => {
                    timers.watchdog = Some((id, Instant::now() + after));
                }
                Effect::DisarmWatchdog => timers.watchdog = None,
                Effect::StartTick => {
                    let mut interval =
                        interval_at(Instant::now() + self.tick_period, self.tick_period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    timers.tick = Some(interval);
                    debug!("Clock tick started");
                }
                Effect::StopTick => {
                    timers.tick = None;
                    debug!("Clock tick stopped");
                }
                Effect::ArmFloorTimer { generation, after } => {
                    timers.floor = Some((generation, Instant::now() + after));
                }
                Effect::Notify(notice) => self.controller.push_notice(notice),
            }
        }
    }
}
