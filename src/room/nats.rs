use super::packets::{PresenceEvent, PresencePacket, RoomPacket, SpeakersPacket, TrackPacket};
use super::{RemoteParticipant, RoomEvent, RoomTransport};
use anyhow::{Context, Result};
use async_nats::Client;
use base64::Engine;
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Default, Clone, Copy)]
struct LocalTrack {
    published: bool,
    muted: bool,
}

/// Room transport bridged over NATS subjects under `room.<room_name>`
pub struct NatsRoom {
    client: Client,
    room_name: String,
    identity: String,
    instance: String,
    roster: Arc<Mutex<HashMap<String, bool>>>,
    local_track: Mutex<LocalTrack>,
    remote_volume: Mutex<f32>,
    subscriber_task: Mutex<Option<JoinHandle<()>>>,
}

impl NatsRoom {
    /// Join `room_name` as `identity`, authenticating with the minted token.
    ///
    /// Returns the room and the receiver for its events.
    pub async fn join(
        url: &str,
        room_name: &str,
        identity: &str,
        token: &str,
    ) -> Result<(Self, mpsc::Receiver<RoomEvent>)> {
        info!("Joining room {} at {} as {}", room_name, url, identity);

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let state_tx = tx.clone();
        let client = async_nats::ConnectOptions::with_token(token.to_string())
            .name(identity)
            .event_callback(move |event| {
                let tx = state_tx.clone();
                async move {
                    let mapped = match event {
                        async_nats::Event::Connected => Some(RoomEvent::Connected),
                        async_nats::Event::Disconnected => Some(RoomEvent::Disconnected),
                        other => {
                            debug!("NATS event: {:?}", other);
                            None
                        }
                    };
                    if let Some(event) = mapped {
                        let _ = tx.send(event).await;
                    }
                }
            })
            .connect(url)
            .await
            .context("Failed to connect to room")?;

        let room = Self {
            client,
            room_name: room_name.to_string(),
            identity: identity.to_string(),
            instance: uuid::Uuid::new_v4().to_string(),
            roster: Arc::new(Mutex::new(HashMap::new())),
            local_track: Mutex::new(LocalTrack::default()),
            remote_volume: Mutex::new(1.0),
            subscriber_task: Mutex::new(None),
        };

        room.subscribe(tx.clone()).await?;
        room.announce(PresenceEvent::Joined).await?;

        let _ = tx.send(RoomEvent::Connected).await;
        info!("Joined room {}", room_name);

        Ok((room, rx))
    }

    fn subject(&self, leaf: &str) -> String {
        format!("room.{}.{}", self.room_name, leaf)
    }

    async fn subscribe(&self, tx: mpsc::Sender<RoomEvent>) -> Result<()> {
        let subject = self.subject(">");
        let mut subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .context("Failed to subscribe to room")?;

        info!("Subscribed to {}", subject);

        let router = PacketRouter {
            client: self.client.clone(),
            presence_subject: self.subject("presence"),
            identity: self.identity.clone(),
            instance: self.instance.clone(),
            roster: Arc::clone(&self.roster),
            tx,
        };

        let task = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let subject: &str = &msg.subject;
                if let Err(e) = router.route(subject, &msg.payload).await {
                    // Malformed room traffic is never fatal
                    debug!("Dropping packet on {}: {}", subject, e);
                }
            }
            info!("Room subscription ended");
            let _ = router.tx.send(RoomEvent::Disconnected).await;
        });

        *self.subscriber_task.lock().await = Some(task);
        Ok(())
    }

    async fn announce(&self, event: PresenceEvent) -> Result<()> {
        let packet = PresencePacket {
            identity: self.identity.clone(),
            event,
        };
        self.client
            .publish(self.subject("presence"), serde_json::to_vec(&packet)?.into())
            .await
            .context("Failed to announce presence")?;
        Ok(())
    }

    async fn announce_track(&self, track: LocalTrack) -> Result<()> {
        let packet = TrackPacket {
            identity: self.identity.clone(),
            published: track.published,
            muted: track.muted,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.client
            .publish(self.subject("tracks"), serde_json::to_vec(&packet)?.into())
            .await
            .context("Failed to publish track state")?;
        Ok(())
    }

    async fn update_track(&self, published: bool, muted: bool) -> Result<()> {
        let track = {
            let mut track = self.local_track.lock().await;
            track.published = published;
            track.muted = muted;
            *track
        };
        debug!("Local audio track: published={} muted={}", published, muted);
        self.announce_track(track).await
    }
}

/// Routes inbound room subjects to [`RoomEvent`]s
struct PacketRouter {
    client: Client,
    presence_subject: String,
    identity: String,
    instance: String,
    roster: Arc<Mutex<HashMap<String, bool>>>,
    tx: mpsc::Sender<RoomEvent>,
}

impl PacketRouter {
    async fn route(&self, subject: &str, payload: &[u8]) -> Result<()> {
        match subject.rsplit('.').next() {
            Some("data") => {
                let packet: RoomPacket = serde_json::from_slice(payload)?;
                if packet.instance == self.instance {
                    return Ok(());
                }
                let bytes = base64::engine::general_purpose::STANDARD.decode(&packet.data)?;
                self.emit(RoomEvent::Data {
                    sender: Some(packet.sender),
                    payload: bytes,
                })
                .await;
            }
            Some("presence") => {
                let packet: PresencePacket = serde_json::from_slice(payload)?;
                if packet.identity == self.identity {
                    return Ok(());
                }
                self.on_presence(packet).await?;
            }
            Some("speakers") => {
                let packet: SpeakersPacket = serde_json::from_slice(payload)?;
                {
                    let mut roster = self.roster.lock().await;
                    for (identity, speaking) in roster.iter_mut() {
                        *speaking = packet.active.contains(identity);
                    }
                }
                self.emit(RoomEvent::ActiveSpeakersChanged(packet.active)).await;
            }
            _ => {}
        }
        Ok(())
    }

    async fn on_presence(&self, packet: PresencePacket) -> Result<()> {
        match packet.event {
            PresenceEvent::Joined => {
                let is_new = self
                    .roster
                    .lock()
                    .await
                    .insert(packet.identity.clone(), false)
                    .is_none();
                if !is_new {
                    return Ok(());
                }
                info!("Participant joined: {}", packet.identity);
                // Let the newcomer learn about us
                let reply = PresencePacket {
                    identity: self.identity.clone(),
                    event: PresenceEvent::Joined,
                };
                self.client
                    .publish(self.presence_subject.clone(), serde_json::to_vec(&reply)?.into())
                    .await
                    .context("Failed to answer presence")?;
                self.emit(RoomEvent::ParticipantConnected {
                    identity: packet.identity,
                    is_speaking: false,
                })
                .await;
            }
            PresenceEvent::Left => {
                if self.roster.lock().await.remove(&packet.identity).is_some() {
                    info!("Participant left: {}", packet.identity);
                    self.emit(RoomEvent::ParticipantDisconnected {
                        identity: packet.identity,
                    })
                    .await;
                }
            }
        }
        Ok(())
    }

    async fn emit(&self, event: RoomEvent) {
        if self.tx.send(event).await.is_err() {
            warn!("Room event receiver dropped");
        }
    }
}

#[async_trait::async_trait]
impl RoomTransport for NatsRoom {
    async fn publish_reliable(&self, payload: Vec<u8>) -> Result<()> {
        let packet = RoomPacket {
            sender: self.identity.clone(),
            instance: self.instance.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(&payload),
        };
        let subject = self.subject("data");

        self.client
            .publish(subject.clone(), serde_json::to_vec(&packet)?.into())
            .await
            .context("Failed to publish data packet")?;
        // Reliable mode: make sure it left the client before reporting success
        self.client
            .flush()
            .await
            .context("Failed to flush data packet")?;

        debug!("Published {} bytes to {}", payload.len(), subject);
        Ok(())
    }

    async fn has_local_audio_track(&self) -> bool {
        self.local_track.lock().await.published
    }

    async fn publish_local_audio(&self) -> Result<()> {
        self.update_track(true, false).await
    }

    async fn unmute_local_audio(&self) -> Result<()> {
        let published = self.local_track.lock().await.published;
        self.update_track(published, false).await
    }

    async fn mute_local_audio(&self) -> Result<()> {
        let published = self.local_track.lock().await.published;
        self.update_track(published, true).await
    }

    async fn set_remote_volume(&self, volume: f32) -> Result<()> {
        let volume = volume.clamp(0.0, 1.0);
        *self.remote_volume.lock().await = volume;
        debug!("Remote playback volume set to {:.2}", volume);
        Ok(())
    }

    async fn remote_participants(&self) -> Vec<RemoteParticipant> {
        self.roster
            .lock()
            .await
            .iter()
            .map(|(identity, speaking)| RemoteParticipant {
                identity: identity.clone(),
                is_speaking: *speaking,
            })
            .collect()
    }

    async fn leave(&self) -> Result<()> {
        info!("Leaving room {}", self.room_name);

        if let Err(e) = self.announce(PresenceEvent::Left).await {
            error!("Failed to announce departure: {}", e);
        }
        self.client.flush().await.context("Failed to flush on leave")?;

        if let Some(task) = self.subscriber_task.lock().await.take() {
            task.abort();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "nats"
    }
}
