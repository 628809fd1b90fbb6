//! Real-time room transport
//!
//! The media room is an external collaborator. The session only needs a
//! reliable data channel, control over the local microphone track and remote
//! playback volume, and a feed of participant/activity events.

mod nats;
mod packets;

pub use nats::NatsRoom;
pub use packets::{PresenceEvent, PresencePacket, RoomPacket, SpeakersPacket, TrackPacket};

use anyhow::Result;

/// Events emitted by a joined room
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Connected,
    Disconnected,
    ParticipantConnected { identity: String, is_speaking: bool },
    ParticipantDisconnected { identity: String },
    /// Full set of identities the room currently detects as vocalizing
    ActiveSpeakersChanged(Vec<String>),
    /// Payload received on the data channel
    Data { sender: Option<String>, payload: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteParticipant {
    pub identity: String,
    pub is_speaking: bool,
}

/// Room capability used by the session runtime
///
/// Implementations:
/// - NATS: data channel and presence bridged over NATS subjects
/// - In-memory fakes in tests
#[async_trait::async_trait]
pub trait RoomTransport: Send + Sync {
    /// Publish on the reliable, ordered data channel
    async fn publish_reliable(&self, payload: Vec<u8>) -> Result<()>;

    /// Whether a local microphone track has been published
    async fn has_local_audio_track(&self) -> bool;

    /// Publish the local microphone track (unmuted)
    async fn publish_local_audio(&self) -> Result<()>;

    async fn unmute_local_audio(&self) -> Result<()>;

    async fn mute_local_audio(&self) -> Result<()>;

    /// Playback volume for all remote audio (0.0 - 1.0)
    async fn set_remote_volume(&self, volume: f32) -> Result<()>;

    async fn remote_participants(&self) -> Vec<RemoteParticipant>;

    async fn leave(&self) -> Result<()>;

    /// Transport name for logging
    fn name(&self) -> &str;
}
