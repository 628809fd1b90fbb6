use serde::{Deserialize, Serialize};

/// Data-channel packet on `room.<name>.data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomPacket {
    pub sender: String,
    /// Connection instance, used to drop our own echoes
    pub instance: String,
    pub data: String, // Base64-encoded payload bytes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceEvent {
    Joined,
    Left,
}

/// Presence announcement on `room.<name>.presence`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresencePacket {
    pub identity: String,
    pub event: PresenceEvent,
}

/// Active-speaker update on `room.<name>.speakers`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakersPacket {
    pub active: Vec<String>,
}

/// Local track state announcement on `room.<name>.tracks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPacket {
    pub identity: String,
    pub published: bool,
    pub muted: bool,
    pub timestamp: String, // RFC3339 timestamp
}
