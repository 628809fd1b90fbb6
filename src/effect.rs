use crate::protocol::ControlMessage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Identifies one armed PTT watchdog so a late expiry can be recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WatchdogId(pub u64);

/// Side effects requested by the state machines.
///
/// The controllers never touch the room or timers themselves; the session
/// runtime executes these in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Publish a control message on the reliable data channel
    Send(ControlMessage),
    /// Open the local microphone (unmute, or publish-and-unmute if no track yet)
    OpenMic,
    /// Mute the local microphone track
    CloseMic,
    /// Set playback volume of every remote participant (0.0 - 1.0)
    SetRemoteVolume(f32),
    ArmWatchdog { id: WatchdogId, after: Duration },
    DisarmWatchdog,
    StartTick,
    StopTick,
    /// Schedule the floor-open indicator to clear
    ArmFloorTimer { generation: u64, after: Duration },
    Notify(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible, non-blocking notice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, text)
    }

    fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            at: Utc::now(),
        }
    }
}
