pub mod api;
pub mod clock;
pub mod config;
pub mod effect;
pub mod http;
pub mod mode;
pub mod presence;
pub mod protocol;
pub mod ptt;
pub mod room;
pub mod session;

pub use api::{ApiError, HttpSessionApi, SessionApi};
pub use clock::{format_elapsed, ClockReconciler, ClockState};
pub use config::Config;
pub use effect::{Effect, Notice, NoticeLevel, WatchdogId};
pub use http::{create_router, AppState};
pub use mode::{IntentError, ModeMachine, RewindTarget, SessionMode};
pub use presence::{ParticipantView, PresenceTracker};
pub use protocol::{ControlMessage, CodecError};
pub use ptt::{PttController, PttState};
pub use room::{NatsRoom, RoomEvent, RoomTransport};
pub use session::{
    ControllerSettings, Intent, Lifecycle, LifecycleError, PttInput, SessionController,
    SessionHandle, SessionInfo, SessionRuntime, SessionView,
};
