//! Facilitator session
//!
//! This module ties the protocol state machines to a live room:
//! - `SessionController`: pure dispatcher over clock, PTT, mode and presence
//! - `SessionRuntime`: the single task executing controller effects
//! - `Lifecycle`: start/end against the session service

mod controller;
mod input;
mod lifecycle;
mod runtime;
mod view;

pub use controller::{ControllerSettings, Intent, SessionController};
pub use input::{InputLatch, PttAction, PttInput, SPACE};
pub use lifecycle::{Lifecycle, LifecycleError, RewindSource, SessionInfo};
pub use runtime::{SessionHandle, SessionRuntime};
pub use view::SessionView;
