//! Local control surface
//!
//! Drives the active session from a browser or script:
//! - GET /status - Current session view
//! - POST /ptt/down, /ptt/up, /ptt/leave, /input/key - Push-to-talk input
//! - POST /time-stop - Pause the simulation
//! - GET /rewind/targets - Load the rewind panel
//! - POST /rewind, /rewind/cancel - Commit or abort a rewind
//! - POST /finish - End the session
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
