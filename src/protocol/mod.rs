//! Data-channel control protocol
//!
//! JSON control messages exchanged with the conductor, and the codec that maps
//! them to and from the room's binary payloads.

pub mod codec;
pub mod messages;

pub use codec::{decode, encode, CodecError};
pub use messages::{
    resolve_speaker, BranchPayload, ClockMark, ClockPoint, ControlMessage, ReplayProgressPayload,
    RewindToPayload, SpeakerPayload, TranscriptPayload,
};
