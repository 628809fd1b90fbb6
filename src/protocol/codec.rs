use super::messages::ControlMessage;
use thiserror::Error;

/// Failure to turn a data-channel payload into a [`ControlMessage`] (or back).
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("malformed control message: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("failed to encode {kind}: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Serialize a control message to the UTF-8 JSON bytes sent over the channel
pub fn encode(message: &ControlMessage) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(|source| CodecError::Encode {
        kind: message.kind(),
        source,
    })
}

/// Decode a data-channel payload.
///
/// Never panics; every malformed or type-mismatched payload is an error the
/// caller is expected to log and drop.
pub fn decode(bytes: &[u8]) -> Result<ControlMessage, CodecError> {
    let text = std::str::from_utf8(bytes)?;
    serde_json::from_str(text).map_err(CodecError::Malformed)
}
