use serde::{Deserialize, Serialize};

/// Events emitted by the client over the stream channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// A stream is beginning (no payload)
    StartStream,
    /// One captured block, base64-encoded little-endian PCM16 mono
    AudioData { payload: String },
    /// The stream is ending (no payload)
    StopStream,
}

/// Events arriving from the server (or the transport itself).
///
/// `Connect`/`Disconnect` are injected by the transport from its connection
/// lifecycle; the rest are parsed off the wire. `RecognitionResult` fields
/// are independent and either may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    Connect,
    Disconnect,
    Status {
        message: String,
    },
    Error {
        message: String,
    },
    RecognitionResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        translation: Option<String>,
    },
}
