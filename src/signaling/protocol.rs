//! Signaling wire protocol
//!
//! Every frame on the signaling WebSocket is a JSON object of the form
//! `{"type": ..., "payload": ...}`. Variants carrying fields require the
//! `payload` object to be present (it may be empty); variants without
//! fields omit it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Opaque per-connection identifier, generated server-side at accept time
pub type ConnectionId = Uuid;

/// Client-to-server message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Declare this connection the broadcaster
    #[serde(rename = "broadcaster")]
    Broadcaster {
        #[serde(default, rename = "streamName")]
        stream_name: Option<String>,
    },

    /// End the current broadcast (ignored unless sent by the broadcaster)
    #[serde(rename = "stop-broadcast")]
    StopBroadcast,

    /// Ask to watch the named stream
    #[serde(rename = "watcher")]
    Watcher {
        #[serde(default, rename = "streamName")]
        stream_name: Option<String>,
    },

    /// SDP offer for the named destination
    #[serde(rename = "offer")]
    Offer { to: ConnectionId, data: Value },

    /// SDP answer for the named destination
    #[serde(rename = "answer")]
    Answer { to: ConnectionId, data: Value },

    /// ICE candidate for the named destination
    #[serde(rename = "candidate")]
    Candidate { to: ConnectionId, data: Value },

    /// Broadcaster announces a finished recording
    #[serde(rename = "recording-ready")]
    RecordingReady {
        #[serde(default, rename = "outputUrl")]
        output_url: Option<String>,
    },
}

/// Server-to-client message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// A broadcaster is live
    #[serde(rename = "broadcaster")]
    Broadcaster {
        #[serde(rename = "streamName")]
        stream_name: Option<String>,
    },

    /// The live broadcast ended
    #[serde(rename = "broadcaster-stopped")]
    BroadcasterStopped,

    /// Watch request rejected: nothing to watch (or wrong stream name)
    #[serde(rename = "no-broadcaster")]
    NoBroadcaster,

    /// A watcher wants the stream; sent to the broadcaster only
    #[serde(rename = "watcher")]
    Watcher(ConnectionId),

    /// Relayed SDP offer; `from` is server-verified
    #[serde(rename = "offer")]
    Offer { from: ConnectionId, data: Value },

    /// Relayed SDP answer; `from` is server-verified
    #[serde(rename = "answer")]
    Answer { from: ConnectionId, data: Value },

    /// Relayed ICE candidate; `from` is server-verified
    #[serde(rename = "candidate")]
    Candidate { from: ConnectionId, data: Value },

    /// A watcher went away; sent to the broadcaster so it can release
    /// per-watcher resources
    #[serde(rename = "disconnectPeer")]
    DisconnectPeer(ConnectionId),

    /// A recording of the current stream is available
    #[serde(rename = "recording-ready")]
    RecordingReady {
        #[serde(rename = "outputUrl")]
        output_url: Option<String>,
        #[serde(rename = "streamName")]
        stream_name: Option<String>,
    },
}
