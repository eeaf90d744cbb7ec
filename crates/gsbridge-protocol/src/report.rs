//! JSON messages sent from the bridge to the host.

use serde::Serialize;

use crate::error::CodecError;
use crate::message::{unpack, HealthReport, Message, StatusReport};

/// One bridge-to-host message, serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Outbound {
    #[serde(rename = "SR")]
    StatusReport(StatusReport),
    #[serde(rename = "HR")]
    HealthReport(HealthReport),
    /// Ack word; layout not settled, so the raw value goes through as a decimal string.
    #[serde(rename = "A")]
    Ack { raw_u64: String },
    #[serde(rename = "HPR")]
    HighPriorityReport { raw_u64: String },
    #[serde(rename = "ERR")]
    Error { msg: String },
}

impl Outbound {
    /// Map a word decoded from the serial line to the message for the host.
    ///
    /// Host-to-device types and unknown types have nothing to forward.
    pub fn from_word(word: u64) -> Result<Option<Self>, CodecError> {
        Ok(match unpack(word)? {
            Message::StatusReport(sr) => Some(Self::StatusReport(sr)),
            Message::HealthReport(hr) => Some(Self::HealthReport(hr)),
            Message::Ack(raw) => Some(Self::Ack {
                raw_u64: raw.to_string(),
            }),
            Message::HighPriorityReport(raw) => Some(Self::HighPriorityReport {
                raw_u64: raw.to_string(),
            }),
            Message::Control(_) | Message::Pose(_) | Message::System(_) | Message::Query(_) => {
                None
            }
        })
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error { msg: msg.into() }
    }

    /// Envelope body bytes.
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize outbound message");
            br#"{"type":"ERR","msg":"internal"}"#.to_vec()
        })
    }
}
