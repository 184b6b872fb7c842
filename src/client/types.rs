//! Wire types for the generation service (schema v1).
//!
//! Request: `{"code": ..., "function_name_or_line": ...}`.
//! Response: `{"status": "pending" | "final" | "failed", "message"?, "payload"?}`.
//! Internal types stay Rust-native; `GenerationResult` is what the workflow sees.

use serde::{Deserialize, Serialize};

use super::error::ClientError;

/// The only wire schema version this client speaks.
pub const SCHEMA_VERSION: u32 = 1;

/// Body of the submit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Full document text.
    pub code: String,
    /// Extracted function name, or the raw trigger line when none could be extracted.
    pub function_name_or_line: String,
}

/// Status discriminator as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireStatus {
    Pending,
    Final,
    Failed,
}

/// Response body of both submit and poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireResponse {
    pub status: WireStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

// ── Results ──

/// Tri-state status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStatus {
    Pending,
    Success,
    Failure,
}

/// A decoded service response. Consumed once by the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub status: GenerationStatus,
    /// Generated test code; always present on `Success`.
    pub payload_text: Option<String>,
    /// Human-readable status line from the server, if any.
    pub message: Option<String>,
}

impl GenerationResult {
    pub fn pending(message: Option<String>) -> Self {
        Self {
            status: GenerationStatus::Pending,
            payload_text: None,
            message,
        }
    }

    pub fn success(payload: impl Into<String>) -> Self {
        Self {
            status: GenerationStatus::Success,
            payload_text: Some(payload.into()),
            message: None,
        }
    }

    pub fn failure(message: Option<String>) -> Self {
        Self {
            status: GenerationStatus::Failure,
            payload_text: None,
            message,
        }
    }
}

impl TryFrom<WireResponse> for GenerationResult {
    type Error = ClientError;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        match wire.status {
            WireStatus::Pending => Ok(Self::pending(wire.message)),
            WireStatus::Failed => Ok(Self::failure(wire.message)),
            WireStatus::Final => match wire.payload {
                Some(payload) => Ok(Self {
                    status: GenerationStatus::Success,
                    payload_text: Some(payload),
                    message: wire.message,
                }),
                None => Err(ClientError::MalformedResponse(
                    "final response without payload".into(),
                )),
            },
        }
    }
}

/// Decode a response body into a `GenerationResult`.
pub fn decode_response(body: &str) -> Result<GenerationResult, ClientError> {
    let wire: WireResponse = serde_json::from_str(body)
        .map_err(|e| ClientError::MalformedResponse(format!("failed to parse response: {e}")))?;
    wire.try_into()
}
