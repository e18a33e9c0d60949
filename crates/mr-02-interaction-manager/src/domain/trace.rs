//! Interaction traces, one per call attempt.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{iso_now, CallError, SecurityContext};

/// Characters of the payload's JSON rendering kept in a trace.
pub const PAYLOAD_SUMMARY_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    Pending,
    Success,
    Error,
}

/// Persisted record of one mediated call, stored under
/// `interaction.<source>.<target>.<stamp>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionTrace {
    pub status: TraceStatus,
    pub timestamp: String,
    pub source: String,
    pub target: String,
    pub payload_summary: Option<String>,
    pub security_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_time: Option<String>,
}

impl InteractionTrace {
    #[must_use]
    pub fn pending(source: &str, target: &str, payload: &Value, context: Option<&SecurityContext>) -> Self {
        Self {
            status: TraceStatus::Pending,
            timestamp: iso_now(),
            source: source.to_string(),
            target: target.to_string(),
            payload_summary: summarize(payload),
            security_level: context.map_or_else(|| "NONE".to_string(), |c| c.level.to_string()),
            completed_at: None,
            error: None,
            error_type: None,
            error_time: None,
        }
    }

    pub fn succeed(&mut self) {
        self.status = TraceStatus::Success;
        self.completed_at = Some(iso_now());
    }

    pub fn fail(&mut self, cause: &CallError) {
        self.status = TraceStatus::Error;
        self.error = Some(cause.to_string());
        self.error_type = Some(cause.kind().trace_code().to_string());
        self.error_time = Some(iso_now());
    }
}

fn summarize(payload: &Value) -> Option<String> {
    if payload.is_null() {
        return None;
    }
    Some(payload.to_string().chars().take(PAYLOAD_SUMMARY_CHARS).collect())
}
