//! Audit event sink.
//!
//! Services append events through the narrow [`AuditSink`] interface; what
//! happens to them (log shipping, SIEM, nothing) is the deployment's
//! business. Events never carry secrets or token values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// A user passed authentication.
    Login,
    /// An access token was issued.
    TokenIssued,
    /// A token was revoked.
    TokenRevoked,
    /// The signing key was rotated.
    KeyRotated,
}

impl AuditKind {
    /// Stable string form for log output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::TokenIssued => "token_issued",
            Self::TokenRevoked => "token_revoked",
            Self::KeyRotated => "key_rotated",
        }
    }
}

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When it happened.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,

    /// What happened.
    pub kind: AuditKind,

    /// The client involved, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// The user involved, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Free-form detail. Never a secret or token value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(kind: AuditKind) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            kind,
            client_id: None,
            user_id: None,
            detail: None,
        }
    }

    /// Attaches the client id.
    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Attaches the user id.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attaches free-form detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Receives audit events. Append must not fail the calling operation;
/// sinks swallow their own errors.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one event.
    async fn append(&self, event: AuditEvent);
}

/// Sink that emits events as structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn append(&self, event: AuditEvent) {
        info!(
            kind = event.kind.as_str(),
            client_id = event.client_id.as_deref().unwrap_or("-"),
            user_id = event.user_id.as_deref().unwrap_or("-"),
            detail = event.detail.as_deref().unwrap_or(""),
            "audit"
        );
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = AuditEvent::new(AuditKind::TokenIssued)
            .with_client("app")
            .with_user("u-1")
            .with_detail("authorization_code");
        assert_eq!(event.kind, AuditKind::TokenIssued);
        assert_eq!(event.client_id.as_deref(), Some("app"));
        assert_eq!(event.user_id.as_deref(), Some("u-1"));
    }

    #[tokio::test]
    async fn test_recording_sink_collects() {
        let sink = RecordingSink::new();
        sink.append(AuditEvent::new(AuditKind::Login)).await;
        sink.append(AuditEvent::new(AuditKind::TokenRevoked)).await;
        let events = sink.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, AuditKind::Login);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&AuditKind::TokenIssued).unwrap();
        assert_eq!(json, "\"token_issued\"");
    }
}
