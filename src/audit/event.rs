use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::db::models::{AuditActor, AuditLogEntry, AuditResource, Severity};

/// Builder for audit entries written by admin mutations.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    actor: AuditActor,
    action: String,
    resource: AuditResource,
    resource_id: Option<String>,
    severity: Severity,
    details: String,
    metadata: Option<Value>,
    ip: Option<String>,
    user_agent: Option<String>,
}

impl AuditEvent {
    pub fn new(actor: AuditActor, action: &str, resource: AuditResource) -> Self {
        AuditEvent {
            actor,
            action: action.to_string(),
            resource,
            resource_id: None,
            severity: Severity::Info,
            details: String::new(),
            metadata: None,
            ip: None,
            user_agent: None,
        }
    }

    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Captures the client address and user agent from request headers.
    pub fn client(mut self, headers: &HeaderMap) -> Self {
        self.ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        self.user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self
    }

    pub fn into_entry(self, at: DateTime<Utc>) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: at,
            actor: self.actor,
            action: self.action,
            resource: self.resource,
            resource_id: self.resource_id,
            severity: self.severity,
            details: self.details,
            metadata: self.metadata,
            ip: self.ip,
            user_agent: self.user_agent,
        }
    }
}
