//! Audit event types and emission functions.

use crate::core::{CascadeOutcome, Resource, ResourceKind, Termination};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which kind of cascade an audit event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeKind {
    /// A search for a logical query.
    Search,
    /// A detail lookup for one primary identifier.
    Detail,
}

impl CascadeKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Detail => "detail",
        }
    }
}

/// Audit event for a completed cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeAuditEvent {
    /// Event type.
    pub event_type: String,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Unique cascade ID.
    pub cascade_id: String,

    /// Search or detail.
    pub kind: CascadeKind,

    /// The query or parent identifier.
    pub query: String,

    /// How the cascade ended.
    pub termination: String,

    /// Strategy that produced the identifiers, if any.
    pub winning_strategy: Option<String>,

    /// Strategies tried, in order.
    pub strategies: Vec<String>,

    /// Number of identifiers found.
    pub identifier_count: usize,

    /// Requests sent across all strategies.
    pub request_count: u32,

    /// Healthy resources when the cascade ended.
    pub healthy_resources: usize,

    /// Cascade duration in milliseconds.
    pub duration_ms: u64,
}

impl CascadeAuditEvent {
    /// Builds the event for a finished cascade.
    pub fn new(outcome: &CascadeOutcome, kind: CascadeKind) -> Self {
        let termination = match &outcome.termination {
            Termination::Found { .. } => "found",
            Termination::NothingFound => "nothing_found",
            Termination::PoolExhausted => "pool_exhausted",
        };

        Self {
            event_type: format!("{}_completed", kind.as_str()),
            timestamp: outcome.completed_at,
            cascade_id: outcome.id.clone(),
            kind,
            query: outcome.query.clone(),
            termination: termination.to_string(),
            winning_strategy: outcome.winning_strategy().map(str::to_string),
            strategies: outcome
                .attempted_strategies()
                .into_iter()
                .map(str::to_string)
                .collect(),
            identifier_count: outcome.len(),
            request_count: outcome.request_count(),
            healthy_resources: outcome.pool_status.healthy,
            duration_ms: outcome.duration.as_millis() as u64,
        }
    }
}

/// Audit event for a resource entering or leaving quarantine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAuditEvent {
    /// Event type.
    pub event_type: String,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Redacted resource label.
    pub resource: String,

    /// Proxy or credential.
    pub kind: ResourceKind,

    /// Consecutive failures at the time of the event.
    pub consecutive_failures: u32,

    /// Quarantine length in milliseconds, for quarantine events.
    pub quarantine_ms: Option<u64>,
}

/// Emits an audit event for a resource being quarantined.
pub fn emit_resource_quarantined(resource: &Resource, consecutive_failures: u32, duration: Duration) {
    let event = ResourceAuditEvent::quarantined(resource, consecutive_failures, duration);

    tracing::warn!(
        target: "patentbridge::audit",
        event_type = %event.event_type,
        resource = %event.resource,
        kind = ?event.kind,
        consecutive_failures = event.consecutive_failures,
        quarantine_ms = ?event.quarantine_ms,
        "Resource quarantined"
    );
}

/// Emits an audit event for a resource whose quarantine window elapsed.
pub fn emit_resource_released(resource: &Resource) {
    let event = ResourceAuditEvent::released(resource);

    tracing::info!(
        target: "patentbridge::audit",
        event_type = %event.event_type,
        resource = %event.resource,
        kind = ?event.kind,
        "Resource released from quarantine"
    );
}

/// Emits an audit event for a completed cascade.
pub fn emit_cascade_completed(outcome: &CascadeOutcome, kind: CascadeKind) {
    let event = CascadeAuditEvent::new(outcome, kind);

    tracing::info!(
        target: "patentbridge::audit",
        event_type = %event.event_type,
        cascade_id = %event.cascade_id,
        query = %event.query,
        termination = %event.termination,
        winning_strategy = ?event.winning_strategy,
        strategies = ?event.strategies,
        identifier_count = event.identifier_count,
        request_count = event.request_count,
        healthy_resources = event.healthy_resources,
        duration_ms = event.duration_ms,
        "Cascade completed"
    );
}

/// Emits an audit event for a completed batch search.
pub fn emit_batch_completed(
    batch_id: &str,
    subject: &str,
    queries: usize,
    primary: usize,
    derived: usize,
    duration: Duration,
) {
    tracing::info!(
        target: "patentbridge::audit",
        event_type = "batch_completed",
        batch_id = %batch_id,
        subject = %subject,
        queries,
        primary,
        derived,
        duration_ms = duration.as_millis() as u64,
        "Batch search completed"
    );
}

impl ResourceAuditEvent {
    /// Builds a quarantine event.
    pub fn quarantined(resource: &Resource, consecutive_failures: u32, duration: Duration) -> Self {
        Self {
            event_type: "resource_quarantined".to_string(),
            timestamp: Utc::now(),
            resource: resource.label(),
            kind: resource.kind(),
            consecutive_failures,
            quarantine_ms: Some(duration.as_millis() as u64),
        }
    }

    /// Builds a release event.
    pub fn released(resource: &Resource) -> Self {
        Self {
            event_type: "resource_released".to_string(),
            timestamp: Utc::now(),
            resource: resource.label(),
            kind: resource.kind(),
            consecutive_failures: 0,
            quarantine_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Identifier, StrategyOutcome, StrategyReport};
    use crate::pool::PoolStatus;
    use std::collections::BTreeSet;

    #[test]
    fn test_cascade_event_from_outcome() {
        let ids: BTreeSet<_> = [Identifier::new("WO2016162604", "lens")].into_iter().collect();
        let outcome = CascadeOutcome::new(
            "aspirin patent",
            ids,
            vec![StrategyReport {
                strategy: "lens".into(),
                outcome: StrategyOutcome::Found { count: 1 },
                attempts: 2,
                requests: 2,
                duration: Duration::from_millis(40),
            }],
            PoolStatus {
                total: 2,
                healthy: 2,
                ..PoolStatus::default()
            },
            Utc::now(),
            Duration::from_millis(40),
        );

        let event = CascadeAuditEvent::new(&outcome, CascadeKind::Search);
        assert_eq!(event.event_type, "search_completed");
        assert_eq!(event.termination, "found");
        assert_eq!(event.winning_strategy.as_deref(), Some("lens"));
        assert_eq!(event.request_count, 2);
        assert_eq!(event.duration_ms, 40);
    }

    #[test]
    fn test_resource_event_is_redacted() {
        let key = Resource::credential("serpapi", "bc20bca64032a7ac");
        let event = ResourceAuditEvent::quarantined(&key, 3, Duration::from_secs(300));

        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("bc20bca64032a7ac"));
        assert_eq!(event.quarantine_ms, Some(300_000));

        let released = ResourceAuditEvent::released(&key);
        assert_eq!(released.event_type, "resource_released");
        assert!(released.quarantine_ms.is_none());
    }
}
