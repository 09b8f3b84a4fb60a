//! Structured audit logging for acquisition runs.
//!
//! This module emits lifecycle events through the `tracing` crate under the
//! `patentbridge::audit` target. Any subscriber (JSON file, OpenTelemetry,
//! etc.) can capture them to reconstruct which resources were taken out of
//! rotation and which source answered each query.

mod events;

pub use events::{
    emit_batch_completed, emit_cascade_completed, emit_resource_quarantined,
    emit_resource_released, CascadeAuditEvent, CascadeKind, ResourceAuditEvent,
};
