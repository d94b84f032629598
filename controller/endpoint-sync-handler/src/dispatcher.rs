//! Inbound event envelope parsing and dispatch
//!
//! Envelopes look like scheduled-event bus deliveries:
//!
//! ```text
//! {"detail-type": "...",
//!  "detail": {"EC2InstanceId": ..., "AutoScalingGroupName": ..., "LifecycleHookName": ...}}
//! ```
//!
//! A `detail` without `AutoScalingGroupName` is not a lifecycle message and is
//! dropped before any control-plane call.

use crate::controller::{Invocation, ReconciliationController};
use crate::error::SyncError;
use crate::metrics::Metrics;
use crate::model::{EventKind, LifecycleEvent};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    pub detail: EventDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventDetail {
    #[serde(rename = "EC2InstanceId", default)]
    pub ec2_instance_id: Option<String>,
    #[serde(rename = "AutoScalingGroupName", default)]
    pub auto_scaling_group_name: Option<String>,
    #[serde(rename = "LifecycleHookName", default)]
    pub lifecycle_hook_name: Option<String>,
}

impl EventEnvelope {
    pub fn from_slice(payload: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(payload)
            .map_err(|e| SyncError::invalid_event(format!("malformed envelope: {}", e)))
    }

    /// Extract the lifecycle event; `Ok(None)` when this is not a lifecycle message
    pub fn lifecycle_event(&self) -> Result<Option<LifecycleEvent>, SyncError> {
        let Some(auto_scaling_group_name) = self.detail.auto_scaling_group_name.clone() else {
            return Ok(None);
        };

        let kind = EventKind::from_detail_type(&self.detail_type).ok_or_else(|| {
            SyncError::invalid_event(format!("unsupported detail-type '{}'", self.detail_type))
        })?;
        let instance_id = self
            .detail
            .ec2_instance_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SyncError::invalid_event("detail has no EC2InstanceId"))?;

        Ok(Some(match kind {
            EventKind::InstanceLaunched => LifecycleEvent::InstanceLaunched {
                instance_id,
                auto_scaling_group_name,
            },
            EventKind::InstanceTerminating => LifecycleEvent::InstanceTerminating {
                instance_id,
                auto_scaling_group_name,
                lifecycle_hook_name: self.detail.lifecycle_hook_name.clone(),
            },
        }))
    }
}

/// What the dispatcher did with one envelope
#[derive(Debug)]
pub enum Dispatch {
    /// No `AutoScalingGroupName`: nothing was called
    NotLifecycle,
    /// Malformed or unsupported envelope: nothing was called
    Invalid(SyncError),
    Handled(Invocation),
}

impl Dispatch {
    /// True unless the envelope was invalid or the reconciliation failed
    pub fn is_success(&self) -> bool {
        match self {
            Dispatch::NotLifecycle => true,
            Dispatch::Invalid(_) => false,
            Dispatch::Handled(invocation) => invocation.succeeded(),
        }
    }
}

/// Turns inbound envelopes into controller invocations
pub struct EventDispatcher {
    controller: ReconciliationController,
    metrics: Metrics,
}

impl EventDispatcher {
    pub fn new(controller: ReconciliationController, metrics: Metrics) -> Self {
        Self {
            controller,
            metrics,
        }
    }

    /// Dispatch a raw JSON payload
    pub async fn dispatch_bytes(&self, payload: &[u8]) -> Dispatch {
        debug!(payload = %String::from_utf8_lossy(payload), "Received event");

        match EventEnvelope::from_slice(payload) {
            Ok(envelope) => self.dispatch(&envelope).await,
            Err(e) => {
                error!(error = %e, "No valid JSON message");
                self.metrics.record_error(e.kind());
                Dispatch::Invalid(e)
            }
        }
    }

    /// Dispatch a parsed envelope
    pub async fn dispatch(&self, envelope: &EventEnvelope) -> Dispatch {
        let span = info_span!(
            "invocation",
            invocation_id = %Uuid::new_v4(),
            event_id = envelope.id.as_deref().unwrap_or(""),
            detail_type = %envelope.detail_type,
        );

        async {
            debug!(
                source = envelope.source.as_deref().unwrap_or(""),
                time = ?envelope.time,
                "Dispatching event"
            );

            let event = match envelope.lifecycle_event() {
                Ok(Some(event)) => event,
                Ok(None) => {
                    error!(
                        detail_type = %envelope.detail_type,
                        "No valid lifecycle message: detail has no AutoScalingGroupName"
                    );
                    self.metrics.record_error("not_lifecycle");
                    return Dispatch::NotLifecycle;
                }
                Err(e) => {
                    error!(error = %e, "Rejected event");
                    self.metrics.record_error(e.kind());
                    return Dispatch::Invalid(e);
                }
            };

            Dispatch::Handled(self.controller.handle(&event).await)
        }
        .instrument(span)
        .await
    }
}
