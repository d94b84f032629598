//! Endpoint group and lifecycle event types
//!
//! Wire names follow the accelerator control plane's JSON shapes so the same
//! types serve both the HTTP adapters and the reconciler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Endpoint as reported by describe/update responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescription {
    #[serde(rename = "EndpointId")]
    pub endpoint_id: String,
    #[serde(rename = "Weight")]
    pub weight: u8,
    #[serde(rename = "HealthState", default, skip_serializing_if = "Option::is_none")]
    pub health_state: Option<String>,
    #[serde(
        rename = "ClientIPPreservationEnabled",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_ip_preservation_enabled: Option<bool>,
}

/// Endpoint as submitted in an update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfiguration {
    #[serde(rename = "EndpointId")]
    pub endpoint_id: String,
    #[serde(rename = "Weight")]
    pub weight: u8,
    #[serde(
        rename = "ClientIPPreservationEnabled",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_ip_preservation_enabled: Option<bool>,
}

impl EndpointConfiguration {
    /// Carry an existing endpoint forward with its id and weight only
    pub fn carried_forward(description: &EndpointDescription) -> Self {
        Self {
            endpoint_id: description.endpoint_id.clone(),
            weight: description.weight,
            client_ip_preservation_enabled: None,
        }
    }
}

/// Snapshot of an endpoint group owned by the control plane
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointGroup {
    #[serde(rename = "EndpointGroupArn", default)]
    pub endpoint_group_arn: String,
    #[serde(rename = "EndpointDescriptions", default)]
    pub endpoint_descriptions: Vec<EndpointDescription>,
}

impl EndpointGroup {
    pub fn contains(&self, endpoint_id: &str) -> bool {
        self.endpoint_descriptions
            .iter()
            .any(|d| d.endpoint_id == endpoint_id)
    }
}

/// Kind of lifecycle transition an event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    InstanceLaunched,
    InstanceTerminating,
}

impl EventKind {
    pub const LAUNCH_DETAIL_TYPE: &'static str = "EC2 Instance Launch Successful";
    pub const TERMINATE_DETAIL_TYPE: &'static str = "EC2 Instance-terminate Lifecycle Action";

    /// Map an envelope `detail-type` onto a kind, `None` for anything else
    pub fn from_detail_type(detail_type: &str) -> Option<Self> {
        match detail_type {
            Self::LAUNCH_DETAIL_TYPE => Some(Self::InstanceLaunched),
            Self::TERMINATE_DETAIL_TYPE => Some(Self::InstanceTerminating),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InstanceLaunched => "instance_launched",
            Self::InstanceTerminating => "instance_terminating",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle transition, as extracted from an inbound envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    InstanceLaunched {
        instance_id: String,
        auto_scaling_group_name: String,
    },
    InstanceTerminating {
        instance_id: String,
        auto_scaling_group_name: String,
        lifecycle_hook_name: Option<String>,
    },
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::InstanceLaunched { .. } => EventKind::InstanceLaunched,
            Self::InstanceTerminating { .. } => EventKind::InstanceTerminating,
        }
    }

    pub fn instance_id(&self) -> &str {
        match self {
            Self::InstanceLaunched { instance_id, .. }
            | Self::InstanceTerminating { instance_id, .. } => instance_id,
        }
    }

    pub fn auto_scaling_group_name(&self) -> &str {
        match self {
            Self::InstanceLaunched {
                auto_scaling_group_name,
                ..
            }
            | Self::InstanceTerminating {
                auto_scaling_group_name,
                ..
            } => auto_scaling_group_name,
        }
    }
}
