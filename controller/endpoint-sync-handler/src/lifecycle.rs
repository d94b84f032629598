//! Lifecycle client trait and implementations
//!
//! Abandoning a lifecycle action releases the Auto Scaling Group's hold on a
//! terminating instance so the transition does not stall until the hook's
//! heartbeat timeout.

use crate::accelerator::build_http_client;
use crate::error::ClientError;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

pub const COMPLETE_LIFECYCLE_ACTION: &str = "CompleteLifecycleAction";

const API_VERSION: &str = "2011-01-01";
const ABANDON: &str = "ABANDON";

/// Lifecycle hook being released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleAction<'a> {
    pub lifecycle_hook_name: &'a str,
    pub auto_scaling_group_name: &'a str,
    pub instance_id: &'a str,
}

/// Result of a lifecycle call that reached the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleActionResponse {
    pub status: u16,
    pub message: Option<String>,
}

impl LifecycleActionResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Lifecycle client trait - implement this to integrate with a different scaling service
#[async_trait]
pub trait LifecycleClient: Send + Sync {
    /// Complete the pending lifecycle action with result ABANDON
    async fn abandon(
        &self,
        action: &LifecycleAction<'_>,
    ) -> Result<LifecycleActionResponse, ClientError>;
}

/// Log-only lifecycle client (used in dry-run mode or when no endpoint is configured)
pub struct LogOnlyLifecycleClient;

#[async_trait]
impl LifecycleClient for LogOnlyLifecycleClient {
    async fn abandon(
        &self,
        action: &LifecycleAction<'_>,
    ) -> Result<LifecycleActionResponse, ClientError> {
        info!(
            lifecycle_hook_name = %action.lifecycle_hook_name,
            auto_scaling_group_name = %action.auto_scaling_group_name,
            instance_id = %action.instance_id,
            "Lifecycle action abandon (log-only mode)"
        );
        Ok(LifecycleActionResponse {
            status: 200,
            message: None,
        })
    }
}

/// HTTP lifecycle client - POSTs query-protocol requests to the Auto Scaling API
pub struct HttpLifecycleClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpLifecycleClient {
    /// Create a new client with its own HTTP connection pool
    pub fn new(endpoint: String, timeout_secs: u64) -> Result<Self> {
        Ok(Self::with_client(endpoint, build_http_client(timeout_secs)?))
    }

    /// Create a client on top of an existing HTTP client
    pub fn with_client(endpoint: String, client: reqwest::Client) -> Self {
        Self { endpoint, client }
    }
}

#[async_trait]
impl LifecycleClient for HttpLifecycleClient {
    async fn abandon(
        &self,
        action: &LifecycleAction<'_>,
    ) -> Result<LifecycleActionResponse, ClientError> {
        let params = [
            ("Action", COMPLETE_LIFECYCLE_ACTION),
            ("Version", API_VERSION),
            ("LifecycleHookName", action.lifecycle_hook_name),
            ("AutoScalingGroupName", action.auto_scaling_group_name),
            ("LifecycleActionResult", ABANDON),
            ("InstanceId", action.instance_id),
        ];

        debug!(endpoint = %self.endpoint, "Calling Auto Scaling API");

        let response = self
            .client
            .post(&self.endpoint)
            .form(&params[..])
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                operation: COMPLETE_LIFECYCLE_ACTION,
                source,
            })?;

        let status = response.status().as_u16();
        if status == 200 {
            return Ok(LifecycleActionResponse {
                status,
                message: None,
            });
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unable to read body>".to_string());
        Ok(LifecycleActionResponse {
            status,
            message: Some(body),
        })
    }
}
