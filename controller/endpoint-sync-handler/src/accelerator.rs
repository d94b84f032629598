//! Endpoint group client trait and implementations
//!
//! The HTTP implementation speaks the accelerator control plane's JSON 1.1
//! protocol against a configurable URL. Request signing is expected to happen
//! in front of that URL. The dry-run implementation reads through a real
//! client and only logs writes.

use crate::error::ClientError;
use crate::model::{EndpointConfiguration, EndpointDescription, EndpointGroup};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DESCRIBE_ENDPOINT_GROUP: &str = "DescribeEndpointGroup";
pub const UPDATE_ENDPOINT_GROUP: &str = "UpdateEndpointGroup";

const TARGET_PREFIX: &str = "GlobalAccelerator_V20180706";
const AMZ_JSON: &str = "application/x-amz-json-1.1";
const AMZ_TARGET: &str = "X-Amz-Target";

/// Result of an update call that reached the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResponse {
    pub status: u16,
    pub endpoint_group: Option<EndpointGroup>,
    pub message: Option<String>,
}

impl UpdateResponse {
    /// Only a 200 counts as an applied update
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn updated_endpoints(&self) -> Vec<EndpointDescription> {
        self.endpoint_group
            .as_ref()
            .map(|g| g.endpoint_descriptions.clone())
            .unwrap_or_default()
    }
}

/// Endpoint group client trait - implement this to talk to a different control plane
///
/// There is no conditional write: two concurrent read-modify-write cycles can
/// lose an update. A version-checked `update` would belong here.
#[async_trait]
pub trait EndpointGroupClient: Send + Sync {
    /// Read the current endpoint set
    async fn describe(&self, endpoint_group_arn: &str) -> Result<EndpointGroup, ClientError>;

    /// Replace the endpoint set
    async fn update(
        &self,
        endpoint_group_arn: &str,
        endpoints: &[EndpointConfiguration],
    ) -> Result<UpdateResponse, ClientError>;
}

/// Build the HTTP client shared by the control-plane adapters
pub fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

#[derive(Debug, Serialize)]
struct DescribeEndpointGroupRequest<'a> {
    #[serde(rename = "EndpointGroupArn")]
    endpoint_group_arn: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateEndpointGroupRequest<'a> {
    #[serde(rename = "EndpointGroupArn")]
    endpoint_group_arn: &'a str,
    #[serde(rename = "EndpointConfigurations")]
    endpoint_configurations: &'a [EndpointConfiguration],
}

#[derive(Debug, Deserialize)]
struct EndpointGroupResponse {
    #[serde(rename = "EndpointGroup")]
    endpoint_group: EndpointGroup,
}

/// HTTP endpoint group client - POSTs JSON 1.1 requests to the accelerator API
pub struct HttpEndpointGroupClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpEndpointGroupClient {
    /// Create a new client with its own HTTP connection pool
    pub fn new(endpoint: String, timeout_secs: u64) -> Result<Self> {
        Ok(Self::with_client(endpoint, build_http_client(timeout_secs)?))
    }

    /// Create a client on top of an existing HTTP client
    pub fn with_client(endpoint: String, client: reqwest::Client) -> Self {
        Self { endpoint, client }
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        body: &B,
    ) -> Result<(u16, String), ClientError> {
        debug!(endpoint = %self.endpoint, operation, "Calling accelerator API");

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, AMZ_JSON)
            .header(AMZ_TARGET, format!("{}.{}", TARGET_PREFIX, operation))
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;
        Ok((status, text))
    }
}

#[async_trait]
impl EndpointGroupClient for HttpEndpointGroupClient {
    async fn describe(&self, endpoint_group_arn: &str) -> Result<EndpointGroup, ClientError> {
        let request = DescribeEndpointGroupRequest { endpoint_group_arn };
        let (status, body) = self.call(DESCRIBE_ENDPOINT_GROUP, &request).await?;

        if status != 200 {
            return Err(ClientError::Rejected {
                operation: DESCRIBE_ENDPOINT_GROUP,
                status,
                body,
            });
        }

        let parsed: EndpointGroupResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse {
                operation: DESCRIBE_ENDPOINT_GROUP,
                message: e.to_string(),
            })?;
        Ok(parsed.endpoint_group)
    }

    async fn update(
        &self,
        endpoint_group_arn: &str,
        endpoints: &[EndpointConfiguration],
    ) -> Result<UpdateResponse, ClientError> {
        let request = UpdateEndpointGroupRequest {
            endpoint_group_arn,
            endpoint_configurations: endpoints,
        };
        let (status, body) = self.call(UPDATE_ENDPOINT_GROUP, &request).await?;

        if status != 200 {
            return Ok(UpdateResponse {
                status,
                endpoint_group: None,
                message: Some(body),
            });
        }

        // The write was accepted; an unreadable body does not undo it
        let endpoint_group = match serde_json::from_str::<EndpointGroupResponse>(&body) {
            Ok(parsed) => Some(parsed.endpoint_group),
            Err(e) => {
                warn!(error = %e, "Could not decode UpdateEndpointGroup response body");
                None
            }
        };

        Ok(UpdateResponse {
            status,
            endpoint_group,
            message: None,
        })
    }
}

/// Dry-run endpoint group client - reads through `inner`, logs updates instead of sending them
pub struct DryRunEndpointGroupClient<C: EndpointGroupClient> {
    inner: C,
}

impl<C: EndpointGroupClient> DryRunEndpointGroupClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: EndpointGroupClient> EndpointGroupClient for DryRunEndpointGroupClient<C> {
    async fn describe(&self, endpoint_group_arn: &str) -> Result<EndpointGroup, ClientError> {
        self.inner.describe(endpoint_group_arn).await
    }

    async fn update(
        &self,
        endpoint_group_arn: &str,
        endpoints: &[EndpointConfiguration],
    ) -> Result<UpdateResponse, ClientError> {
        let ids: Vec<&str> = endpoints.iter().map(|e| e.endpoint_id.as_str()).collect();
        info!(
            endpoint_group_arn = %endpoint_group_arn,
            endpoints = ?ids,
            "Endpoint group update (dry-run mode)"
        );

        Ok(UpdateResponse {
            status: 200,
            endpoint_group: Some(EndpointGroup {
                endpoint_group_arn: endpoint_group_arn.to_string(),
                endpoint_descriptions: endpoints
                    .iter()
                    .map(|e| EndpointDescription {
                        endpoint_id: e.endpoint_id.clone(),
                        weight: e.weight,
                        health_state: None,
                        client_ip_preservation_enabled: e.client_ip_preservation_enabled,
                    })
                    .collect(),
            }),
            message: None,
        })
    }
}
