//! Reconciliation controller - one lifecycle event, one pass
//!
//! Sequence per event: describe the endpoint group, compute the new endpoint
//! list, submit it. Any failure on a termination event releases the lifecycle
//! hook with ABANDON so the instance is not held until the hook times out. A
//! failed launch has no fallback: the instance simply stays unrouted.
//!
//! Nothing is retried here; re-driving an event is up to whatever delivered it.

use crate::accelerator::EndpointGroupClient;
use crate::config::ReconciliationConfig;
use crate::error::SyncError;
use crate::lifecycle::{LifecycleAction, LifecycleClient};
use crate::metrics::Metrics;
use crate::model::{EndpointDescription, EventKind, LifecycleEvent};
use crate::reconciler::reconcile_endpoints;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What happened to the lifecycle hook after a failed reconciliation
#[derive(Debug)]
pub enum Fallback {
    /// Reconciliation succeeded, or the event was a launch
    NotAttempted,
    Abandoned,
    Failed(SyncError),
}

/// Report for one handled event
#[derive(Debug)]
pub struct Invocation {
    pub kind: EventKind,
    pub instance_id: String,
    /// Endpoints reported by the control plane after the update
    pub result: Result<Vec<EndpointDescription>, SyncError>,
    pub fallback: Fallback,
}

impl Invocation {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// Outcome label used for metrics and logs
    pub fn outcome(&self) -> &'static str {
        match (&self.result, &self.fallback) {
            (Ok(_), _) => "succeeded",
            (Err(_), Fallback::NotAttempted) => "failed",
            (Err(_), Fallback::Abandoned) => "failed_hook_abandoned",
            (Err(_), Fallback::Failed(_)) => "failed_abandon_failed",
        }
    }
}

/// Orchestrates describe → reconcile → update → abandon-on-failure
pub struct ReconciliationController {
    config: Arc<ReconciliationConfig>,
    endpoint_groups: Arc<dyn EndpointGroupClient>,
    lifecycle: Arc<dyn LifecycleClient>,
    metrics: Metrics,
}

impl ReconciliationController {
    pub fn new(
        config: Arc<ReconciliationConfig>,
        endpoint_groups: Arc<dyn EndpointGroupClient>,
        lifecycle: Arc<dyn LifecycleClient>,
        metrics: Metrics,
    ) -> Self {
        Self {
            config,
            endpoint_groups,
            lifecycle,
            metrics,
        }
    }

    /// Handle one lifecycle event to completion
    pub async fn handle(&self, event: &LifecycleEvent) -> Invocation {
        let result = self.apply(event).await;

        let fallback = match (&result, event) {
            (Ok(endpoints), _) => {
                info!(
                    endpoint_group_arn = %self.config.endpoint_group_arn,
                    endpoint_count = endpoints.len(),
                    "The endpoint group has been updated"
                );
                Fallback::NotAttempted
            }
            (Err(e), LifecycleEvent::InstanceLaunched { .. }) => {
                error!(
                    instance_id = %event.instance_id(),
                    error = %e,
                    "Could not add instance to the endpoint group"
                );
                self.metrics.record_error(e.kind());
                Fallback::NotAttempted
            }
            (
                Err(e),
                LifecycleEvent::InstanceTerminating {
                    lifecycle_hook_name,
                    ..
                },
            ) => {
                error!(
                    instance_id = %event.instance_id(),
                    error = %e,
                    "Could not remove instance from the endpoint group, abandoning lifecycle action"
                );
                self.metrics.record_error(e.kind());
                self.abandon(event, lifecycle_hook_name.as_deref()).await
            }
        };

        let invocation = Invocation {
            kind: event.kind(),
            instance_id: event.instance_id().to_string(),
            result,
            fallback,
        };
        self.metrics
            .record_invocation(invocation.kind.as_str(), invocation.outcome());
        invocation
    }

    async fn apply(&self, event: &LifecycleEvent) -> Result<Vec<EndpointDescription>, SyncError> {
        let arn = &self.config.endpoint_group_arn;

        let current = self
            .endpoint_groups
            .describe(arn)
            .await
            .map_err(|source| SyncError::DescribeFailure { source })?;
        let healthy_count = current
            .endpoint_descriptions
            .iter()
            .filter(|e| e.health_state.as_deref() == Some("HEALTHY"))
            .count();
        debug!(
            endpoint_group_arn = %arn,
            current_count = current.endpoint_descriptions.len(),
            healthy_count,
            "Fetched endpoint group"
        );
        for endpoint in &current.endpoint_descriptions {
            debug!(
                endpoint_id = %endpoint.endpoint_id,
                weight = endpoint.weight,
                health_state = endpoint.health_state.as_deref().unwrap_or("UNKNOWN"),
                "Current endpoint"
            );
        }

        let endpoints = reconcile_endpoints(&current, event, &self.config)?;
        if event.kind() == EventKind::InstanceTerminating && !current.contains(event.instance_id())
        {
            debug!(
                instance_id = %event.instance_id(),
                "Instance not in endpoint group, submitting unchanged set"
            );
        }

        let response = self
            .endpoint_groups
            .update(arn, &endpoints)
            .await
            .map_err(|source| SyncError::UpdateFailure { source })?;
        self.metrics
            .record_update(response.is_success(), endpoints.len());

        if !response.is_success() {
            warn!(
                status = response.status,
                message = response.message.as_deref().unwrap_or(""),
                "Endpoint group update rejected"
            );
            return Err(SyncError::UpdateRejected {
                status: response.status,
            });
        }

        Ok(response.updated_endpoints())
    }

    async fn abandon(&self, event: &LifecycleEvent, lifecycle_hook_name: Option<&str>) -> Fallback {
        let auto_scaling_group_name = event.auto_scaling_group_name();

        let Some(lifecycle_hook_name) = lifecycle_hook_name else {
            error!(
                instance_id = %event.instance_id(),
                "Lifecycle hook could not be abandoned: event has no LifecycleHookName"
            );
            self.metrics.record_abandon(false, auto_scaling_group_name);
            return Fallback::Failed(SyncError::AbandonFailure {
                reason: "event has no lifecycle hook name".to_string(),
            });
        };

        let action = LifecycleAction {
            lifecycle_hook_name,
            auto_scaling_group_name,
            instance_id: event.instance_id(),
        };

        let failure = match self.lifecycle.abandon(&action).await {
            Ok(response) if response.is_success() => {
                info!(
                    lifecycle_hook_name = %lifecycle_hook_name,
                    auto_scaling_group_name = %auto_scaling_group_name,
                    instance_id = %event.instance_id(),
                    "Lifecycle hook abandoned correctly"
                );
                self.metrics.record_abandon(true, auto_scaling_group_name);
                return Fallback::Abandoned;
            }
            Ok(response) => format!(
                "status {}: {}",
                response.status,
                response.message.unwrap_or_default()
            ),
            Err(e) => e.to_string(),
        };

        error!(
            lifecycle_hook_name = %lifecycle_hook_name,
            auto_scaling_group_name = %auto_scaling_group_name,
            instance_id = %event.instance_id(),
            error = %failure,
            "Lifecycle hook could not be abandoned"
        );
        self.metrics.record_abandon(false, auto_scaling_group_name);
        Fallback::Failed(SyncError::AbandonFailure { reason: failure })
    }
}
