//! Endpoint set reconciliation
//!
//! Computes the endpoint configuration to submit for one lifecycle event from
//! a freshly described endpoint group. Pure: no I/O, no state.
//!
//! Launches append without checking for an existing entry, so a re-delivered
//! launch against an already-updated group produces a duplicate id and the
//! control plane's own uniqueness check is the backstop. Terminations filter
//! by id and are a no-op when the instance is already gone.

use crate::config::ReconciliationConfig;
use crate::error::SyncError;
use crate::model::{EndpointConfiguration, EndpointGroup, LifecycleEvent};

/// Compute the endpoint list to submit for `event`
pub fn reconcile_endpoints(
    current: &EndpointGroup,
    event: &LifecycleEvent,
    config: &ReconciliationConfig,
) -> Result<Vec<EndpointConfiguration>, SyncError> {
    let instance_id = event.instance_id();

    match event {
        LifecycleEvent::InstanceLaunched { .. } => {
            if instance_id.is_empty() {
                return Err(SyncError::invalid_event("launch event has no instance id"));
            }

            let mut endpoints: Vec<EndpointConfiguration> = current
                .endpoint_descriptions
                .iter()
                .map(EndpointConfiguration::carried_forward)
                .collect();
            endpoints.push(EndpointConfiguration {
                endpoint_id: instance_id.to_string(),
                weight: config.endpoint_weight,
                client_ip_preservation_enabled: Some(config.client_ip_preservation),
            });
            Ok(endpoints)
        }
        LifecycleEvent::InstanceTerminating { .. } => Ok(current
            .endpoint_descriptions
            .iter()
            .filter(|d| d.endpoint_id != instance_id)
            .map(EndpointConfiguration::carried_forward)
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EndpointDescription;

    fn group(endpoints: &[(&str, u8)]) -> EndpointGroup {
        EndpointGroup {
            endpoint_group_arn: "arn:group".to_string(),
            endpoint_descriptions: endpoints
                .iter()
                .map(|(id, weight)| EndpointDescription {
                    endpoint_id: id.to_string(),
                    weight: *weight,
                    health_state: Some("HEALTHY".to_string()),
                    client_ip_preservation_enabled: Some(true),
                })
                .collect(),
        }
    }

    fn launch(instance_id: &str) -> LifecycleEvent {
        LifecycleEvent::InstanceLaunched {
            instance_id: instance_id.to_string(),
            auto_scaling_group_name: "web-asg".to_string(),
        }
    }

    fn terminate(instance_id: &str) -> LifecycleEvent {
        LifecycleEvent::InstanceTerminating {
            instance_id: instance_id.to_string(),
            auto_scaling_group_name: "web-asg".to_string(),
            lifecycle_hook_name: Some("terminate-hook".to_string()),
        }
    }

    fn carried(id: &str, weight: u8) -> EndpointConfiguration {
        EndpointConfiguration {
            endpoint_id: id.to_string(),
            weight,
            client_ip_preservation_enabled: None,
        }
    }

    fn ids(endpoints: &[EndpointConfiguration]) -> Vec<&str> {
        endpoints.iter().map(|e| e.endpoint_id.as_str()).collect()
    }

    #[test]
    fn test_launch_appends_configured_endpoint() {
        let config = ReconciliationConfig::new("arn:group").with_endpoint_weight(64);
        let output = reconcile_endpoints(&group(&[("i-1", 128)]), &launch("i-2"), &config).unwrap();

        assert_eq!(
            output,
            vec![
                carried("i-1", 128),
                EndpointConfiguration {
                    endpoint_id: "i-2".to_string(),
                    weight: 64,
                    client_ip_preservation_enabled: Some(true),
                },
            ]
        );
    }

    #[test]
    fn test_launch_grows_set_by_one() {
        let config = ReconciliationConfig::new("arn:group");
        let snapshots = [
            group(&[]),
            group(&[("i-1", 10)]),
            group(&[("i-1", 10), ("i-2", 20), ("i-3", 255)]),
        ];

        for current in &snapshots {
            let output = reconcile_endpoints(current, &launch("i-new"), &config).unwrap();
            assert_eq!(output.len(), current.endpoint_descriptions.len() + 1);
            assert_eq!(output.last().unwrap().endpoint_id, "i-new");
            assert_eq!(output.last().unwrap().weight, 128);
        }
    }

    #[test]
    fn test_launch_uses_configured_preservation() {
        let config = ReconciliationConfig::new("arn:group").with_client_ip_preservation(false);
        let output = reconcile_endpoints(&group(&[("i-1", 1)]), &launch("i-2"), &config).unwrap();

        assert_eq!(output[0].client_ip_preservation_enabled, None);
        assert_eq!(output[1].client_ip_preservation_enabled, Some(false));
    }

    #[test]
    fn test_launch_without_instance_id_is_invalid() {
        let config = ReconciliationConfig::new("arn:group");
        let err = reconcile_endpoints(&group(&[("i-1", 128)]), &launch(""), &config).unwrap_err();
        assert!(matches!(err, SyncError::InvalidEvent { .. }));
    }

    #[test]
    fn test_repeated_launch_adds_duplicate() {
        let config = ReconciliationConfig::new("arn:group");
        let output =
            reconcile_endpoints(&group(&[("i-1", 128), ("i-2", 128)]), &launch("i-2"), &config)
                .unwrap();

        assert_eq!(ids(&output), vec!["i-1", "i-2", "i-2"]);
    }

    #[test]
    fn test_terminate_removes_instance() {
        let config = ReconciliationConfig::new("arn:group");
        let output =
            reconcile_endpoints(&group(&[("i-1", 128), ("i-2", 128)]), &terminate("i-1"), &config)
                .unwrap();

        assert_eq!(output, vec![carried("i-2", 128)]);
    }

    #[test]
    fn test_terminate_removes_every_matching_entry() {
        let config = ReconciliationConfig::new("arn:group");
        let output = reconcile_endpoints(
            &group(&[("i-1", 1), ("i-2", 2), ("i-1", 3)]),
            &terminate("i-1"),
            &config,
        )
        .unwrap();

        assert_eq!(ids(&output), vec!["i-2"]);
    }

    #[test]
    fn test_terminate_unknown_instance_is_noop() {
        let config = ReconciliationConfig::new("arn:group");
        let current = group(&[("i-1", 100), ("i-2", 50)]);
        let output = reconcile_endpoints(&current, &terminate("i-9"), &config).unwrap();

        assert_eq!(output, vec![carried("i-1", 100), carried("i-2", 50)]);
    }

    #[test]
    fn test_terminate_is_idempotent_against_updated_group() {
        let config = ReconciliationConfig::new("arn:group");
        let first =
            reconcile_endpoints(&group(&[("i-1", 100), ("i-2", 50)]), &terminate("i-1"), &config)
                .unwrap();

        let updated = EndpointGroup {
            endpoint_group_arn: "arn:group".to_string(),
            endpoint_descriptions: first
                .iter()
                .map(|e| EndpointDescription {
                    endpoint_id: e.endpoint_id.clone(),
                    weight: e.weight,
                    health_state: None,
                    client_ip_preservation_enabled: None,
                })
                .collect(),
        };
        let second = reconcile_endpoints(&updated, &terminate("i-1"), &config).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_same_event_same_snapshot_is_deterministic() {
        let config = ReconciliationConfig::new("arn:group").with_endpoint_weight(7);
        let current = group(&[("i-1", 128)]);

        assert_eq!(
            reconcile_endpoints(&current, &launch("i-2"), &config).unwrap(),
            reconcile_endpoints(&current, &launch("i-2"), &config).unwrap()
        );
    }
}
