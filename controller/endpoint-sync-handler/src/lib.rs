//! Endpoint Sync Handler - keeps an accelerator endpoint group in step with an Auto Scaling Group
//!
//! Each Auto Scaling lifecycle event (instance launched, instance terminating)
//! is handled in a single stateless pass: describe the endpoint group, add or
//! remove the instance, write the new endpoint list back. When a termination
//! cannot be reconciled the pending lifecycle action is abandoned so the group
//! does not stall. Events arrive one at a time from the CLI or continuously
//! from NATS JetStream.

pub mod accelerator;
pub mod config;
pub mod consumer;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod model;
pub mod reconciler;

pub use accelerator::{DryRunEndpointGroupClient, EndpointGroupClient, HttpEndpointGroupClient};
pub use config::{Cli, Config, ConsumerConfig, ReconciliationConfig};
pub use consumer::LifecycleEventConsumer;
pub use controller::{Fallback, Invocation, ReconciliationController};
pub use dispatcher::{Dispatch, EventDispatcher};
pub use error::{ClientError, SyncError};
pub use lifecycle::{HttpLifecycleClient, LifecycleClient, LogOnlyLifecycleClient};
pub use metrics::Metrics;
pub use model::{EndpointConfiguration, EndpointDescription, EndpointGroup, LifecycleEvent};
pub use reconciler::reconcile_endpoints;
