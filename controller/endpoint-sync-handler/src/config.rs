//! Configuration for the endpoint sync handler

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_ACCELERATOR_ENDPOINT: &str =
    "https://globalaccelerator.us-west-2.amazonaws.com";

/// Command line for the endpoint sync handler binary
#[derive(Debug, Clone, Parser)]
#[command(name = "endpoint-sync-handler", version)]
#[command(
    about = "Keeps an accelerator endpoint group in sync with Auto Scaling lifecycle events"
)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub mode: Mode,
}

impl Cli {
    /// Parse configuration from command-line args and environment variables
    pub fn parse_cli() -> Self {
        Cli::parse()
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Mode {
    /// Handle a single lifecycle event envelope and exit
    Handle {
        /// Path to the event JSON (reads stdin when omitted)
        #[arg(long, value_name = "FILE")]
        event: Option<PathBuf>,
    },
    /// Consume lifecycle events from NATS JetStream
    Consume(ConsumerConfig),
}

/// Process-wide settings shared by every invocation
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Endpoint group to keep in sync
    #[arg(long, env = "EndpointGroupARN")]
    pub endpoint_group_arn: String,

    /// Weight for newly added endpoints (0-255, anything else means 128)
    #[arg(long, env = "EndpointWeight")]
    pub endpoint_weight: Option<String>,

    /// Enable client IP preservation on newly added endpoints (true/yes/on/1, any case)
    #[arg(
        long,
        env = "ClientIpPreservation",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub client_ip_preservation: bool,

    /// Accelerator control-plane URL
    #[arg(long, env, default_value = DEFAULT_ACCELERATOR_ENDPOINT)]
    pub accelerator_endpoint: String,

    /// Auto Scaling control-plane URL (lifecycle abandons are only logged when unset)
    #[arg(long, env)]
    pub autoscaling_endpoint: Option<String>,

    /// Control-plane request timeout in seconds
    #[arg(long, env, default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// Dry-run mode (read the endpoint group, log writes instead of sending them)
    #[arg(long, env)]
    pub dry_run: bool,

    /// Output logs in JSON format
    #[arg(long, env)]
    pub log_json: bool,
}

impl Config {
    /// Build the immutable reconciliation settings
    pub fn reconciliation(&self) -> ReconciliationConfig {
        let raw = self.endpoint_weight.as_deref();
        if let Some(raw) = raw.filter(|raw| checked_weight(raw).is_none()) {
            warn!(
                configured = %raw,
                fallback = ReconciliationConfig::DEFAULT_WEIGHT,
                "EndpointWeight out of range, using default"
            );
        }

        ReconciliationConfig {
            endpoint_group_arn: self.endpoint_group_arn.clone(),
            endpoint_weight: parse_endpoint_weight(raw),
            client_ip_preservation: self.client_ip_preservation,
        }
    }

    /// Check if lifecycle abandons go to a real endpoint
    pub fn has_autoscaling_endpoint(&self) -> bool {
        self.autoscaling_endpoint.is_some() && !self.dry_run
    }
}

/// Settings for the JetStream consumer mode
#[derive(Debug, Clone, Args)]
pub struct ConsumerConfig {
    /// NATS server URL
    #[arg(long, env, default_value = "nats://localhost:4222")]
    pub nats_url: String,

    /// Path to NATS credentials file
    #[arg(long, env)]
    pub nats_creds_path: Option<String>,

    /// JetStream stream name
    #[arg(long, env = "LIFECYCLE_STREAM_NAME", default_value = "ASG_LIFECYCLE")]
    pub stream_name: String,

    /// Consumer name (for durable JetStream consumer)
    #[arg(long, env, default_value = "endpoint-sync-handler")]
    pub consumer_name: String,

    /// Auto Scaling Group filter (only consume events for this group)
    #[arg(long, env)]
    pub asg_filter: Option<String>,
}

impl ConsumerConfig {
    /// Subject that every lifecycle event is published under
    pub const SUBJECT_WILDCARD: &'static str = "asg.lifecycle.v1.*.events";

    /// Get the subject filter for JetStream consumer
    pub fn subject_filter(&self) -> String {
        if let Some(asg) = &self.asg_filter {
            format!("asg.lifecycle.v1.{}.events", asg)
        } else {
            Self::SUBJECT_WILDCARD.to_string()
        }
    }
}

/// Reconciliation settings, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationConfig {
    pub endpoint_group_arn: String,
    pub endpoint_weight: u8,
    pub client_ip_preservation: bool,
}

impl ReconciliationConfig {
    pub const DEFAULT_WEIGHT: u8 = 128;

    pub fn new(endpoint_group_arn: impl Into<String>) -> Self {
        Self {
            endpoint_group_arn: endpoint_group_arn.into(),
            endpoint_weight: Self::DEFAULT_WEIGHT,
            client_ip_preservation: true,
        }
    }

    pub fn with_endpoint_weight(mut self, weight: u8) -> Self {
        self.endpoint_weight = weight;
        self
    }

    pub fn with_client_ip_preservation(mut self, enabled: bool) -> Self {
        self.client_ip_preservation = enabled;
        self
    }
}

/// Parse a configured weight, falling back to 128 unless it is plain digits below 256
pub fn parse_endpoint_weight(raw: Option<&str>) -> u8 {
    raw.and_then(checked_weight)
        .unwrap_or(ReconciliationConfig::DEFAULT_WEIGHT)
}

fn checked_weight(raw: &str) -> Option<u8> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u8>().ok()
}
