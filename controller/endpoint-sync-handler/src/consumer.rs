//! NATS JetStream consumer for lifecycle events
//!
//! Each message is one dispatcher invocation. Failed launches are nak'd so
//! the stream can re-drive them; everything else is acked, including failed
//! terminations whose hook has already been abandoned.

use crate::config::ConsumerConfig;
use crate::dispatcher::{Dispatch, EventDispatcher};
use crate::metrics::Metrics;
use crate::model::EventKind;
use anyhow::{Context, Result};
use async_nats::jetstream::{
    self,
    consumer::{AckPolicy, DeliverPolicy, PullConsumer},
    stream::Stream,
    AckKind,
};
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Lifecycle event consumer - subscribes to JetStream and dispatches each event
pub struct LifecycleEventConsumer {
    config: ConsumerConfig,
    dispatcher: EventDispatcher,
    metrics: Metrics,
}

impl LifecycleEventConsumer {
    pub fn new(config: ConsumerConfig, dispatcher: EventDispatcher, metrics: Metrics) -> Self {
        Self {
            config,
            dispatcher,
            metrics,
        }
    }

    /// Run the consumer loop
    pub async fn run(&self) -> Result<()> {
        info!("Starting lifecycle event consumer");

        let client = self.connect_nats().await?;
        let jetstream = jetstream::new(client);
        let stream = self.ensure_stream(&jetstream).await?;
        let consumer = self.create_consumer(&stream).await?;

        info!(
            consumer_name = %self.config.consumer_name,
            subject_filter = %self.config.subject_filter(),
            "Consumer created successfully, starting message processing"
        );

        self.process_messages(consumer).await
    }

    async fn connect_nats(&self) -> Result<async_nats::Client> {
        info!("Connecting to NATS at {}", self.config.nats_url);

        let client = if let Some(creds_path) = &self.config.nats_creds_path {
            info!("Using credentials file: {}", creds_path);
            async_nats::ConnectOptions::new()
                .credentials_file(creds_path)
                .await
                .context("Failed to load NATS credentials")?
                .connect(&self.config.nats_url)
                .await
                .context("Failed to connect to NATS with credentials")?
        } else {
            warn!("No NATS credentials provided, connecting without auth");
            async_nats::connect(&self.config.nats_url)
                .await
                .context("Failed to connect to NATS")?
        };

        info!("Successfully connected to NATS");
        Ok(client)
    }

    async fn ensure_stream(&self, jetstream: &jetstream::Context) -> Result<Stream> {
        let stream_name = &self.config.stream_name;

        match jetstream.get_stream(stream_name).await {
            Ok(stream) => {
                info!("Found existing stream: {}", stream_name);
                Ok(stream)
            }
            Err(_) => {
                info!("Stream {} not found, creating it", stream_name);
                let stream_config = jetstream::stream::Config {
                    name: stream_name.clone(),
                    subjects: vec![ConsumerConfig::SUBJECT_WILDCARD.to_string()],
                    // Lifecycle hooks time out long before this
                    max_age: Duration::from_secs(3600 * 24),
                    ..Default::default()
                };

                let stream = jetstream
                    .get_or_create_stream(stream_config)
                    .await
                    .context("Failed to create JetStream stream")?;

                info!("Successfully created stream: {}", stream_name);
                Ok(stream)
            }
        }
    }

    async fn create_consumer(&self, stream: &Stream) -> Result<PullConsumer> {
        let consumer_config = jetstream::consumer::pull::Config {
            durable_name: Some(self.config.consumer_name.clone()),
            filter_subject: self.config.subject_filter(),
            deliver_policy: DeliverPolicy::All,
            ack_policy: AckPolicy::Explicit,
            ack_wait: Duration::from_secs(60),
            max_deliver: 3,
            ..Default::default()
        };

        stream
            .get_or_create_consumer(&self.config.consumer_name, consumer_config)
            .await
            .context("Failed to create consumer")
    }

    async fn process_messages(&self, consumer: PullConsumer) -> Result<()> {
        const BATCH_SIZE: usize = 10;
        const BATCH_TIMEOUT_SECS: u64 = 30;

        loop {
            let mut messages = consumer
                .batch()
                .max_messages(BATCH_SIZE)
                .expires(Duration::from_secs(BATCH_TIMEOUT_SECS))
                .messages()
                .await
                .context("Failed to fetch message batch")?;

            let mut batch_count = 0;

            while let Some(msg_result) = messages.next().await {
                match msg_result {
                    Ok(msg) => {
                        batch_count += 1;
                        self.handle_message(msg).await;
                    }
                    Err(e) => {
                        error!("Error receiving message: {}", e);
                        self.metrics.record_error("receive_error");
                    }
                }
            }

            if batch_count > 0 {
                debug!("Processed batch of {} messages", batch_count);
            } else {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    async fn handle_message(&self, msg: jetstream::Message) {
        debug!(
            subject = %msg.subject,
            payload_size = msg.payload.len(),
            "Processing lifecycle event message"
        );

        let dispatch = self.dispatcher.dispatch_bytes(&msg.payload).await;

        if let Err(e) = msg.ack_with(ack_kind(&dispatch)).await {
            error!("Failed to acknowledge message: {}", e);
        }
    }
}

/// Only failed launches go back to the stream
pub fn ack_kind(dispatch: &Dispatch) -> AckKind {
    match dispatch {
        Dispatch::Handled(invocation)
            if !invocation.succeeded() && invocation.kind == EventKind::InstanceLaunched =>
        {
            AckKind::Nak(None)
        }
        _ => AckKind::Ack,
    }
}
