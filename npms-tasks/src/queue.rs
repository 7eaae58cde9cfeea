//! Work queue client
//!
//! The analysis queue is a durable RabbitMQ queue reached over AMQP. Each
//! package id becomes one persistent message published to the default
//! exchange and routed by queue name. Publisher confirms are enabled, so a
//! push only succeeds once the broker has taken responsibility for the
//! message. Duplicate ids are harmless; the consumer processes each id
//! idempotently.

use crate::error::QueueError;
use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::uri::AMQPUri;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use npms_common::config::QueueConfig;
use std::future::Future;
use std::time::Duration;

/// Persistent delivery mode (survives broker restarts)
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// AMQP reply code for a normal close
const REPLY_SUCCESS: u16 = 200;

/// Durable enqueue of one unit of work per id
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn push(&self, id: &str) -> Result<(), QueueError>;

    /// Release transport resources; called once during teardown
    async fn close(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

struct Session {
    connection: Connection,
    channel: Channel,
}

/// RabbitMQ queue client
///
/// Built unconnected by [`RabbitMqQueue::new`]; [`RabbitMqQueue::connect`]
/// opens the connection and declares the queue.
pub struct RabbitMqQueue {
    uri: AMQPUri,
    name: String,
    timeout: Duration,
    session: Option<Session>,
}

impl RabbitMqQueue {
    /// Validate the address without any network I/O
    pub fn new(config: &QueueConfig) -> Result<Self, QueueError> {
        let uri: AMQPUri = config
            .addr
            .parse()
            .map_err(|reason: String| QueueError::InvalidAddress(config.addr.clone(), reason))?;

        Ok(Self {
            uri,
            name: config.name.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            session: None,
        })
    }

    /// Connect, enable publisher confirms and declare the durable queue
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let mut queue = Self::new(config)?;

        let connection = queue
            .bounded(Connection::connect_uri(queue.uri.clone(), ConnectionProperties::default()))
            .await??;
        let channel = connection.create_channel().await?;
        channel.confirm_select(ConfirmSelectOptions::default()).await?;
        channel
            .queue_declare(
                &queue.name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        tracing::info!(queue = %queue.name, broker = %queue.display_addr(), "Declared analysis queue");
        queue.session = Some(Session { connection, channel });
        Ok(queue)
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Broker address without credentials, safe to log
    pub fn display_addr(&self) -> String {
        format!(
            "{}:{}/{}",
            self.uri.authority.host, self.uri.authority.port, self.uri.vhost
        )
    }

    async fn bounded<F: Future>(&self, fut: F) -> Result<F::Output, QueueError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| QueueError::Timeout(self.timeout))
    }
}

fn message_properties() -> BasicProperties {
    BasicProperties::default()
        .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
        .with_content_type("application/json".into())
}

fn message_payload(id: &str) -> Vec<u8> {
    serde_json::Value::String(id.to_string()).to_string().into_bytes()
}

/// Map a publisher confirm to the push outcome
fn check_confirmation(id: &str, confirmation: Confirmation) -> Result<(), QueueError> {
    match confirmation {
        // Mandatory publishes come back with the message attached when unroutable
        Confirmation::Ack(Some(_)) => Err(QueueError::NotRouted(id.to_string())),
        Confirmation::Ack(None) => Ok(()),
        Confirmation::Nack(_) => Err(QueueError::Nacked(id.to_string())),
        Confirmation::NotRequested => {
            Err(QueueError::Amqp("publisher confirms are not enabled".to_string()))
        }
    }
}

#[async_trait]
impl WorkQueue for RabbitMqQueue {
    async fn push(&self, id: &str) -> Result<(), QueueError> {
        let session = self.session.as_ref().ok_or(QueueError::NotConnected)?;

        let confirm = session
            .channel
            .basic_publish(
                "",
                &self.name,
                BasicPublishOptions {
                    mandatory: true,
                    ..Default::default()
                },
                &message_payload(id),
                message_properties(),
            )
            .await?;
        let confirmation = self.bounded(confirm).await??;
        check_confirmation(id, confirmation)?;

        tracing::trace!(package = %id, "Pushed package onto analysis queue");
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        let Some(session) = &self.session else {
            return Ok(());
        };

        session.channel.close(REPLY_SUCCESS, "Bye").await?;
        session.connection.close(REPLY_SUCCESS, "Bye").await?;
        tracing::debug!(queue = %self.name, "Closed queue connection");
        Ok(())
    }
}
