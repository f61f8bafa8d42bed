//! MQTT adapters over `rumqttc`
//!
//! [`MqttPublisher`] is the publisher-side [`MessageSink`]; it only queues
//! requests, and an [`MqttDriver`] task polls the connection in the
//! background. [`run_subscriber`] is the subscriber-side consume loop.
//!
//! Connection failures are logged and retried with a capped exponential
//! backoff; `rumqttc` reconnects on the next poll.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::task::JoinHandle;

use crate::Result;
use crate::bridge::MessageSink;
use crate::dispatcher::SubscriberDispatcher;

/// Default broker port
pub const DEFAULT_PORT: u16 = 1883;

/// Default keep-alive interval
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Queued requests between the client handle and the event loop
const REQUEST_CAPACITY: usize = 64;

/// First reconnect delay
pub const BACKOFF_INITIAL: Duration = Duration::from_secs(1);

/// Reconnect delay cap
pub const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// How long shutdown waits for the disconnect to go out
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

/// Broker connection settings
#[derive(Clone)]
pub struct MqttConfig {
    /// Broker host
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Username, if the broker requires authentication
    pub username: Option<String>,
    /// Password
    pub password: Option<String>,
    /// MQTT client identifier
    pub client_id: String,
    /// Keep-alive interval
    pub keep_alive: Duration,
}

impl MqttConfig {
    /// Settings for `host:port` with a random client id
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            client_id: format!("satellite-tools-{}", &suffix[..8]),
            keep_alive: DEFAULT_KEEP_ALIVE,
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.as_deref().unwrap_or_default());
        }
        options
    }
}

impl fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}

/// Exponential reconnect backoff
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    next: Duration,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self {
            next: BACKOFF_INITIAL,
        }
    }
}

impl ReconnectBackoff {
    /// Delay to wait now; doubles the following one up to [`BACKOFF_MAX`]
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next;
        self.next = self.next.saturating_mul(2).min(BACKOFF_MAX);
        current
    }

    /// Start over after a successful connection
    pub fn reset(&mut self) {
        self.next = BACKOFF_INITIAL;
    }
}

/// Fire-and-forget publisher handle
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    /// Start a publishing connection
    ///
    /// Must be called inside a Tokio runtime; the returned driver keeps the
    /// connection alive.
    #[must_use]
    pub fn connect(config: &MqttConfig) -> (Self, MqttDriver) {
        let (client, eventloop) = AsyncClient::new(config.options(), REQUEST_CAPACITY);
        tracing::info!(host = %config.host, port = config.port, "connecting to MQTT broker");

        let task = tokio::spawn(drive(eventloop));
        (
            Self {
                client: client.clone(),
            },
            MqttDriver { client, task },
        )
    }
}

impl MessageSink for MqttPublisher {
    fn publish(&self, topic: &str, payload: Vec<u8>) {
        if let Err(e) = self
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
        {
            tracing::warn!(topic, error = %e, "failed to queue MQTT publish");
        }
    }
}

/// Background task polling a publisher connection
pub struct MqttDriver {
    client: AsyncClient,
    task: JoinHandle<()>,
}

impl MqttDriver {
    /// Disconnect and wait briefly for the driver to finish
    pub async fn shutdown(self) {
        if let Err(e) = self.client.try_disconnect() {
            tracing::debug!(error = %e, "failed to queue MQTT disconnect");
        }

        let abort = self.task.abort_handle();
        if tokio::time::timeout(DISCONNECT_GRACE, self.task).await.is_err() {
            abort.abort();
        }
        tracing::info!("disconnected from MQTT broker");
    }
}

async fn drive(mut eventloop: EventLoop) {
    let mut backoff = ReconnectBackoff::default();
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                backoff.reset();
                tracing::info!("connected to MQTT broker");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => return,
            Ok(_) => {}
            Err(e) => {
                let delay = backoff.next_delay();
                tracing::warn!(error = %e, retry_in = ?delay, "MQTT connection error");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Feed MQTT messages to `dispatcher` until `shutdown` completes
///
/// Subscribes to every bridge topic on each (re)connect.
///
/// # Errors
///
/// Returns error if the subscription request cannot be queued
pub async fn run_subscriber(
    config: &MqttConfig,
    dispatcher: &mut SubscriberDispatcher,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let (client, mut eventloop) = AsyncClient::new(config.options(), REQUEST_CAPACITY);
    let filter = dispatcher.topics().filter();
    let mut backoff = ReconnectBackoff::default();

    tracing::info!(
        host = %config.host,
        port = config.port,
        satellite = %dispatcher.satellite_id(),
        "connecting to MQTT broker"
    );

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => {
                tracing::info!("shutdown requested");
                break;
            }
            polled = eventloop.poll() => match polled {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    backoff.reset();
                    client.try_subscribe(filter.as_str(), QoS::AtMostOnce)?;
                    tracing::info!(topic = %filter, "connected, subscribing");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    dispatcher.on_message(&publish.topic, &publish.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(error = %e, retry_in = ?delay, "MQTT connection error");
                    tokio::select! {
                        () = &mut shutdown => {
                            tracing::info!("shutdown requested");
                            break;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    if client.try_disconnect().is_ok() {
        // One more poll sends the queued disconnect
        let _ = tokio::time::timeout(DISCONNECT_GRACE, eventloop.poll()).await;
    }
    tracing::info!("disconnected from MQTT broker");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = ReconnectBackoff::default();
        let delays: Vec<_> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), BACKOFF_INITIAL);
    }

    #[test]
    fn debug_redacts_password() {
        let mut config = MqttConfig::new("broker.local", DEFAULT_PORT);
        config.username = Some("satellite".to_string());
        config.password = Some("hunter2".to_string());

        let debug = format!("{config:?}");
        assert!(debug.contains("satellite"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn client_ids_are_unique() {
        let a = MqttConfig::new("broker.local", DEFAULT_PORT);
        let b = MqttConfig::new("broker.local", DEFAULT_PORT);
        assert!(a.client_id.starts_with("satellite-tools-"));
        assert_ne!(a.client_id, b.client_id);
    }
}
