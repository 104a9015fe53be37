//! rumqttc adapter: fire-and-forget publishing for batched adjustments.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use switchboard_core::config::MqttConfig;
use switchboard_core::debounce::PublishSink;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// MQTT-backed publish sink.
///
/// The connection is driven by a background task that reconnects with a
/// short backoff, so a broker outage never stalls dispatch; publishes
/// during an outage are dropped, matching the at-most-once contract.
pub struct MqttSink {
    client: AsyncClient,
    driver: JoinHandle<()>,
}

impl MqttSink {
    /// Must be called from within a tokio runtime.
    pub fn start(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.as_deref().unwrap_or(""));
        }

        let (client, mut eventloop) = AsyncClient::new(options, 16);
        let broker = format!("{}:{}", config.host, config.port);
        let driver = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(broker = %broker, "connected to mqtt broker");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(broker = %broker, error = %e, "mqtt connection lost, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self { client, driver }
    }

    pub async fn shutdown(&self) {
        let _ = self.client.disconnect().await;
        self.driver.abort();
    }
}

impl PublishSink for MqttSink {
    fn publish(&self, topic: &str, payload: &str) {
        if let Err(e) = self
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_owned())
        {
            warn!(topic, payload, error = %e, "mqtt publish dropped");
        }
    }
}

/// Stand-in sink for configs without an mqtt section. Dispatch never
/// routes to it unless the config validation was bypassed.
pub struct DiscardSink;

impl PublishSink for DiscardSink {
    fn publish(&self, topic: &str, payload: &str) {
        debug!(topic, payload, "no mqtt configured, discarding publish");
    }
}
