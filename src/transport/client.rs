use anyhow::{Context, Result};
use async_nats::Client;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::messages::{ClientEvent, ServerEvent};

/// Outbound half of the stream channel. The inbound half is an
/// `mpsc::Receiver<ServerEvent>` handed out at connect time.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn emit(&self, event: ClientEvent) -> Result<()>;
}

/// NATS-backed transport.
///
/// Client events are published as JSON to `voice.ingest.<session>`; server
/// events are consumed from `voice.events.<session>`. Connection lifecycle
/// changes surface on the same event stream as `Connect`/`Disconnect`.
pub struct NatsTransport {
    client: Client,
    ingest_subject: String,
}

impl NatsTransport {
    pub async fn connect(
        url: &str,
        session_id: &str,
    ) -> Result<(Self, mpsc::Receiver<ServerEvent>)> {
        info!("Connecting to NATS at {}", url);

        let (event_tx, event_rx) = mpsc::channel(64);

        let lifecycle_tx = event_tx.clone();
        let client = async_nats::ConnectOptions::new()
            .event_callback(move |event| {
                let tx = lifecycle_tx.clone();
                async move {
                    match event {
                        async_nats::Event::Connected => {
                            let _ = tx.send(ServerEvent::Connect).await;
                        }
                        async_nats::Event::Disconnected => {
                            let _ = tx.send(ServerEvent::Disconnect).await;
                        }
                        _ => {}
                    }
                }
            })
            .connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        let events_subject = format!("voice.events.{}", session_id);
        let mut subscriber = client
            .subscribe(events_subject.clone())
            .await
            .context("Failed to subscribe to server events")?;
        info!("Subscribed to {}", events_subject);

        // The initial connect does not pass through the event callback.
        let _ = event_tx.send(ServerEvent::Connect).await;

        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<ServerEvent>(&msg.payload) {
                    Ok(event) => {
                        if event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse server event: {}", e);
                    }
                }
            }
        });

        Ok((
            Self {
                client,
                ingest_subject: format!("voice.ingest.{}", session_id),
            },
            event_rx,
        ))
    }
}

#[async_trait::async_trait]
impl Transport for NatsTransport {
    async fn emit(&self, event: ClientEvent) -> Result<()> {
        let payload = serde_json::to_vec(&event)?;

        self.client
            .publish(self.ingest_subject.clone(), payload.into())
            .await
            .context("Failed to publish client event")?;

        Ok(())
    }
}
