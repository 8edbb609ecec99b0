use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

use super::error::LiveError;
use super::messages::{ClientMessage, LiveEvent, ServerMessage, Setup};

/// Both directions of an open connection
pub struct LiveChannel {
    /// Messages are written to the remote stream in send order
    pub outbound: mpsc::Sender<ClientMessage>,
    pub events: mpsc::Receiver<LiveEvent>,
}

/// Opens connections to the realtime dialogue service
#[async_trait::async_trait]
pub trait LiveConnector: Send + Sync {
    /// Connect and send `setup`; `LiveEvent::Open` arrives once the service accepts it
    async fn connect(&self, setup: Setup) -> Result<LiveChannel, LiveError>;
}

pub struct WebSocketConnector {
    endpoint: String,
    api_key: Option<String>,
    api_key_env: String,
    channel_capacity: usize,
}

impl WebSocketConnector {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        api_key_env: String,
        channel_capacity: usize,
    ) -> Self {
        Self {
            endpoint,
            api_key,
            api_key_env,
            channel_capacity,
        }
    }

    /// Read the API key from the named environment variable
    pub fn from_env(endpoint: String, api_key_env: String, channel_capacity: usize) -> Self {
        let api_key = std::env::var(&api_key_env).ok().filter(|k| !k.trim().is_empty());
        Self::new(endpoint, api_key, api_key_env, channel_capacity)
    }
}

fn parse_server_frame(payload: &[u8]) -> LiveEvent {
    match serde_json::from_slice::<ServerMessage>(payload) {
        Ok(message) if message.setup_complete.is_some() => LiveEvent::Open,
        Ok(message) => LiveEvent::Message(message),
        Err(e) => LiveEvent::Error(format!("Malformed server message: {}", e)),
    }
}

#[async_trait::async_trait]
impl LiveConnector for WebSocketConnector {
    async fn connect(&self, setup: Setup) -> Result<LiveChannel, LiveError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| LiveError::MissingCredential(self.api_key_env.clone()))?;

        info!("Connecting to realtime service at {}", self.endpoint);

        let url = format!("{}?key={}", self.endpoint, api_key);
        let (ws_stream, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut writer, mut reader) = ws_stream.split();

        info!("Connected, sending setup for model {}", setup.model);
        let setup_json = serde_json::to_string(&ClientMessage::Setup(setup))?;
        writer.send(Message::text(setup_json)).await?;

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ClientMessage>(self.channel_capacity);
        let (event_tx, event_rx) = mpsc::channel::<LiveEvent>(self.channel_capacity);

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize outbound message: {}", e);
                        continue;
                    }
                };

                match writer.send(Message::text(text)).await {
                    Ok(()) => {}
                    Err(tungstenite::Error::ConnectionClosed)
                    | Err(tungstenite::Error::AlreadyClosed) => {
                        debug!("WebSocket closed, stopping writer");
                        break;
                    }
                    Err(e) => warn!("Failed to send message: {}", e),
                }
            }

            if let Err(e) = writer.close().await {
                debug!("WebSocket close: {}", e);
            }
            info!("Realtime writer task stopped");
        });

        tokio::spawn(async move {
            let mut close_sent = false;

            while let Some(frame) = reader.next().await {
                let event = match frame {
                    Ok(Message::Text(text)) => parse_server_frame(text.as_bytes()),
                    Ok(Message::Binary(bytes)) => parse_server_frame(&bytes),
                    Ok(Message::Close(frame)) => {
                        close_sent = true;
                        LiveEvent::Close(
                            frame.map(|f| format!("{} {}", u16::from(f.code), f.reason)),
                        )
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        error!("WebSocket read error: {}", e);
                        LiveEvent::Error(e.to_string())
                    }
                };

                let is_close = matches!(event, LiveEvent::Close(_));
                if event_tx.send(event).await.is_err() || is_close {
                    break;
                }
            }

            if !close_sent {
                let _ = event_tx.send(LiveEvent::Close(None)).await;
            }
            info!("Realtime reader task stopped");
        });

        Ok(LiveChannel {
            outbound: outbound_tx,
            events: event_rx,
        })
    }
}
