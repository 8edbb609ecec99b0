use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::stats::{ConnectionState, SessionCounters};
use crate::audio::codec::parse_pcm_rate;
use crate::audio::PlaybackScheduler;
use crate::live::{ClientMessage, LiveEvent, ServerMessage};
use crate::tools::ToolDispatcher;

/// Reacts to the inbound half of a connection
///
/// Each message is handled to completion, tool responses included, before the
/// next one is read.
pub(crate) struct InboundHandler {
    pub scheduler: PlaybackScheduler,
    pub tools: Arc<ToolDispatcher>,
    pub outbound: mpsc::Sender<ClientMessage>,
    pub counters: Arc<SessionCounters>,
    pub connection: Arc<watch::Sender<ConnectionState>>,
    pub output_sample_rate: u32,
}

impl InboundHandler {
    pub async fn run(mut self, mut events: mpsc::Receiver<LiveEvent>) {
        info!("Inbound task started");

        while let Some(event) = events.recv().await {
            match event {
                LiveEvent::Open => debug!("Ignoring repeated open event"),
                LiveEvent::Message(message) => self.handle_message(message).await,
                LiveEvent::Close(reason) => {
                    info!(
                        "Remote stream closed: {}",
                        reason.as_deref().unwrap_or("no reason given")
                    );
                    self.connection.send_replace(ConnectionState::Closed);
                    break;
                }
                LiveEvent::Error(e) => error!("Remote stream error: {}", e),
            }
        }

        info!("Inbound task stopped");
    }

    async fn handle_message(&mut self, message: ServerMessage) {
        if let Some(content) = &message.server_content {
            for blob in content.audio_blobs() {
                let rate = parse_pcm_rate(&blob.mime_type).unwrap_or(self.output_sample_rate);
                match self.scheduler.enqueue(&blob.data, rate).await {
                    Some(_) => self.counters.chunks_played.fetch_add(1, Ordering::Relaxed),
                    None => self.counters.chunks_dropped.fetch_add(1, Ordering::Relaxed),
                };
            }

            if content.interrupted {
                info!("Model turn interrupted");
            }
            if content.turn_complete {
                debug!("Model turn complete");
            }
        }

        if let Some(tool_call) = &message.tool_call {
            let calls = &tool_call.function_calls;
            info!("Handling {} tool call(s)", calls.len());

            let response = self.tools.handle(calls).await;
            self.counters
                .tool_calls_handled
                .fetch_add(calls.len(), Ordering::Relaxed);

            if self
                .outbound
                .send(ClientMessage::ToolResponse(response))
                .await
                .is_err()
            {
                warn!("Failed to send tool response: outbound stream closed");
            }
        }

        if let Some(cancellation) = &message.tool_call_cancellation {
            info!("Service cancelled tool calls: {:?}", cancellation.ids);
        }

        if let Some(go_away) = &message.go_away {
            warn!(
                "Service will close the connection soon (time left: {})",
                go_away.time_left.as_deref().unwrap_or("unknown")
            );
        }
    }
}
