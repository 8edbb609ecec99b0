use super::config::SessionConfig;
use super::error::BridgeError;
use super::inbound::InboundHandler;
use super::stats::{ConnectionState, SessionCounters, SessionStats};
use crate::audio::{
    AudioBackendFactory, AudioError, AudioOutput, CapturePipeline, LevelMeter, LevelReading,
    MicrophoneBackend, PlaybackScheduler,
};
use crate::live::{build_setup, ClientMessage, LiveChannel, LiveConnector, LiveEvent};
use crate::tools::ToolDispatcher;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Resources held while a session is connected
struct ActiveSession {
    outbound: mpsc::Sender<ClientMessage>,
    microphone: Box<dyn MicrophoneBackend>,
    output: Arc<dyn AudioOutput>,
    capture_task: JoinHandle<()>,
    inbound_task: JoinHandle<()>,
}

impl ActiveSession {
    async fn shutdown(mut self) {
        if let Err(e) = self.microphone.stop().await {
            warn!("Failed to stop microphone: {}", e);
        }

        self.capture_task.abort();
        if let Err(e) = self.capture_task.await {
            if e.is_panic() {
                error!("Capture task panicked: {}", e);
            }
        }

        self.inbound_task.abort();
        if let Err(e) = self.inbound_task.await {
            if e.is_panic() {
                error!("Inbound task panicked: {}", e);
            }
        }

        // Last sender: the writer closes the remote stream once this is dropped
        drop(self.outbound);

        if let Err(e) = self.output.close().await {
            warn!("Failed to close audio output: {}", e);
        }
    }
}

/// Real-time audio bridge between the local audio devices and the dialogue service
///
/// Owns the remote stream, the microphone, the output clock with its playback
/// cursor, and the input/output level meters. Several sessions can live in one
/// process; nothing here is global.
pub struct LiveSession {
    config: SessionConfig,
    connector: Arc<dyn LiveConnector>,
    devices: Arc<dyn AudioBackendFactory>,
    tools: Arc<ToolDispatcher>,
    input_meter: Arc<LevelMeter>,
    output_meter: Arc<LevelMeter>,
    counters: Arc<SessionCounters>,
    connection: Arc<watch::Sender<ConnectionState>>,
    mic_muted: AtomicBool,
    output_paused: Arc<AtomicBool>,
    connected_at: StdMutex<Option<DateTime<Utc>>>,
    active: Mutex<Option<ActiveSession>>,
}

impl LiveSession {
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn LiveConnector>,
        devices: Arc<dyn AudioBackendFactory>,
        tools: Arc<ToolDispatcher>,
    ) -> Self {
        info!("Creating live session: {}", config.session_id);

        let (connection, _) = watch::channel(ConnectionState::Unconnected);

        Self {
            config,
            connector,
            devices,
            tools,
            input_meter: Arc::new(LevelMeter::new()),
            output_meter: Arc::new(LevelMeter::new()),
            counters: Arc::new(SessionCounters::default()),
            connection: Arc::new(connection),
            mic_muted: AtomicBool::new(false),
            output_paused: Arc::new(AtomicBool::new(false)),
            connected_at: StdMutex::new(None),
            active: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    /// Connect to the service and start streaming
    ///
    /// The output clock is acquired first, then the remote stream; capture
    /// starts only once the service accepted the setup. On failure everything
    /// acquired so far is released before the error is returned.
    ///
    /// Returns `true` when a new stream was opened and `false` when the session
    /// was already open.
    ///
    /// The session lock is held until the handshake completes or times out
    /// (`connect_timeout`), so a concurrent `disconnect()` waits for that and
    /// does not cancel an in-flight handshake.
    pub async fn connect(&self) -> Result<bool, BridgeError> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            if self.connection_state() == ConnectionState::Open {
                warn!("Session {} already connected", self.config.session_id);
                return Ok(false);
            }
            // Remote side closed earlier; release what the old connection held
            if let Some(stale) = active.take() {
                info!("Releasing closed connection before reconnecting");
                stale.shutdown().await;
            }
        }

        info!("Connecting session: {}", self.config.session_id);
        self.connection.send_replace(ConnectionState::Connecting);
        self.counters.reset();
        self.mic_muted.store(false, Ordering::SeqCst);
        self.output_paused.store(false, Ordering::SeqCst);

        match self.establish().await {
            Ok(session) => {
                *active = Some(session);
                self.set_connected_at(Some(Utc::now()));
                self.connection.send_replace(ConnectionState::Open);
                info!("Session {} connected", self.config.session_id);
                Ok(true)
            }
            Err(e) => {
                error!("Failed to connect session {}: {}", self.config.session_id, e);
                self.connection.send_replace(ConnectionState::Unconnected);
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<ActiveSession, BridgeError> {
        let backend_config = self.config.backend_config();

        // Output clock
        let output = self
            .devices
            .create_output(&backend_config)
            .map_err(BridgeError::Output)?;
        if output.is_suspended() {
            if let Err(e) = output.resume().await {
                release_output(&output).await;
                return Err(BridgeError::Output(e));
            }
        }

        // Remote stream
        let setup = build_setup(&self.config.model, &self.config.voice);
        let LiveChannel {
            outbound,
            mut events,
        } = match self.connector.connect(setup).await {
            Ok(channel) => channel,
            Err(e) => {
                release_output(&output).await;
                return Err(e.into());
            }
        };

        let timeout = self.config.connect_timeout;
        let handshake = match tokio::time::timeout(timeout, wait_for_open(&mut events)).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::HandshakeTimeout(timeout.as_secs())),
        };
        if let Err(e) = handshake {
            drop(outbound);
            release_output(&output).await;
            return Err(e);
        }

        // Microphone
        let acquired = match self.devices.create_microphone(&backend_config) {
            Ok(mut microphone) => match microphone.start().await {
                Ok(blocks) => Ok((microphone, blocks)),
                Err(e) => {
                    if let Err(stop_err) = microphone.stop().await {
                        debug!("Microphone stop after failed start: {}", stop_err);
                    }
                    Err(e)
                }
            },
            Err(e) => Err(e),
        };
        let (microphone, blocks) = match acquired {
            Ok(acquired) => acquired,
            Err(e) => {
                drop(outbound);
                release_output(&output).await;
                return Err(BridgeError::Microphone(e));
            }
        };
        info!(
            "Microphone {} capturing at {}Hz",
            microphone.name(),
            microphone.sample_rate()
        );

        // Tasks
        let pipeline = CapturePipeline::new(self.config.input_sample_rate, Arc::clone(&self.input_meter));
        let capture_task = tokio::spawn(pipeline.run(
            blocks,
            outbound.clone(),
            Arc::clone(&self.counters.blocks_sent),
        ));

        let inbound = InboundHandler {
            scheduler: PlaybackScheduler::new(
                Arc::clone(&output),
                Arc::clone(&self.output_meter),
                Arc::clone(&self.output_paused),
            ),
            tools: Arc::clone(&self.tools),
            outbound: outbound.clone(),
            counters: Arc::clone(&self.counters),
            connection: Arc::clone(&self.connection),
            output_sample_rate: self.config.output_sample_rate,
        };
        let inbound_task = tokio::spawn(inbound.run(events));

        Ok(ActiveSession {
            outbound,
            microphone,
            output,
            capture_task,
            inbound_task,
        })
    }

    /// Close the remote stream and release every audio resource
    ///
    /// Safe to call in any state, any number of times.
    pub async fn disconnect(&self) -> SessionStats {
        let active = self.active.lock().await.take();

        match active {
            Some(session) => {
                info!("Disconnecting session: {}", self.config.session_id);
                session.shutdown().await;
                self.set_connected_at(None);
                self.connection.send_replace(ConnectionState::Closed);
                self.input_meter.reset();
                self.output_meter.reset();
                info!("Session {} disconnected", self.config.session_id);
            }
            None => debug!("Disconnect requested with no active session"),
        }

        self.stats().await
    }

    /// Enable or disable the microphone track; no-op without an active microphone
    pub async fn set_mic_muted(&self, muted: bool) {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(session) => {
                session.microphone.set_enabled(!muted);
                self.mic_muted.store(muted, Ordering::SeqCst);
                info!("Microphone {}", if muted { "muted" } else { "unmuted" });
            }
            None => debug!("No active microphone, ignoring mute"),
        }
    }

    /// Suspend or resume the output clock
    ///
    /// Scheduled audio is kept and the playback cursor is not touched.
    pub async fn set_output_paused(&self, paused: bool) -> Result<(), AudioError> {
        let active = self.active.lock().await;
        let Some(session) = active.as_ref() else {
            debug!("No active output, ignoring pause");
            return Ok(());
        };

        // Flag first so the scheduler does not resume a clock we are suspending
        self.output_paused.store(paused, Ordering::SeqCst);
        let result = if paused {
            session.output.suspend().await
        } else {
            session.output.resume().await
        };

        match &result {
            Ok(()) => info!("Output {}", if paused { "paused" } else { "resumed" }),
            Err(e) => {
                warn!("Failed to change output state: {}", e);
                self.output_paused.store(!paused, Ordering::SeqCst);
            }
        }
        result
    }

    fn set_connected_at(&self, at: Option<DateTime<Utc>>) {
        *self
            .connected_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = at;
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub fn input_meter(&self) -> Arc<LevelMeter> {
        Arc::clone(&self.input_meter)
    }

    pub fn output_meter(&self) -> Arc<LevelMeter> {
        Arc::clone(&self.output_meter)
    }

    pub fn input_level(&self) -> LevelReading {
        self.input_meter.reading()
    }

    pub fn output_level(&self) -> LevelReading {
        self.output_meter.reading()
    }

    /// Get current session statistics
    pub async fn stats(&self) -> SessionStats {
        let connected_at = *self
            .connected_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let duration_secs = connected_at
            .map(|at| Utc::now().signed_duration_since(at).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        SessionStats {
            session_id: self.config.session_id.clone(),
            connection: self.connection_state(),
            connected_at,
            duration_secs,
            blocks_sent: self.counters.blocks_sent.load(Ordering::Relaxed),
            chunks_played: self.counters.chunks_played.load(Ordering::Relaxed),
            chunks_dropped: self.counters.chunks_dropped.load(Ordering::Relaxed),
            tool_calls_handled: self.counters.tool_calls_handled.load(Ordering::Relaxed),
            mic_muted: self.mic_muted.load(Ordering::SeqCst),
            output_paused: self.output_paused.load(Ordering::SeqCst),
            input_level: self.input_meter.reading(),
            output_level: self.output_meter.reading(),
        }
    }
}

/// Wait for the service to accept the setup message
async fn wait_for_open(events: &mut mpsc::Receiver<LiveEvent>) -> Result<(), BridgeError> {
    while let Some(event) = events.recv().await {
        match event {
            LiveEvent::Open => return Ok(()),
            LiveEvent::Close(reason) => {
                return Err(BridgeError::HandshakeRejected(
                    reason.unwrap_or_else(|| "connection closed".to_string()),
                ))
            }
            LiveEvent::Error(e) => return Err(BridgeError::HandshakeRejected(e)),
            LiveEvent::Message(_) => debug!("Ignoring message received before setup completed"),
        }
    }

    Err(BridgeError::HandshakeRejected(
        "stream ended before setup completed".to_string(),
    ))
}

async fn release_output(output: &Arc<dyn AudioOutput>) {
    if let Err(e) = output.close().await {
        warn!("Failed to close audio output: {}", e);
    }
}
