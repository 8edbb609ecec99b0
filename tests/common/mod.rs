// In-memory stand-ins for the realtime service and the audio devices
//
// Each integration test binary pulls in what it needs from here.

#![allow(dead_code)]

use async_trait::async_trait;
use digiverifier::audio::{
    AudioBackendConfig, AudioBackendFactory, AudioBlock, AudioError, AudioOutput, MicrophoneBackend,
};
use digiverifier::flow::{AadharDetails, NameAndDobMatcher, PanDetails, VerificationOutcome};
use digiverifier::live::{ClientMessage, LiveChannel, LiveConnector, LiveError, LiveEvent, Setup};
use digiverifier::session::{LiveSession, SessionConfig, SessionStats};
use digiverifier::tools::{ToolDispatcher, VerificationCallbacks};
use digiverifier::VerificationFlow;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Ordered record of device and connector calls, shared by the fakes
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(log: &CallLog, entry: &str) {
    log.lock().unwrap().push(entry.to_string());
}

pub fn entries(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Poll the session's statistics until `condition` holds or two seconds pass
pub async fn stats_when(
    session: &LiveSession,
    condition: impl Fn(&SessionStats) -> bool,
) -> SessionStats {
    for _ in 0..200 {
        let stats = session.stats().await;
        if condition(&stats) {
            return stats;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    session.stats().await
}

/// Await `future` with a two second ceiling
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), future)
        .await
        .expect("timed out")
}

// ============================================================================
// Realtime service
// ============================================================================

#[derive(Debug, Clone)]
pub enum Handshake {
    /// Answer the setup with `Open`
    Accept,
    /// Close the stream instead of opening it
    Reject(String),
    /// Never answer
    Silent,
}

/// The service's side of an open fake connection
pub struct RemoteEnd {
    /// Everything the session sent after setup, in order
    pub sent: mpsc::Receiver<ClientMessage>,
    pub events: mpsc::Sender<LiveEvent>,
}

impl RemoteEnd {
    pub async fn next_sent(&mut self) -> Option<ClientMessage> {
        within(self.sent.recv()).await
    }

    pub async fn push(&self, event: LiveEvent) {
        self.events.send(event).await.expect("session stopped listening");
    }
}

pub struct FakeConnector {
    pub handshake: Handshake,
    pub fail_with_missing_key: bool,
    log: CallLog,
    setups: Mutex<Vec<Setup>>,
    remote: Mutex<Option<RemoteEnd>>,
}

impl FakeConnector {
    pub fn new(handshake: Handshake, log: CallLog) -> Self {
        Self {
            handshake,
            fail_with_missing_key: false,
            log,
            setups: Mutex::new(Vec::new()),
            remote: Mutex::new(None),
        }
    }

    pub fn setups(&self) -> Vec<Setup> {
        self.setups.lock().unwrap().clone()
    }

    /// Take the remote end of the most recent connection
    pub fn take_remote(&self) -> RemoteEnd {
        self.remote.lock().unwrap().take().expect("no open connection")
    }
}

#[async_trait]
impl LiveConnector for FakeConnector {
    async fn connect(&self, setup: Setup) -> Result<LiveChannel, LiveError> {
        record(&self.log, "connect");
        if self.fail_with_missing_key {
            return Err(LiveError::MissingCredential("TEST_API_KEY".to_string()));
        }
        self.setups.lock().unwrap().push(setup);

        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(256);

        match &self.handshake {
            Handshake::Accept => event_tx.send(LiveEvent::Open).await.unwrap(),
            Handshake::Reject(reason) => event_tx
                .send(LiveEvent::Close(Some(reason.clone())))
                .await
                .unwrap(),
            Handshake::Silent => {}
        }

        *self.remote.lock().unwrap() = Some(RemoteEnd {
            sent: outbound_rx,
            events: event_tx,
        });

        Ok(LiveChannel {
            outbound: outbound_tx,
            events: event_rx,
        })
    }
}

// ============================================================================
// Audio devices
// ============================================================================

/// Shared state of the fake microphone; tests feed blocks through it
pub struct MicControl {
    enabled: AtomicBool,
    capturing: AtomicBool,
    sender: Mutex<Option<mpsc::Sender<AudioBlock>>>,
    pub fail_start: AtomicBool,
}

impl MicControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            enabled: AtomicBool::new(true),
            capturing: AtomicBool::new(false),
            sender: Mutex::new(None),
            fail_start: AtomicBool::new(false),
        })
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Deliver one block as the capture callback would; silence while disabled
    pub async fn push(&self, samples: Vec<f32>, sample_rate: u32) {
        let samples = if self.enabled.load(Ordering::SeqCst) {
            samples
        } else {
            vec![0.0; samples.len()]
        };
        let sender = self.sender.lock().unwrap().clone().expect("microphone not started");
        sender
            .send(AudioBlock {
                samples,
                sample_rate,
            })
            .await
            .expect("capture pipeline stopped");
    }
}

pub struct FakeMicrophone {
    control: Arc<MicControl>,
    log: CallLog,
    sample_rate: u32,
}

#[async_trait]
impl MicrophoneBackend for FakeMicrophone {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioBlock>, AudioError> {
        record(&self.log, "mic.start");
        if self.control.fail_start.load(Ordering::SeqCst) {
            return Err(AudioError::NoMicrophoneFound);
        }
        let (tx, rx) = mpsc::channel(64);
        *self.control.sender.lock().unwrap() = Some(tx);
        self.control.capturing.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        record(&self.log, "mic.stop");
        self.control.sender.lock().unwrap().take();
        self.control.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        self.control.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.control.enabled.load(Ordering::SeqCst)
    }

    fn is_capturing(&self) -> bool {
        self.control.is_capturing()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        "fake-microphone"
    }
}

/// One `schedule` call seen by the fake output
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduled {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub start: f64,
}

/// Output clock under test control; starts suspended like a fresh device
pub struct FakeOutput {
    time: Mutex<f64>,
    suspended: AtomicBool,
    closed: AtomicBool,
    scheduled: Mutex<Vec<Scheduled>>,
    pub fail_resume: AtomicBool,
    log: CallLog,
}

impl FakeOutput {
    pub fn new(log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            time: Mutex::new(0.0),
            suspended: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            scheduled: Mutex::new(Vec::new()),
            fail_resume: AtomicBool::new(false),
            log,
        })
    }

    pub fn set_time(&self, time: f64) {
        *self.time.lock().unwrap() = time;
    }

    pub fn scheduled(&self) -> Vec<Scheduled> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    fn current_time(&self) -> f64 {
        *self.time.lock().unwrap()
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    async fn resume(&self) -> Result<(), AudioError> {
        record(&self.log, "output.resume");
        if self.fail_resume.load(Ordering::SeqCst) {
            return Err(AudioError::ClockControl("resume refused".to_string()));
        }
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn suspend(&self) -> Result<(), AudioError> {
        record(&self.log, "output.suspend");
        self.suspended.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn schedule(&self, samples: Vec<f32>, sample_rate: u32, start_at: f64) -> Result<(), AudioError> {
        if self.is_closed() {
            return Err(AudioError::Closed);
        }
        self.scheduled.lock().unwrap().push(Scheduled {
            samples,
            sample_rate,
            start: start_at,
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), AudioError> {
        record(&self.log, "output.close");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "fake-output"
    }
}

pub struct FakeDevices {
    pub output: Arc<FakeOutput>,
    pub mic: Arc<MicControl>,
    pub mic_sample_rate: u32,
    pub fail_output: bool,
    log: CallLog,
}

impl FakeDevices {
    pub fn new(log: CallLog) -> Self {
        Self {
            output: FakeOutput::new(log.clone()),
            mic: MicControl::new(),
            mic_sample_rate: 48000,
            fail_output: false,
            log,
        }
    }
}

impl AudioBackendFactory for FakeDevices {
    fn create_output(&self, _config: &AudioBackendConfig) -> Result<Arc<dyn AudioOutput>, AudioError> {
        record(&self.log, "output.create");
        if self.fail_output {
            return Err(AudioError::NoOutputDevice);
        }
        // Reopening hands out the same clock
        self.output.closed.store(false, Ordering::SeqCst);
        Ok(self.output.clone())
    }

    fn create_microphone(
        &self,
        _config: &AudioBackendConfig,
    ) -> Result<Box<dyn MicrophoneBackend>, AudioError> {
        record(&self.log, "mic.create");
        Ok(Box::new(FakeMicrophone {
            control: self.mic.clone(),
            log: self.log.clone(),
            sample_rate: self.mic_sample_rate,
        }))
    }
}

// ============================================================================
// Application callbacks
// ============================================================================

/// Callbacks that record every hook; `savePan` can be told to fail
pub struct RecordingCallbacks {
    pub calls: Mutex<Vec<String>>,
    pub fail_save_pan: bool,
    pub outcome: VerificationOutcome,
}

impl RecordingCallbacks {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_save_pan: false,
            outcome: VerificationOutcome::Match,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VerificationCallbacks for RecordingCallbacks {
    fn on_save_aadhar(&self, details: AadharDetails) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(format!("aadhar:{}", details.full_name));
        Ok(())
    }

    fn on_save_pan(&self, details: PanDetails) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(format!("pan:{}", details.number));
        if self.fail_save_pan {
            anyhow::bail!("PAN registry unavailable");
        }
        Ok(())
    }

    async fn on_verify_details(&self, action: &str) -> anyhow::Result<VerificationOutcome> {
        self.calls.lock().unwrap().push(format!("verify:{}", action));
        Ok(self.outcome)
    }

    fn on_create_digilocker(&self, pin: &str) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(format!("create:{}", pin.len()));
        Ok(())
    }
}

// ============================================================================
// Session wiring
// ============================================================================

pub fn test_session_config() -> SessionConfig {
    SessionConfig {
        session_id: "test-session".to_string(),
        connect_timeout: Duration::from_millis(200),
        ..SessionConfig::default()
    }
}

pub fn test_flow() -> Arc<VerificationFlow> {
    Arc::new(VerificationFlow::new(Arc::new(NameAndDobMatcher), Duration::ZERO))
}

pub struct Harness {
    pub log: CallLog,
    pub connector: Arc<FakeConnector>,
    pub output: Arc<FakeOutput>,
    pub mic: Arc<MicControl>,
    pub flow: Arc<VerificationFlow>,
    pub session: Arc<LiveSession>,
}

impl Harness {
    pub fn new(handshake: Handshake) -> Self {
        Self::build(handshake, |_, _| {})
    }

    /// Build with a chance to adjust the fakes before the session is created
    pub fn build(handshake: Handshake, adjust: impl FnOnce(&mut FakeConnector, &mut FakeDevices)) -> Self {
        let log = new_log();
        let mut connector = FakeConnector::new(handshake, log.clone());
        let mut devices = FakeDevices::new(log.clone());
        adjust(&mut connector, &mut devices);

        let connector = Arc::new(connector);
        let output = devices.output.clone();
        let mic = devices.mic.clone();
        let flow = test_flow();
        let tools = Arc::new(ToolDispatcher::with_callbacks(flow.clone()));

        let session = Arc::new(LiveSession::new(
            test_session_config(),
            connector.clone(),
            Arc::new(devices),
            tools,
        ));

        Self {
            log,
            connector,
            output,
            mic,
            flow,
            session,
        }
    }
}
