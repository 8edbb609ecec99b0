// cpal implementations of the microphone and output backends
//
// cpal streams are not `Send` on every host, so each stream lives on its own
// thread for its whole lifetime. The handles kept by the session only hold a
// shutdown channel, shared state and the join handle.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::backend::{
    AudioBackendConfig, AudioBackendFactory, AudioBlock, AudioOutput, MicrophoneBackend,
};
use super::error::AudioError;
use super::resample::resample;

/// Owns a cpal stream on a dedicated thread until stopped
struct StreamThread {
    shutdown: Option<std_mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StreamThread {
    fn spawn<F>(name: &str, build: F) -> Result<Self, AudioError>
    where
        F: FnOnce() -> Result<cpal::Stream, AudioError> + Send + 'static,
    {
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), AudioError>>();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || match build() {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Returns on explicit shutdown or when the handle is dropped
                    let _ = shutdown_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| AudioError::StreamStartFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                shutdown: Some(shutdown_tx),
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::StreamStartFailed(format!(
                    "{} thread exited before the stream started",
                    name
                )))
            }
        }
    }

    fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Audio stream thread panicked");
            }
        }
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Microphone
// ============================================================================

/// Collects interleaved device samples into fixed-size mono blocks
struct BlockAssembler {
    pending: Vec<f32>,
    block_size: usize,
    sample_rate: u32,
    channels: usize,
    enabled: Arc<AtomicBool>,
    tx: mpsc::Sender<AudioBlock>,
}

impl BlockAssembler {
    fn push_interleaved<T>(&mut self, data: &[T])
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let enabled = self.enabled.load(Ordering::Relaxed);

        for frame in data.chunks(self.channels) {
            let mono = if enabled {
                frame.iter().map(|s| s.to_sample::<f32>()).sum::<f32>() / frame.len() as f32
            } else {
                0.0
            };
            self.pending.push(mono);

            if self.pending.len() == self.block_size {
                let samples =
                    std::mem::replace(&mut self.pending, Vec::with_capacity(self.block_size));
                let block = AudioBlock {
                    samples,
                    sample_rate: self.sample_rate,
                };
                match self.tx.try_send(block) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!("Capture channel full, dropping block");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("Capture channel closed");
                    }
                }
            }
        }
    }
}

pub struct CpalMicrophone {
    config: AudioBackendConfig,
    enabled: Arc<AtomicBool>,
    sample_rate: u32,
    device_name: String,
    stream: Option<StreamThread>,
}

impl CpalMicrophone {
    pub fn new(config: AudioBackendConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoMicrophoneFound)?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let supported = device
            .default_input_config()
            .map_err(|e| AudioError::DeviceInitFailed(e.to_string()))?;

        info!(
            "Microphone backend initialized: {} ({}Hz, {} channels)",
            device_name,
            supported.sample_rate().0,
            supported.channels()
        );

        Ok(Self {
            config,
            enabled: Arc::new(AtomicBool::new(true)),
            sample_rate: supported.sample_rate().0,
            device_name,
            stream: None,
        })
    }
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut assembler: BlockAssembler,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| assembler.push_interleaved(data),
            |err| error!("Microphone stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamStartFailed(e.to_string()))
}

#[async_trait::async_trait]
impl MicrophoneBackend for CpalMicrophone {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioBlock>, AudioError> {
        if self.stream.is_some() {
            return Err(AudioError::AlreadyCapturing);
        }

        info!("Starting microphone capture on {}", self.device_name);

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let enabled = Arc::clone(&self.enabled);
        let block_size = self.config.block_size;

        let thread = StreamThread::spawn("mic-stream", move || {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or(AudioError::NoMicrophoneFound)?;
            let supported = device
                .default_input_config()
                .map_err(|e| AudioError::DeviceInitFailed(e.to_string()))?;
            let sample_format = supported.sample_format();
            let config: cpal::StreamConfig = supported.into();

            let assembler = BlockAssembler {
                pending: Vec::with_capacity(block_size),
                block_size,
                sample_rate: config.sample_rate.0,
                channels: config.channels.max(1) as usize,
                enabled,
                tx,
            };

            let stream = match sample_format {
                cpal::SampleFormat::F32 => build_input::<f32>(&device, &config, assembler)?,
                cpal::SampleFormat::I16 => build_input::<i16>(&device, &config, assembler)?,
                cpal::SampleFormat::U16 => build_input::<u16>(&device, &config, assembler)?,
                other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
            };

            stream
                .play()
                .map_err(|e| AudioError::StreamStartFailed(e.to_string()))?;
            Ok(stream)
        })?;

        self.stream = Some(thread);

        info!("Microphone capture started at {}Hz", self.sample_rate);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(mut thread) = self.stream.take() {
            info!("Stopping microphone capture");
            thread.stop();
        }
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

// ============================================================================
// Output
// ============================================================================

struct ScheduledBuffer {
    start_frame: u64,
    samples: Vec<f32>,
}

impl ScheduledBuffer {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Frame-accurate playback timeline shared with the output callback
#[derive(Default)]
struct Timeline {
    rendered_frames: u64,
    suspended: bool,
    closed: bool,
    buffers: VecDeque<ScheduledBuffer>,
}

impl Timeline {
    /// Queue a buffer, keeping the queue ordered by start frame
    fn schedule(&mut self, start_frame: u64, samples: Vec<f32>) -> Result<(), AudioError> {
        if self.closed {
            return Err(AudioError::Closed);
        }
        let index = self
            .buffers
            .partition_point(|b| b.start_frame <= start_frame);
        self.buffers.insert(index, ScheduledBuffer {
            start_frame,
            samples,
        });
        Ok(())
    }

    fn render<T>(&mut self, out: &mut [T], channels: usize)
    where
        T: SizedSample + FromSample<f32>,
    {
        if self.suspended || self.closed {
            out.fill(T::EQUILIBRIUM);
            return;
        }

        let frames = out.len() / channels;
        for (i, frame) in out.chunks_mut(channels).enumerate() {
            let t = self.rendered_frames + i as u64;
            let mut mixed = 0.0f32;
            for buffer in &self.buffers {
                if buffer.start_frame > t {
                    break;
                }
                if t < buffer.end_frame() {
                    mixed += buffer.samples[(t - buffer.start_frame) as usize];
                }
            }
            let value = T::from_sample(mixed.clamp(-1.0, 1.0));
            frame.fill(value);
        }

        self.rendered_frames += frames as u64;
        let now = self.rendered_frames;
        self.buffers.retain(|b| b.end_frame() > now);
    }
}

/// First frame and frame count a chunk occupies on the device timeline
///
/// Both ends are floored, so a chunk starting where the previous one ended
/// begins on exactly the frame after it.
fn frame_span(start_at: f64, duration: f64, device_rate: u32) -> (u64, usize) {
    let rate = device_rate as f64;
    let start = (start_at * rate).floor().max(0.0) as u64;
    let end = ((start_at + duration) * rate).floor().max(0.0) as u64;
    (start, end.saturating_sub(start) as usize)
}

/// Trim or extend (holding the last sample) to exactly `frames` samples
fn fit_to_frames(samples: &mut Vec<f32>, frames: usize) {
    let hold = samples.last().copied().unwrap_or(0.0);
    samples.resize(frames, hold);
}

pub struct CpalOutput {
    timeline: Arc<Mutex<Timeline>>,
    device_rate: u32,
    stream: Mutex<Option<StreamThread>>,
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    timeline: Arc<Mutex<Timeline>>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| match timeline.lock() {
                Ok(mut timeline) => timeline.render(data, channels),
                Err(_) => data.fill(T::EQUILIBRIUM),
            },
            |err| error!("Output stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamStartFailed(e.to_string()))
}

impl CpalOutput {
    pub fn new(_config: &AudioBackendConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoOutputDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInitFailed(e.to_string()))?;
        let device_rate = supported.sample_rate().0;

        info!(
            "Output backend initialized: {} ({}Hz, {} channels)",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            device_rate,
            supported.channels()
        );

        let timeline = Arc::new(Mutex::new(Timeline::default()));
        let stream_timeline = Arc::clone(&timeline);

        let thread = StreamThread::spawn("output-stream", move || {
            let host = cpal::default_host();
            let device = host.default_output_device().ok_or(AudioError::NoOutputDevice)?;
            let supported = device
                .default_output_config()
                .map_err(|e| AudioError::DeviceInitFailed(e.to_string()))?;
            let sample_format = supported.sample_format();
            let config: cpal::StreamConfig = supported.into();

            let stream = match sample_format {
                cpal::SampleFormat::F32 => build_output::<f32>(&device, &config, stream_timeline)?,
                cpal::SampleFormat::I16 => build_output::<i16>(&device, &config, stream_timeline)?,
                cpal::SampleFormat::U16 => build_output::<u16>(&device, &config, stream_timeline)?,
                other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
            };

            stream
                .play()
                .map_err(|e| AudioError::StreamStartFailed(e.to_string()))?;
            Ok(stream)
        })?;

        Ok(Self {
            timeline,
            device_rate,
            stream: Mutex::new(Some(thread)),
        })
    }

    fn with_timeline<R>(&self, f: impl FnOnce(&mut Timeline) -> R) -> Result<R, AudioError> {
        let mut timeline = self
            .timeline
            .lock()
            .map_err(|_| AudioError::ClockControl("timeline lock poisoned".to_string()))?;
        Ok(f(&mut timeline))
    }
}

#[async_trait::async_trait]
impl AudioOutput for CpalOutput {
    fn current_time(&self) -> f64 {
        self.with_timeline(|t| t.rendered_frames as f64 / self.device_rate as f64)
            .unwrap_or(0.0)
    }

    fn is_suspended(&self) -> bool {
        self.with_timeline(|t| t.suspended).unwrap_or(true)
    }

    async fn resume(&self) -> Result<(), AudioError> {
        self.with_timeline(|t| {
            if t.closed {
                return Err(AudioError::Closed);
            }
            t.suspended = false;
            Ok(())
        })?
    }

    async fn suspend(&self) -> Result<(), AudioError> {
        self.with_timeline(|t| {
            if t.closed {
                return Err(AudioError::Closed);
            }
            t.suspended = true;
            Ok(())
        })?
    }

    fn schedule(&self, samples: Vec<f32>, sample_rate: u32, start_at: f64) -> Result<(), AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::UnsupportedFormat("sample rate 0".to_string()));
        }

        let duration = samples.len() as f64 / sample_rate as f64;
        let (start_frame, frames) = frame_span(start_at, duration, self.device_rate);
        let mut samples = resample(&samples, sample_rate, self.device_rate).into_owned();
        fit_to_frames(&mut samples, frames);

        self.with_timeline(|t| t.schedule(start_frame, samples))?
    }

    async fn close(&self) -> Result<(), AudioError> {
        self.with_timeline(|t| {
            t.closed = true;
            t.buffers.clear();
        })?;

        let thread = self
            .stream
            .lock()
            .map_err(|_| AudioError::ClockControl("stream lock poisoned".to_string()))?
            .take();
        if let Some(mut thread) = thread {
            info!("Closing audio output");
            thread.stop();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "cpal output"
    }
}

/// Default host devices via cpal
pub struct CpalBackendFactory;

impl AudioBackendFactory for CpalBackendFactory {
    fn create_output(&self, config: &AudioBackendConfig) -> Result<Arc<dyn AudioOutput>, AudioError> {
        Ok(Arc::new(CpalOutput::new(config)?))
    }

    fn create_microphone(
        &self,
        config: &AudioBackendConfig,
    ) -> Result<Box<dyn MicrophoneBackend>, AudioError> {
        Ok(Box::new(CpalMicrophone::new(config.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler(block_size: usize, channels: usize) -> (BlockAssembler, mpsc::Receiver<AudioBlock>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel(8);
        let enabled = Arc::new(AtomicBool::new(true));
        let assembler = BlockAssembler {
            pending: Vec::new(),
            block_size,
            sample_rate: 48000,
            channels,
            enabled: Arc::clone(&enabled),
            tx,
        };
        (assembler, rx, enabled)
    }

    #[test]
    fn test_assembler_downmixes_stereo() {
        let (mut assembler, mut rx, _) = assembler(2, 2);

        assembler.push_interleaved(&[0.2f32, 0.4, -1.0, 0.0]);

        let block = rx.try_recv().unwrap();
        assert_eq!(block.sample_rate, 48000);
        assert!((block.samples[0] - 0.3).abs() < 1e-6);
        assert!((block.samples[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_assembler_emits_full_blocks_only() {
        let (mut assembler, mut rx, _) = assembler(4, 1);

        assembler.push_interleaved(&[0.1f32; 6]);
        assert_eq!(rx.try_recv().unwrap().samples.len(), 4);
        assert!(rx.try_recv().is_err());

        assembler.push_interleaved(&[0.1f32; 2]);
        assert_eq!(rx.try_recv().unwrap().samples.len(), 4);
    }

    #[test]
    fn test_disabled_assembler_emits_silence() {
        let (mut assembler, mut rx, enabled) = assembler(4, 1);
        enabled.store(false, Ordering::Relaxed);

        assembler.push_interleaved(&[i16::MAX; 4]);

        let block = rx.try_recv().unwrap();
        assert!(block.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_suspended_timeline_holds_the_clock() {
        let mut timeline = Timeline {
            suspended: true,
            ..Timeline::default()
        };
        timeline.schedule(0, vec![0.5; 4]).unwrap();

        let mut out = [1.0f32; 4];
        timeline.render(&mut out, 1);

        assert_eq!(out, [0.0; 4]);
        assert_eq!(timeline.rendered_frames, 0);
        assert_eq!(timeline.buffers.len(), 1);
    }

    #[test]
    fn test_timeline_plays_buffers_at_their_start_frame() {
        let mut timeline = Timeline::default();
        // Scheduled out of order
        timeline.schedule(4, vec![0.25; 2]).unwrap();
        timeline.schedule(1, vec![0.5; 2]).unwrap();

        let mut out = [0.0f32; 8];
        timeline.render(&mut out, 1);

        assert_eq!(out, [0.0, 0.5, 0.5, 0.0, 0.25, 0.25, 0.0, 0.0]);
        assert_eq!(timeline.rendered_frames, 8);
        assert!(timeline.buffers.is_empty());
    }

    #[test]
    fn test_timeline_fills_every_channel() {
        let mut timeline = Timeline::default();
        timeline.schedule(0, vec![0.5]).unwrap();

        let mut out = [0.0f32; 4];
        timeline.render(&mut out, 2);

        assert_eq!(out, [0.5, 0.5, 0.0, 0.0]);
        assert_eq!(timeline.rendered_frames, 2);
    }

    #[test]
    fn test_consecutive_chunks_share_frame_boundaries() {
        // 1001 samples at 24kHz do not divide evenly into 44.1kHz frames
        let duration = 1001.0 / 24000.0;
        let mut start_at = 0.0;
        let mut expected_start = 0;

        for _ in 0..50 {
            let (start, frames) = frame_span(start_at, duration, 44100);
            assert_eq!(start, expected_start);
            expected_start = start + frames as u64;
            start_at += duration;
        }
    }

    #[test]
    fn test_resampled_chunk_fits_its_span() {
        let (_, frames) = frame_span(0.0, 1001.0 / 24000.0, 44100);
        assert_eq!(frames, 1839);

        let mut samples = resample(&[0.5; 1001], 24000, 44100).into_owned();
        assert_eq!(samples.len(), 1840);
        fit_to_frames(&mut samples, frames);
        assert_eq!(samples.len(), 1839);

        let mut short = vec![0.1, 0.2];
        fit_to_frames(&mut short, 4);
        assert_eq!(short, vec![0.1, 0.2, 0.2, 0.2]);
    }

    #[test]
    fn test_adjacent_chunks_do_not_overlap_when_rendered() {
        let duration = 1001.0 / 24000.0;
        let mut timeline = Timeline::default();

        for i in 0..2 {
            let (start, frames) = frame_span(i as f64 * duration, duration, 44100);
            let mut samples = resample(&[0.5; 1001], 24000, 44100).into_owned();
            fit_to_frames(&mut samples, frames);
            timeline.schedule(start, samples).unwrap();
        }

        let mut out = vec![0.0f32; 4000];
        timeline.render(&mut out, 1);

        assert!(out.iter().all(|&s| s <= 0.5 + 1e-6));
    }

    #[test]
    fn test_closed_timeline_rejects_buffers() {
        let mut timeline = Timeline {
            closed: true,
            ..Timeline::default()
        };
        assert!(matches!(timeline.schedule(0, vec![0.1]), Err(AudioError::Closed)));
    }
}
