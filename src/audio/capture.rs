use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::backend::AudioBlock;
use super::codec::{encode_float_payload, pcm_mime_type};
use super::meter::LevelMeter;
use super::resample::resample;
use crate::live::{Blob, ClientMessage};

/// Turns microphone blocks into realtime media messages
///
/// Block -> resample to the target rate -> PCM16 -> base64, tagged with
/// `audio/pcm;rate=<target>`.
pub struct CapturePipeline {
    target_rate: u32,
    mime_type: String,
    meter: Arc<LevelMeter>,
}

impl CapturePipeline {
    pub fn new(target_rate: u32, meter: Arc<LevelMeter>) -> Self {
        Self {
            target_rate,
            mime_type: pcm_mime_type(target_rate),
            meter,
        }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    pub fn encode_block(&self, block: &AudioBlock) -> Blob {
        self.meter.observe(&block.samples);

        let resampled = resample(&block.samples, block.sample_rate, self.target_rate);

        Blob {
            mime_type: self.mime_type.clone(),
            data: encode_float_payload(&resampled),
        }
    }

    /// Forward every block, in order, until the microphone or the outbound stream closes
    pub async fn run(
        self,
        mut blocks: mpsc::Receiver<AudioBlock>,
        outbound: mpsc::Sender<ClientMessage>,
        blocks_sent: Arc<AtomicUsize>,
    ) {
        info!("Capture pipeline started ({}Hz out)", self.target_rate);

        while let Some(block) = blocks.recv().await {
            let media = self.encode_block(&block);
            let bytes = media.data.len();

            if outbound.send(ClientMessage::realtime_media(media)).await.is_err() {
                info!("Outbound stream closed, stopping capture pipeline");
                break;
            }

            let seq = blocks_sent.fetch_add(1, Ordering::Relaxed);
            debug!("Sent capture block {} ({} transport bytes)", seq, bytes);
        }

        info!("Capture pipeline stopped");
    }
}
