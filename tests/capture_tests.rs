// Tests for the microphone -> realtime input pipeline

use digiverifier::audio::codec::decode_float_payload;
use digiverifier::audio::{AudioBlock, CapturePipeline, LevelMeter};
use digiverifier::live::ClientMessage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

fn block(value: f32, len: usize, sample_rate: u32) -> AudioBlock {
    AudioBlock {
        samples: vec![value; len],
        sample_rate,
    }
}

#[test]
fn test_block_is_resampled_to_16k() {
    let pipeline = CapturePipeline::new(16000, Arc::new(LevelMeter::new()));
    let media = pipeline.encode_block(&block(0.2, 4096, 48000));

    assert_eq!(media.mime_type, "audio/pcm;rate=16000");
    assert!(!media.data.is_empty());
    assert_eq!(decode_float_payload(&media.data).unwrap().len(), 1366);
}

#[test]
fn test_block_at_target_rate_keeps_length() {
    let pipeline = CapturePipeline::new(16000, Arc::new(LevelMeter::new()));
    let media = pipeline.encode_block(&block(0.2, 4096, 16000));

    assert_eq!(decode_float_payload(&media.data).unwrap().len(), 4096);
}

#[test]
fn test_silent_block_encodes_zero_samples() {
    let pipeline = CapturePipeline::new(16000, Arc::new(LevelMeter::new()));
    let media = pipeline.encode_block(&block(0.0, 4096, 48000));

    let samples = decode_float_payload(&media.data).unwrap();
    assert!(samples.iter().all(|&s| s == 0.0));
}

#[test]
fn test_input_meter_observes_blocks() {
    let meter = Arc::new(LevelMeter::new());
    let pipeline = CapturePipeline::new(16000, meter.clone());

    pipeline.encode_block(&block(-0.25, 1024, 48000));

    assert!((meter.reading().peak - 0.25).abs() < 1e-6);
}

#[tokio::test]
async fn test_run_forwards_blocks_in_order() {
    let pipeline = CapturePipeline::new(16000, Arc::new(LevelMeter::new()));
    let (block_tx, block_rx) = mpsc::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(8);
    let sent = Arc::new(AtomicUsize::new(0));

    let task = tokio::spawn(pipeline.run(block_rx, out_tx, sent.clone()));

    block_tx.send(block(0.1, 300, 48000)).await.unwrap();
    block_tx.send(block(0.1, 600, 48000)).await.unwrap();
    drop(block_tx);
    task.await.unwrap();

    let mut lengths = Vec::new();
    while let Some(message) = out_rx.recv().await {
        let ClientMessage::RealtimeInput(input) = message else {
            panic!("unexpected message");
        };
        assert_eq!(input.media_chunks.len(), 1);
        lengths.push(decode_float_payload(&input.media_chunks[0].data).unwrap().len());
    }

    assert_eq!(lengths, vec![100, 200]);
    assert_eq!(sent.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_run_stops_when_outbound_closes() {
    let pipeline = CapturePipeline::new(16000, Arc::new(LevelMeter::new()));
    let (block_tx, block_rx) = mpsc::channel(8);
    let (out_tx, out_rx) = mpsc::channel(8);
    drop(out_rx);

    let task = tokio::spawn(pipeline.run(block_rx, out_tx, Arc::new(AtomicUsize::new(0))));
    block_tx.send(block(0.1, 300, 48000)).await.unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(2), task)
        .await
        .expect("pipeline kept running")
        .unwrap();
}
