// PCM16 <-> float conversion and the base64 transport encoding used on the wire

use base64::Engine;
use thiserror::Error;

/// Scale applied to negative samples (two's-complement range is one wider below zero)
const NEGATIVE_SCALE: f32 = 32768.0;
/// Scale applied to zero and positive samples
const POSITIVE_SCALE: f32 = 32767.0;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid transport payload: {0}")]
    Transport(#[from] base64::DecodeError),

    #[error("PCM16 payload has odd length ({0} bytes)")]
    OddLength(usize),
}

/// Convert normalized float samples to 16-bit PCM
///
/// Samples are clamped to [-1.0, 1.0] and truncated toward zero after scaling.
pub fn float_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let s = s.clamp(-1.0, 1.0);
            if s < 0.0 {
                (s * NEGATIVE_SCALE) as i16
            } else {
                (s * POSITIVE_SCALE) as i16
            }
        })
        .collect()
}

/// Convert 16-bit PCM back to normalized float samples
pub fn pcm16_to_float(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| {
            if s < 0 {
                s as f32 / NEGATIVE_SCALE
            } else {
                s as f32 / POSITIVE_SCALE
            }
        })
        .collect()
}

/// Serialize PCM16 samples as little-endian bytes
pub fn pcm16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Parse little-endian bytes into PCM16 samples
pub fn le_bytes_to_pcm16(bytes: &[u8]) -> Result<Vec<i16>, CodecError> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::OddLength(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect())
}

pub fn encode_transport(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn decode_transport(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(base64::engine::general_purpose::STANDARD.decode(text)?)
}

/// Float samples -> PCM16 -> transport text, the outbound encoding in one step
pub fn encode_float_payload(samples: &[f32]) -> String {
    encode_transport(&pcm16_to_le_bytes(&float_to_pcm16(samples)))
}

/// Transport text -> PCM16 -> float samples, the inbound decoding in one step
pub fn decode_float_payload(text: &str) -> Result<Vec<f32>, CodecError> {
    let bytes = decode_transport(text)?;
    let pcm = le_bytes_to_pcm16(&bytes)?;
    Ok(pcm16_to_float(&pcm))
}

/// MIME type declared alongside a PCM16 transport payload
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={}", sample_rate)
}

/// Extract the `rate=` parameter from a PCM MIME type, if present
pub fn parse_pcm_rate(mime_type: &str) -> Option<u32> {
    if !mime_type.starts_with("audio/pcm") {
        return None;
    }

    mime_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
}
