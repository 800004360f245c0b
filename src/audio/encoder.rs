//! Wire encoding for audio payloads.
//!
//! The relay exchanges mono 16-bit little-endian PCM, base64-encoded.
//! Encoding quantizes float samples in [-1, 1]; decoding reconstructs them
//! within one quantization step (1/32768). Both directions are deterministic.

use base64::Engine;

use crate::audio::capture::AudioFrame;
use crate::error::{DecodeError, EncodeError};

/// A wire-ready audio frame: base64 16-bit PCM plus its sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFrame {
    /// Base64-encoded 16-bit little-endian PCM
    pub pcm: String,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of samples encoded
    pub sample_count: usize,
}

/// Encode a captured frame for the wire.
///
/// Rejects empty and non-mono frames; samples outside [-1, 1] are clamped.
pub fn encode(frame: &AudioFrame) -> Result<EncodedFrame, EncodeError> {
    if frame.channels != 1 {
        return Err(EncodeError::UnsupportedChannels(frame.channels));
    }
    if frame.samples.is_empty() {
        return Err(EncodeError::EmptyFrame);
    }

    let mut bytes = Vec::with_capacity(frame.samples.len() * 2);
    for (i, &sample) in frame.samples.iter().enumerate() {
        if !sample.is_finite() {
            return Err(EncodeError::NonFiniteSample(i));
        }
        let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&quantized.to_le_bytes());
    }

    Ok(EncodedFrame {
        pcm: base64::engine::general_purpose::STANDARD.encode(&bytes),
        sample_rate: frame.sample_rate,
        sample_count: frame.samples.len(),
    })
}

/// Decode a base64 16-bit PCM payload back into float samples.
pub fn decode(pcm: &str) -> Result<Vec<f32>, DecodeError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(pcm)
        .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;

    if bytes.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddByteLength(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect())
}

/// Number of samples a payload of this base64 length would carry if it were
/// well formed.
///
/// Lets the playback timeline advance past a chunk that failed to decode, so
/// later chunks keep their slots. Returns `None` when the payload is too
/// malformed to size (not a multiple of four characters, or sizes to zero
/// samples).
pub fn nominal_sample_count(pcm: &str) -> Option<usize> {
    if pcm.is_empty() || pcm.len() % 4 != 0 {
        return None;
    }
    let padding = pcm.bytes().rev().take_while(|&b| b == b'=').count();
    let byte_len = (pcm.len() / 4) * 3 - padding.min(2);
    let samples = byte_len / 2;
    if samples == 0 {
        None
    } else {
        Some(samples)
    }
}
