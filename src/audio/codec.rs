//! Speech codec seams: encoder, decoder, and the factory the pipeline uses
//! to build both at start-up.

use anyhow::Result;

use super::frame::{ENCODE_SAMPLE_RATE, FRAME_DURATION_MS};

/// Stateful speech encoder. Used from one thread at a time.
pub trait SpeechEncoder: Send {
    /// Encode one frame of mono PCM into `out`, returning the packet length.
    /// A zero length means the encoder produced no packet for this frame.
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize>;
}

/// Stateful speech decoder. Used from one thread at a time.
pub trait SpeechDecoder: Send {
    /// Decode one packet into `out`, returning the number of samples written.
    fn decode(&mut self, packet: &[u8], out: &mut [i16]) -> Result<usize>;
}

/// Fixed encoder configuration of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub sample_rate: u32,
    pub frame_duration_ms: u32,
    /// Bits per second.
    pub bitrate: i32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            sample_rate: ENCODE_SAMPLE_RATE,
            frame_duration_ms: FRAME_DURATION_MS,
            bitrate: 24000,
        }
    }
}

/// Builds codec instances for one pipeline run.
pub trait CodecProvider: Send + Sync {
    fn create_encoder(&self, settings: &EncoderSettings) -> Result<Box<dyn SpeechEncoder>>;

    /// Mono decoder producing PCM at `sample_rate`.
    fn create_decoder(&self, sample_rate: u32) -> Result<Box<dyn SpeechDecoder>>;
}
