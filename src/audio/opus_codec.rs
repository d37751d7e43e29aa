//! Opus encoder/decoder adapters.
//!
//! - Encoder: 16kHz mono PCM frame → Opus packet
//! - Decoder: Opus packet → mono PCM at the playback rate
//!
//! Opus resamples internally to any of its supported rates, so neither side
//! needs an extra resampling stage.

use anyhow::Result;

use super::codec::{CodecProvider, EncoderSettings, SpeechDecoder, SpeechEncoder};

// ======================== Opus Encoder ========================

pub struct OpusEncoder {
    encoder: opus::Encoder,
    frame_samples: usize,
}

impl OpusEncoder {
    /// Create a mono voice encoder.
    ///
    /// * `settings.sample_rate`       - Codec sample rate (e.g. 16000)
    /// * `settings.frame_duration_ms` - Frame duration in ms (e.g. 60)
    /// * `settings.bitrate`           - Bitrate in bits/s (e.g. 24000)
    pub fn new(settings: &EncoderSettings) -> Result<Self> {
        let mut encoder = opus::Encoder::new(
            settings.sample_rate,
            opus::Channels::Mono,
            opus::Application::Voip,
        )?;
        encoder.set_bitrate(opus::Bitrate::Bits(settings.bitrate))?;

        let frame_samples = (settings.sample_rate * settings.frame_duration_ms / 1000) as usize;
        log::info!(
            "Opus encoder: {}Hz mono, {}ms, {}bps, frame_samples={}",
            settings.sample_rate,
            settings.frame_duration_ms,
            settings.bitrate,
            frame_samples,
        );

        Ok(Self {
            encoder,
            frame_samples,
        })
    }
}

impl SpeechEncoder for OpusEncoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize> {
        if pcm.len() != self.frame_samples {
            anyhow::bail!(
                "Opus encoder expects {} samples, got {}",
                self.frame_samples,
                pcm.len()
            );
        }
        Ok(self.encoder.encode(pcm, out)?)
    }
}

// ======================== Opus Decoder ========================

pub struct OpusDecoder {
    decoder: opus::Decoder,
}

impl OpusDecoder {
    pub fn new(sample_rate: u32) -> Result<Self> {
        let decoder = opus::Decoder::new(sample_rate, opus::Channels::Mono)?;
        log::info!("Opus decoder: {}Hz mono", sample_rate);
        Ok(Self { decoder })
    }
}

impl SpeechDecoder for OpusDecoder {
    fn decode(&mut self, packet: &[u8], out: &mut [i16]) -> Result<usize> {
        Ok(self.decoder.decode(packet, out, false)?)
    }
}

// ======================== Provider ========================

/// Production codec factory.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpusCodecs;

impl CodecProvider for OpusCodecs {
    fn create_encoder(&self, settings: &EncoderSettings) -> Result<Box<dyn SpeechEncoder>> {
        Ok(Box::new(OpusEncoder::new(settings)?))
    }

    fn create_decoder(&self, sample_rate: u32) -> Result<Box<dyn SpeechDecoder>> {
        Ok(Box::new(OpusDecoder::new(sample_rate)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frame::{DECODE_FRAME_CAPACITY, ENCODE_FRAME_SAMPLES, ENCODE_OUTPUT_SIZE};

    #[test]
    fn test_encode_then_decode_frame_size() {
        let mut encoder = OpusCodecs.create_encoder(&EncoderSettings::default()).unwrap();
        let mut decoder = OpusCodecs.create_decoder(24000).unwrap();

        let pcm: Vec<i16> = (0..ENCODE_FRAME_SAMPLES)
            .map(|i| ((i as f32 * 0.05).sin() * 8000.0) as i16)
            .collect();
        let mut packet = vec![0u8; ENCODE_OUTPUT_SIZE];
        let len = encoder.encode(&pcm, &mut packet).unwrap();
        assert!(len > 0);

        let mut out = vec![0i16; DECODE_FRAME_CAPACITY];
        let samples = decoder.decode(&packet[..len], &mut out).unwrap();
        // 60ms @ 24kHz
        assert_eq!(samples, 1440);
    }

    #[test]
    fn test_encoder_rejects_wrong_frame_size() {
        let mut encoder = OpusEncoder::new(&EncoderSettings::default()).unwrap();
        let mut packet = vec![0u8; ENCODE_OUTPUT_SIZE];
        assert!(encoder.encode(&[0i16; 100], &mut packet).is_err());
    }

    #[test]
    fn test_unsupported_rate_fails() {
        assert!(OpusCodecs.create_decoder(44100).is_err());
    }
}
