//! audio - Real-time speech pipeline between an audio port and the network
//!
//! Three OS threads move fixed-size buffers through bounded queues:
//! capture (port → 16kHz frames), codec (encode and decode), and playback
//! (decoded frames → port, with amplifier power management). The network
//! side only sees `push_compressed_for_decode` and the outgoing callback.

#[cfg(feature = "alsa")]
mod alsa_device;
mod audio_system;
pub mod codec;
mod codec_task;
mod error;
pub mod frame;
mod memory_port;
#[cfg(feature = "opus")]
mod opus_codec;
mod play;
pub mod pool;
mod port;
pub mod queue;
mod record;
pub mod resample;
pub mod stats;

#[cfg(feature = "alsa")]
pub use alsa_device::{AlsaConfig, AlsaPort};
pub use audio_system::{AudioConfig, AudioSystem, PacketCallback, QueueLevels};
pub use codec::{CodecProvider, EncoderSettings, SpeechDecoder, SpeechEncoder};
pub use error::{PipelineError, Result};
pub use memory_port::MemoryPort;
#[cfg(feature = "opus")]
pub use opus_codec::{OpusCodecs, OpusDecoder, OpusEncoder};
pub use play::AmpState;
pub use port::AudioPort;
pub use stats::StatsSnapshot;
