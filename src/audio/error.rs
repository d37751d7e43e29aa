//! Errors reported by [`AudioSystem::start`](super::AudioSystem::start).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline already running")]
    AlreadyRunning,

    #[error("Unsupported decode sample rate: {0}Hz")]
    UnsupportedSampleRate(u32),

    #[error("Failed to create speech encoder: {0:#}")]
    EncoderInit(#[source] anyhow::Error),

    #[error("Failed to create speech decoder: {0:#}")]
    DecoderInit(#[source] anyhow::Error),

    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}
