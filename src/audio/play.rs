use std::sync::Arc;
use std::time::Duration;

use super::audio_system::{AudioConfig, Shared};
use super::frame::PcmFrame;
use super::pool::Pooled;
use super::port::AudioPort;
use super::queue::FrameQueue;
use super::stats::Counter;

/// Amplifier power state of the playback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmpState {
    Muted,
    /// Powered on, lead-in silence being written.
    Unmuting,
    Unmuted,
    /// Idle threshold reached, flushing what is left before powering off.
    Draining,
}

/// Playback thread body: playback queue → port, with amplifier hysteresis.
///
/// The output path stays fed with silence while unmuted so the DMA never
/// underruns; the amplifier is only powered off after a run of empty cycles.
pub(crate) struct PlaybackTask {
    port: Arc<dyn AudioPort>,
    shared: Arc<Shared>,
    queue: FrameQueue<Pooled<PcmFrame>>,
    state: AmpState,
    idle_ticks: u32,
    /// ~10ms of zeros at the output rate
    silence: Vec<i16>,
    poll: Duration,
    lead_in_chunks: u32,
    idle_ticks_before_mute: u32,
}

impl PlaybackTask {
    pub(crate) fn new(
        port: Arc<dyn AudioPort>,
        shared: Arc<Shared>,
        queue: FrameQueue<Pooled<PcmFrame>>,
        config: &AudioConfig,
    ) -> Self {
        let chunk = (port.output_sample_rate() as usize / 100).max(1);
        Self {
            port,
            shared,
            queue,
            state: AmpState::Muted,
            idle_ticks: 0,
            silence: vec![0i16; chunk],
            poll: config.playback_poll,
            lead_in_chunks: config.lead_in_chunks,
            idle_ticks_before_mute: config.idle_ticks_before_mute.max(1),
        }
    }

    pub(crate) fn run(mut self) {
        log::info!(
            "Playback started: rate={}, silence_chunk={}",
            self.port.output_sample_rate(),
            self.silence.len(),
        );
        while self.shared.is_running() {
            self.tick();
        }
        if self.state != AmpState::Muted {
            self.port.enable_output(false);
        }
        log::info!("Playback stopped");
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> AmpState {
        self.state
    }

    /// One output cycle.
    pub(crate) fn tick(&mut self) {
        match self.queue.pop_timeout(self.poll) {
            Some(block) => {
                if self.state == AmpState::Muted {
                    self.unmute();
                }
                self.idle_ticks = 0;
                self.play(block);
            }
            None if self.state == AmpState::Unmuted => {
                self.port.write(&self.silence);
                self.idle_ticks += 1;
                if self.idle_ticks >= self.idle_ticks_before_mute {
                    self.drain_and_mute();
                }
            }
            None => {}
        }
    }

    fn unmute(&mut self) {
        self.state = AmpState::Unmuting;
        self.port.enable_output(true);
        // Let the amp settle before real audio
        for _ in 0..self.lead_in_chunks {
            self.port.write(&self.silence);
        }
        self.state = AmpState::Unmuted;
        log::info!(
            "Amp unmuted ({}ms lead-in)",
            self.lead_in_chunks as u64 * 10,
        );
    }

    fn drain_and_mute(&mut self) {
        self.state = AmpState::Draining;
        while let Some(block) = self.queue.try_pop() {
            self.play(block);
        }
        self.port.enable_output(false);
        self.idle_ticks = 0;
        self.state = AmpState::Muted;

        let session = self.shared.stats.finish_session();
        log::warn!("STATS: {}", session);
        log::info!(
            "Amp muted after {}ms idle",
            self.idle_ticks_before_mute as u128 * self.poll.as_millis(),
        );
    }

    fn play(&mut self, block: Pooled<PcmFrame>) {
        self.port.write(block.as_slice());
        self.shared.stats.incr(Counter::Played);
    }
}
