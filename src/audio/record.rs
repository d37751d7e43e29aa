use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::audio_system::Shared;
use super::frame::{ENCODE_FRAME_SAMPLES, ENCODE_SAMPLE_RATE, PcmFrame, frame_samples};
use super::pool::{BufferPool, Pooled};
use super::port::AudioPort;
use super::queue::FrameQueue;
use super::resample::resample_linear;
use super::stats::Counter;

/// Capture thread body: port → 60ms frames at the encoder rate → encode queue.
pub(crate) struct CaptureTask {
    port: Arc<dyn AudioPort>,
    shared: Arc<Shared>,
    encode_queue: FrameQueue<Pooled<PcmFrame>>,
    pool: BufferPool<PcmFrame>,
    native_rate: u32,
    /// ~10ms of samples at the port rate
    read_chunk: usize,
    /// One frame at the port rate
    accum: Vec<i16>,
    accumulated: usize,
    idle_poll: Duration,
}

impl CaptureTask {
    pub(crate) fn new(
        port: Arc<dyn AudioPort>,
        shared: Arc<Shared>,
        encode_queue: FrameQueue<Pooled<PcmFrame>>,
        pool: BufferPool<PcmFrame>,
        idle_poll: Duration,
    ) -> Self {
        let native_rate = port.input_sample_rate();
        let native_frame = frame_samples(native_rate).max(2);
        let read_chunk = (native_rate as usize / 100).clamp(1, native_frame);
        Self {
            port,
            shared,
            encode_queue,
            pool,
            native_rate,
            read_chunk,
            accum: vec![0i16; native_frame],
            accumulated: 0,
            idle_poll,
        }
    }

    pub(crate) fn run(mut self) {
        log::info!(
            "Capture started: port_rate={}, port_frame={}, read_chunk={}",
            self.native_rate,
            self.accum.len(),
            self.read_chunk,
        );
        while self.shared.is_running() {
            self.run_once();
        }
        log::info!("Capture stopped");
    }

    /// One slice of work: either an idle poll or one ~10ms read.
    pub(crate) fn run_once(&mut self) {
        if !self.shared.is_recording() {
            self.accumulated = 0;
            thread::sleep(self.idle_poll);
            return;
        }

        let end = (self.accumulated + self.read_chunk).min(self.accum.len());
        self.port.read(&mut self.accum[self.accumulated..end]);
        self.accumulated = end;

        if self.accumulated == self.accum.len() {
            self.emit_frame();
            self.accumulated = 0;
        }
    }

    fn emit_frame(&mut self) {
        let Some(mut frame) = self.pool.acquire() else {
            self.shared.stats.incr(Counter::CaptureDropped);
            return;
        };

        let out = &mut frame.buffer_mut()[..ENCODE_FRAME_SAMPLES];
        if self.native_rate == ENCODE_SAMPLE_RATE {
            out.copy_from_slice(&self.accum[..ENCODE_FRAME_SAMPLES]);
        } else {
            resample_linear(&self.accum, self.native_rate, out, ENCODE_SAMPLE_RATE);
        }
        frame.set_count(ENCODE_FRAME_SAMPLES);

        // Capture never waits on the encoder.
        if self.encode_queue.try_push(frame).is_err() {
            self.shared.stats.incr(Counter::CaptureDropped);
            log::debug!("Encode queue full, captured frame dropped");
        }
    }
}
