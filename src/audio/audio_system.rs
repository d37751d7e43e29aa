//! The AudioSystem that owns the queues and the three pipeline threads.
//!
//! Uses std::thread (NOT tokio tasks) for real-time audio I/O to avoid
//! contention with async network tasks.
//!
//! ```text
//! port.read → [audio-in] → encode queue ─┐
//!                                        ├→ [audio-codec] → outgoing callback
//! ingress  → decode queue ───────────────┘        │
//!                                          playback queue → [audio-out] → port.write
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::RwLock;

use super::codec::{CodecProvider, EncoderSettings};
use super::codec_task::{CodecTask, Codecs};
use super::error::{PipelineError, Result};
use super::frame::{
    CompressedPacket, DECODE_FRAME_CAPACITY, ENCODE_FRAME_SAMPLES, PcmFrame,
    SUPPORTED_DECODE_RATES, frame_samples,
};
use super::play::PlaybackTask;
use super::pool::{BufferPool, Pooled};
use super::port::AudioPort;
use super::queue::FrameQueue;
use super::record::CaptureTask;
use super::stats::{Counter, PipelineStats, StatsSnapshot};

/// Callback receiving each encoded packet, invoked on the codec thread.
pub type PacketCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Audio pipeline configuration.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Capture → codec queue depth (kept short: stale mic audio is useless)
    pub encode_queue_depth: usize,
    /// Network → codec queue depth
    pub decode_queue_depth: usize,
    /// Codec → speaker queue depth
    pub playback_queue_depth: usize,
    /// Opus bitrate in bits/s for the outgoing stream
    pub encoder_bitrate: i32,
    /// Playback queue wait per output cycle; also the silence chunk period
    pub playback_poll: Duration,
    /// How long a decoded frame may wait for room in the playback queue
    pub playback_push_timeout: Duration,
    /// Codec thread sleep when a loop iteration found no work
    pub codec_idle_sleep: Duration,
    /// Capture thread poll interval while not recording
    pub capture_idle_poll: Duration,
    /// Delay between enabling port input and raising the recording flag
    pub recording_settle: Duration,
    /// Silence chunks written after the amplifier powers on
    pub lead_in_chunks: u32,
    /// Consecutive empty playback cycles before the amplifier is powered off
    pub idle_ticks_before_mute: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            encode_queue_depth: 4,
            decode_queue_depth: 30,
            playback_queue_depth: 20,
            encoder_bitrate: 24000,
            playback_poll: Duration::from_millis(10),
            playback_push_timeout: Duration::from_millis(100),
            codec_idle_sleep: Duration::from_millis(5),
            capture_idle_poll: Duration::from_millis(20),
            recording_settle: Duration::from_millis(20),
            lead_in_chunks: 3,
            idle_ticks_before_mute: 10,
        }
    }
}

/// State shared between the control plane and the pipeline threads.
///
/// Flags use relaxed ordering: threads poll them every cycle, so a change is
/// picked up within one poll interval and nothing depends on it being seen
/// sooner.
pub(crate) struct Shared {
    running: AtomicBool,
    recording: AtomicBool,
    pub(crate) stats: PipelineStats,
    outgoing: RwLock<Option<PacketCallback>>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            recording: AtomicBool::new(false),
            stats: PipelineStats::new(),
            outgoing: RwLock::new(None),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    pub(crate) fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::Relaxed);
    }

    pub(crate) fn set_outgoing_callback(&self, callback: PacketCallback) {
        *self.outgoing.write() = Some(callback);
    }

    /// Clone of the current callback; the lock is released before the call.
    pub(crate) fn outgoing_callback(&self) -> Option<PacketCallback> {
        self.outgoing.read().clone()
    }
}

/// Queue fill levels, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLevels {
    pub encode: usize,
    pub decode: usize,
    pub playback: usize,
}

/// Everything created by `start` and torn down by `stop`.
struct Session {
    decode_sample_rate: u32,
    encode_queue: FrameQueue<Pooled<PcmFrame>>,
    decode_queue: FrameQueue<Pooled<CompressedPacket>>,
    playback_queue: FrameQueue<Pooled<PcmFrame>>,
    packet_pool: BufferPool<CompressedPacket>,
    capture_handle: Option<JoinHandle<()>>,
    codec_handle: Option<JoinHandle<Codecs>>,
    playback_handle: Option<JoinHandle<()>>,
}

/// The audio system manages capture, transcoding and playback in dedicated
/// OS threads.
///
/// - audio-in: port read → resample → encode queue
/// - audio-codec: decode queue → decode → playback queue; encode queue →
///   encode → outgoing callback
/// - audio-out: playback queue → port write, amplifier hysteresis
///
/// Every public operation takes `&self`, so the system can be shared with
/// the network side behind an `Arc`.
pub struct AudioSystem {
    port: Arc<dyn AudioPort>,
    codecs: Arc<dyn CodecProvider>,
    config: AudioConfig,
    shared: Arc<Shared>,
    session: RwLock<Option<Session>>,
}

impl AudioSystem {
    pub fn new(port: Arc<dyn AudioPort>, codecs: Arc<dyn CodecProvider>, config: AudioConfig) -> Self {
        Self {
            port,
            codecs,
            config,
            shared: Arc::new(Shared::new()),
            session: RwLock::new(None),
        }
    }

    /// Build the codecs, allocate queues and buffers, and spawn the threads.
    ///
    /// * `decode_sample_rate` - Playback rate the decoder produces (e.g. 24000)
    pub fn start(&self, decode_sample_rate: u32) -> Result<()> {
        let mut session = self.session.write();
        if session.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }
        if !SUPPORTED_DECODE_RATES.contains(&decode_sample_rate) {
            return Err(PipelineError::UnsupportedSampleRate(decode_sample_rate));
        }
        let decode_frame_samples = frame_samples(decode_sample_rate);

        let settings = EncoderSettings {
            bitrate: self.config.encoder_bitrate,
            ..Default::default()
        };
        let encoder = self
            .codecs
            .create_encoder(&settings)
            .map_err(PipelineError::EncoderInit)?;
        let decoder = self
            .codecs
            .create_decoder(decode_sample_rate)
            .map_err(PipelineError::DecoderInit)?;

        let cfg = &self.config;
        let encode_queue = FrameQueue::new(cfg.encode_queue_depth);
        let decode_queue = FrameQueue::new(cfg.decode_queue_depth);
        let playback_queue = FrameQueue::new(cfg.playback_queue_depth);

        // One spare per stage that can hold a buffer outside its queue.
        let capture_pool = BufferPool::new(cfg.encode_queue_depth + 2, || {
            PcmFrame::with_capacity(ENCODE_FRAME_SAMPLES)
        });
        let decoded_pool = BufferPool::new(cfg.playback_queue_depth + 2, || {
            PcmFrame::with_capacity(DECODE_FRAME_CAPACITY)
        });
        let packet_pool = BufferPool::new(cfg.decode_queue_depth + 2, CompressedPacket::new);

        if self.port.output_sample_rate() != decode_sample_rate {
            log::warn!(
                "Port output rate {}Hz differs from decode rate {}Hz; playback pitch will be off",
                self.port.output_sample_rate(),
                decode_sample_rate,
            );
        }

        log::info!(
            "AudioSystem starting: input: {}Hz, output: {}Hz, encode: {}Hz/{} samples, decode: {}Hz/{} samples",
            self.port.input_sample_rate(),
            self.port.output_sample_rate(),
            settings.sample_rate,
            ENCODE_FRAME_SAMPLES,
            decode_sample_rate,
            decode_frame_samples,
        );

        self.shared.set_running(true);

        let capture = CaptureTask::new(
            self.port.clone(),
            self.shared.clone(),
            encode_queue.clone(),
            capture_pool,
            cfg.capture_idle_poll,
        );
        let codec = CodecTask::new(
            self.shared.clone(),
            Codecs { encoder, decoder },
            encode_queue.clone(),
            decode_queue.clone(),
            playback_queue.clone(),
            decoded_pool,
            decode_frame_samples,
            cfg,
        );
        let playback = PlaybackTask::new(
            self.port.clone(),
            self.shared.clone(),
            playback_queue.clone(),
            cfg,
        );

        let mut new_session = Session {
            decode_sample_rate,
            encode_queue,
            decode_queue,
            playback_queue,
            packet_pool,
            capture_handle: None,
            codec_handle: None,
            playback_handle: None,
        };

        let spawned = (|| -> Result<()> {
            new_session.capture_handle = Some(spawn("audio-in", move || capture.run())?);
            new_session.codec_handle = Some(spawn("audio-codec", move || codec.run())?);
            new_session.playback_handle = Some(spawn("audio-out", move || playback.run())?);
            Ok(())
        })();

        if let Err(e) = spawned {
            log::error!("{}", e);
            self.teardown(new_session);
            return Err(e);
        }

        *session = Some(new_session);
        log::info!("AudioSystem started");
        Ok(())
    }

    /// Stop the threads and release every buffer. Safe to call repeatedly.
    pub fn stop(&self) {
        let Some(session) = self.session.write().take() else {
            return;
        };
        self.teardown(session);
        log::info!("AudioSystem stopped");
    }

    fn teardown(&self, mut session: Session) {
        self.shared.set_running(false);
        if self.shared.is_recording() {
            self.shared.set_recording(false);
            self.port.enable_input(false);
        }

        if let Some(h) = session.capture_handle.take() {
            let _ = h.join();
        }
        if let Some(h) = session.playback_handle.take() {
            let _ = h.join();
        }
        let codecs = session.codec_handle.take().and_then(|h| h.join().ok());

        let released = session.encode_queue.drain()
            + session.decode_queue.drain()
            + session.playback_queue.drain();
        log::info!("Released {} queued buffers", released);

        // Codecs are closed only after nothing can reference their output.
        drop(codecs);
        drop(session);
    }

    /// Ingress for compressed packets from the network. Callable from any
    /// thread; never blocks on the pipeline.
    pub fn push_compressed_for_decode(&self, data: &[u8]) {
        if !CompressedPacket::is_valid_length(data.len()) {
            log::debug!("Rejected packet of {} bytes", data.len());
            return;
        }
        let session = self.session.read();
        let Some(session) = session.as_ref() else {
            return;
        };

        let Some(mut packet) = session.packet_pool.acquire() else {
            self.shared.stats.record_rx();
            self.shared.stats.incr(Counter::RxDropped);
            return;
        };
        packet.fill_from(data);

        self.shared.stats.record_rx();
        if session.decode_queue.try_push(packet).is_err() {
            self.shared.stats.incr(Counter::RxDropped);
        }
    }

    pub fn start_recording(&self) {
        self.port.enable_input(true);
        // Let the device finish opening
        thread::sleep(self.config.recording_settle);
        self.shared.set_recording(true);
        log::info!(
            "Recording started (port input {}Hz, encode {}Hz)",
            self.port.input_sample_rate(),
            EncoderSettings::default().sample_rate,
        );
    }

    pub fn stop_recording(&self) {
        self.shared.set_recording(false);
        self.port.enable_input(false);
        log::info!("Recording stopped");
    }

    pub fn is_recording(&self) -> bool {
        self.shared.is_recording()
    }

    pub fn is_running(&self) -> bool {
        self.session.read().is_some()
    }

    /// Set the consumer of encoded packets. Takes effect on the next packet.
    pub fn set_outgoing_packet_callback<F>(&self, callback: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.shared.set_outgoing_callback(Arc::new(callback));
    }

    pub fn decode_sample_rate(&self) -> Option<u32> {
        self.session.read().as_ref().map(|s| s.decode_sample_rate)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Counters of the last playback burst, captured when the amplifier muted.
    pub fn last_session_stats(&self) -> Option<StatsSnapshot> {
        self.shared.stats.last_session()
    }

    pub fn reset_stats(&self) {
        self.shared.stats.reset();
    }

    pub fn queue_levels(&self) -> Option<QueueLevels> {
        self.session.read().as_ref().map(|s| QueueLevels {
            encode: s.encode_queue.len(),
            decode: s.decode_queue.len(),
            playback: s.playback_queue.len(),
        })
    }
}

impl Drop for AudioSystem {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn<T, F>(name: &'static str, f: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(f)
        .map_err(|source| PipelineError::Spawn { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::{SpeechDecoder, SpeechEncoder};
    use crate::audio::memory_port::MemoryPort;
    use crossbeam_channel::{Receiver, Sender, bounded};
    use std::time::Instant;

    /// Decoder that waits for a go-ahead before every packet.
    struct GatedDecoder {
        gate: Receiver<()>,
    }

    impl SpeechDecoder for GatedDecoder {
        fn decode(&mut self, packet: &[u8], out: &mut [i16]) -> anyhow::Result<usize> {
            let _ = self.gate.recv();
            out[..10].fill(packet[0] as i16);
            Ok(10)
        }
    }

    struct NullEncoder;

    impl SpeechEncoder for NullEncoder {
        fn encode(&mut self, _pcm: &[i16], out: &mut [u8]) -> anyhow::Result<usize> {
            out[0] = 1;
            Ok(1)
        }
    }

    struct GatedCodecs {
        gate: Receiver<()>,
        fail_encoder: bool,
    }

    impl CodecProvider for GatedCodecs {
        fn create_encoder(&self, _: &EncoderSettings) -> anyhow::Result<Box<dyn SpeechEncoder>> {
            if self.fail_encoder {
                anyhow::bail!("no encoder");
            }
            Ok(Box::new(NullEncoder))
        }

        fn create_decoder(&self, _: u32) -> anyhow::Result<Box<dyn SpeechDecoder>> {
            Ok(Box::new(GatedDecoder {
                gate: self.gate.clone(),
            }))
        }
    }

    fn system(fail_encoder: bool) -> (AudioSystem, Arc<MemoryPort>, Sender<()>) {
        let (gate_tx, gate) = bounded(64);
        let port = Arc::new(MemoryPort::new(16000, 24000));
        let sys = AudioSystem::new(
            port.clone(),
            Arc::new(GatedCodecs { gate, fail_encoder }),
            AudioConfig::default(),
        );
        (sys, port, gate_tx)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_start_rejects_bad_rate_and_double_start() {
        let (sys, _port, _gate) = system(false);
        assert!(matches!(
            sys.start(44100),
            Err(PipelineError::UnsupportedSampleRate(44100))
        ));
        assert!(!sys.is_running());

        sys.start(24000).unwrap();
        assert!(matches!(sys.start(24000), Err(PipelineError::AlreadyRunning)));
        assert_eq!(sys.decode_sample_rate(), Some(24000));
        sys.stop();
        sys.stop();
        assert!(!sys.is_running());
    }

    #[test]
    fn test_codec_failure_leaves_nothing_running() {
        let (sys, _port, _gate) = system(true);
        assert!(matches!(sys.start(24000), Err(PipelineError::EncoderInit(_))));
        assert!(!sys.is_running());
        assert!(sys.queue_levels().is_none());
    }

    #[test]
    fn test_first_packet_of_session_resets_counters() {
        let (sys, _port, gate) = system(false);
        sys.start(24000).unwrap();

        sys.shared.stats.incr(Counter::Played);
        sys.shared.stats.incr(Counter::DecodeErrors);
        sys.shared.stats.incr(Counter::EncodeErrors);
        assert_eq!(sys.stats().rx, 0);

        // Decoder is held at the gate, so nothing else moves.
        sys.push_compressed_for_decode(&[7, 7, 7]);
        assert_eq!(
            sys.stats(),
            StatsSnapshot {
                rx: 1,
                ..Default::default()
            }
        );

        drop(gate);
        sys.stop();
    }

    #[test]
    fn test_reset_stats_clears_live_counters() {
        let (sys, _port, gate) = system(false);
        sys.start(24000).unwrap();
        sys.push_compressed_for_decode(&[1]);
        sys.shared.stats.incr(Counter::CaptureDropped);
        assert_eq!(sys.stats().rx, 1);

        sys.reset_stats();
        assert_eq!(sys.stats(), StatsSnapshot::default());

        // Next packet opens a fresh session.
        sys.push_compressed_for_decode(&[2]);
        assert_eq!(sys.stats().rx, 1);

        drop(gate);
        sys.stop();
    }

    #[test]
    fn test_ingress_ignored_when_stopped_or_invalid() {
        let (sys, _port, gate) = system(false);
        sys.push_compressed_for_decode(&[1, 2, 3]);
        assert_eq!(sys.stats().rx, 0);

        sys.start(24000).unwrap();
        sys.push_compressed_for_decode(&[]);
        sys.push_compressed_for_decode(&vec![0u8; 513]);
        assert_eq!(sys.stats().rx, 0);
        assert_eq!(sys.queue_levels().unwrap().decode, 0);

        drop(gate);
        sys.stop();
    }

    #[test]
    fn test_stop_releases_queued_packets() {
        let (sys, _port, gate) = system(false);
        sys.start(24000).unwrap();

        sys.push_compressed_for_decode(&[1]);
        assert!(wait_until(|| sys.queue_levels().unwrap().decode == 0));
        for _ in 0..5 {
            sys.push_compressed_for_decode(&[2]);
        }
        assert_eq!(sys.queue_levels().unwrap().decode, 5);

        drop(gate);
        sys.stop();
        assert!(sys.queue_levels().is_none());

        // Clean restart after stop.
        sys.start(16000).unwrap();
        assert_eq!(sys.queue_levels().unwrap().decode, 0);
        sys.stop();
    }

    #[test]
    fn test_recording_flag_drives_port_input() {
        let (sys, port, _gate) = system(false);
        assert!(!sys.is_recording());
        sys.start_recording();
        assert!(sys.is_recording());
        assert!(port.input_enabled());
        sys.stop_recording();
        assert!(!sys.is_recording());
        assert!(!port.input_enabled());
    }
}
