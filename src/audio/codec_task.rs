use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::audio_system::{AudioConfig, Shared};
use super::codec::{SpeechDecoder, SpeechEncoder};
use super::frame::{CompressedPacket, DECODE_FRAME_CAPACITY, ENCODE_OUTPUT_SIZE, PcmFrame};
use super::pool::{BufferPool, Pooled};
use super::queue::FrameQueue;
use super::stats::Counter;

/// Encoder and decoder of one pipeline run. Handed back when the codec
/// thread exits so they are closed after the queues are drained.
pub(crate) struct Codecs {
    pub(crate) encoder: Box<dyn SpeechEncoder>,
    pub(crate) decoder: Box<dyn SpeechDecoder>,
}

/// Codec thread body: one decode step and one encode step per iteration.
pub(crate) struct CodecTask {
    shared: Arc<Shared>,
    codecs: Codecs,
    encode_queue: FrameQueue<Pooled<PcmFrame>>,
    decode_queue: FrameQueue<Pooled<CompressedPacket>>,
    playback_queue: FrameQueue<Pooled<PcmFrame>>,
    decoded_pool: BufferPool<PcmFrame>,
    enc_out: Vec<u8>,
    dec_out: Vec<i16>,
    /// Samples in one frame at the decode rate; the decoder never gets more room
    decode_frame_samples: usize,
    push_timeout: Duration,
    idle_sleep: Duration,
    encoded_frames: u64,
}

impl CodecTask {
    pub(crate) fn new(
        shared: Arc<Shared>,
        codecs: Codecs,
        encode_queue: FrameQueue<Pooled<PcmFrame>>,
        decode_queue: FrameQueue<Pooled<CompressedPacket>>,
        playback_queue: FrameQueue<Pooled<PcmFrame>>,
        decoded_pool: BufferPool<PcmFrame>,
        decode_frame_samples: usize,
        config: &AudioConfig,
    ) -> Self {
        Self {
            shared,
            codecs,
            encode_queue,
            decode_queue,
            playback_queue,
            decoded_pool,
            enc_out: vec![0u8; ENCODE_OUTPUT_SIZE],
            dec_out: vec![0i16; DECODE_FRAME_CAPACITY],
            decode_frame_samples: decode_frame_samples.clamp(1, DECODE_FRAME_CAPACITY),
            push_timeout: config.playback_push_timeout,
            idle_sleep: config.codec_idle_sleep,
            encoded_frames: 0,
        }
    }

    pub(crate) fn run(mut self) -> Codecs {
        log::info!("Codec task started");
        while self.shared.is_running() {
            if !self.run_once() {
                thread::sleep(self.idle_sleep);
            }
        }
        log::info!("Codec task stopped ({} frames encoded)", self.encoded_frames);
        self.codecs
    }

    /// Returns true if either step found work.
    pub(crate) fn run_once(&mut self) -> bool {
        let decoded = self.decode_step();
        let encoded = self.encode_step();
        decoded || encoded
    }

    fn decode_step(&mut self) -> bool {
        // Leave packets queued while the speaker side is backed up.
        if !self.playback_queue.has_headroom() {
            return false;
        }
        let Some(packet) = self.decode_queue.try_pop() else {
            return false;
        };

        let out = &mut self.dec_out[..self.decode_frame_samples];
        let result = self.codecs.decoder.decode(packet.as_bytes(), out);
        drop(packet);

        let samples = match result {
            Ok(n) if n > 0 => n.min(self.decode_frame_samples),
            Ok(_) => {
                self.shared.stats.incr(Counter::DecodeErrors);
                return true;
            }
            Err(e) => {
                self.shared.stats.incr(Counter::DecodeErrors);
                log::debug!("Decode error: {:#}", e);
                return true;
            }
        };
        self.shared.stats.incr(Counter::Decoded);

        let Some(mut frame) = self.decoded_pool.acquire() else {
            log::debug!("No free playback buffer, decoded frame dropped");
            return true;
        };
        frame.fill_from(&self.dec_out[..samples]);

        match self.playback_queue.push_timeout(frame, self.push_timeout) {
            Ok(()) => self.shared.stats.incr(Counter::PlaybackQueued),
            Err(_frame) => self.shared.stats.incr(Counter::PlaybackDropped),
        }
        true
    }

    fn encode_step(&mut self) -> bool {
        let Some(pcm) = self.encode_queue.try_pop() else {
            return false;
        };

        let result = self.codecs.encoder.encode(pcm.as_slice(), &mut self.enc_out);
        drop(pcm);

        match result {
            Ok(0) => {}
            Ok(len) => {
                self.shared.stats.incr(Counter::Encoded);
                self.encoded_frames += 1;
                let callback = self.shared.outgoing_callback();
                if self.encoded_frames <= 5 {
                    log::info!(
                        "Encoded frame #{}: {} bytes, callback={}",
                        self.encoded_frames,
                        len,
                        if callback.is_some() { "yes" } else { "no" },
                    );
                }
                if let Some(send) = callback {
                    send(&self.enc_out[..len]);
                }
            }
            Err(e) => {
                self.shared.stats.incr(Counter::EncodeErrors);
                log::error!("Encode error: {:#}", e);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frame::{ENCODE_FRAME_SAMPLES, frame_samples};
    use parking_lot::Mutex;

    /// Decoder emitting `packet[0]` repeated 1440 times; 0xFF fails.
    struct EchoDecoder;

    impl SpeechDecoder for EchoDecoder {
        fn decode(&mut self, packet: &[u8], out: &mut [i16]) -> anyhow::Result<usize> {
            if packet[0] == 0xFF {
                anyhow::bail!("corrupt packet");
            }
            out[..1440].fill(packet[0] as i16);
            Ok(1440)
        }
    }

    /// Decoder that claims every sample of the buffer it is handed.
    struct GreedyDecoder;

    impl SpeechDecoder for GreedyDecoder {
        fn decode(&mut self, _packet: &[u8], out: &mut [i16]) -> anyhow::Result<usize> {
            out.fill(1);
            Ok(out.len())
        }
    }

    /// Encoder emitting the frame's first sample as one byte; negative fails.
    struct FirstSampleEncoder;

    impl SpeechEncoder for FirstSampleEncoder {
        fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> anyhow::Result<usize> {
            if pcm[0] < 0 {
                anyhow::bail!("bad frame");
            }
            out[0] = pcm[0] as u8;
            Ok(1)
        }
    }

    struct Harness {
        task: CodecTask,
        shared: Arc<Shared>,
        encode_queue: FrameQueue<Pooled<PcmFrame>>,
        decode_queue: FrameQueue<Pooled<CompressedPacket>>,
        playback_queue: FrameQueue<Pooled<PcmFrame>>,
        pcm_pool: BufferPool<PcmFrame>,
        packet_pool: BufferPool<CompressedPacket>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    fn harness(playback_depth: usize) -> Harness {
        harness_with(playback_depth, Box::new(EchoDecoder))
    }

    fn harness_with(playback_depth: usize, decoder: Box<dyn SpeechDecoder>) -> Harness {
        let shared = Arc::new(Shared::new());
        shared.set_running(true);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = sent.clone();
        shared.set_outgoing_callback(Arc::new(move |pkt: &[u8]| sink.lock().push(pkt.to_vec())));

        let encode_queue = FrameQueue::new(4);
        let decode_queue = FrameQueue::new(8);
        let playback_queue = FrameQueue::new(playback_depth);
        let config = AudioConfig {
            playback_push_timeout: Duration::from_millis(5),
            ..Default::default()
        };
        let task = CodecTask::new(
            shared.clone(),
            Codecs {
                encoder: Box::new(FirstSampleEncoder),
                decoder,
            },
            encode_queue.clone(),
            decode_queue.clone(),
            playback_queue.clone(),
            BufferPool::new(playback_depth + 2, || PcmFrame::with_capacity(DECODE_FRAME_CAPACITY)),
            frame_samples(24000),
            &config,
        );
        Harness {
            task,
            shared,
            encode_queue,
            decode_queue,
            playback_queue,
            pcm_pool: BufferPool::new(4, || PcmFrame::with_capacity(ENCODE_FRAME_SAMPLES)),
            packet_pool: BufferPool::new(8, CompressedPacket::new),
            sent,
        }
    }

    impl Harness {
        fn push_packet(&self, bytes: &[u8]) {
            let mut pkt = self.packet_pool.acquire().unwrap();
            assert!(pkt.fill_from(bytes));
            self.decode_queue.try_push(pkt).unwrap();
        }

        fn push_pcm(&self, first: i16) {
            let mut frame = self.pcm_pool.acquire().unwrap();
            let mut samples = vec![0i16; ENCODE_FRAME_SAMPLES];
            samples[0] = first;
            frame.fill_from(&samples);
            self.encode_queue.try_push(frame).unwrap();
        }
    }

    #[test]
    fn test_idle_iteration_reports_no_work() {
        let mut h = harness(4);
        assert!(!h.task.run_once());
    }

    #[test]
    fn test_decode_pushes_frame_to_playback() {
        let mut h = harness(4);
        h.push_packet(&[9, 1, 2]);
        assert!(h.task.run_once());

        let frame = h.playback_queue.try_pop().unwrap();
        assert_eq!(frame.count(), 1440);
        assert!(frame.as_slice().iter().all(|&s| s == 9));
        assert_eq!(h.shared.stats.get(Counter::Decoded), 1);
        assert_eq!(h.shared.stats.get(Counter::PlaybackQueued), 1);
        // Packet buffer went back to its pool.
        assert_eq!(h.packet_pool.available(), 8);
    }

    #[test]
    fn test_decode_error_counted_and_task_continues() {
        let mut h = harness(4);
        h.push_packet(&[0xFF]);
        h.push_packet(&[3]);
        assert!(h.task.run_once());
        assert!(h.task.run_once());
        assert_eq!(h.shared.stats.get(Counter::DecodeErrors), 1);
        assert_eq!(h.shared.stats.get(Counter::Decoded), 1);
        assert_eq!(h.playback_queue.len(), 1);
    }

    #[test]
    fn test_decode_waits_for_playback_headroom() {
        let mut h = harness(1);
        h.push_packet(&[1]);
        h.push_packet(&[2]);
        h.task.run_once();
        assert_eq!(h.playback_queue.len(), 1);

        // Playback full: the second packet stays queued.
        assert!(!h.task.run_once());
        assert_eq!(h.decode_queue.len(), 1);

        h.playback_queue.try_pop();
        assert!(h.task.run_once());
        assert_eq!(h.decode_queue.len(), 0);
        assert_eq!(h.shared.stats.get(Counter::PlaybackDropped), 0);
    }

    #[test]
    fn test_encode_delivers_through_callback() {
        let mut h = harness(4);
        h.push_pcm(42);
        h.push_pcm(-1);
        h.push_pcm(7);
        for _ in 0..3 {
            assert!(h.task.run_once());
        }
        assert_eq!(*h.sent.lock(), vec![vec![42u8], vec![7u8]]);
        assert_eq!(h.shared.stats.get(Counter::Encoded), 2);
        assert_eq!(h.shared.stats.get(Counter::EncodeErrors), 1);
        assert_eq!(h.pcm_pool.available(), 4);
    }

    #[test]
    fn test_decoder_bounded_to_decode_frame() {
        let mut h = harness_with(4, Box::new(GreedyDecoder));
        h.push_packet(&[1, 2, 3]);
        assert!(h.task.run_once());

        let frame = h.playback_queue.try_pop().unwrap();
        // 60ms @ 24kHz, not the full 48kHz-sized scratch
        assert_eq!(frame.count(), 1440);
        assert_eq!(h.shared.stats.get(Counter::Decoded), 1);
    }
}
