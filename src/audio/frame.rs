//! Fixed-size buffers that travel through the pipeline queues.

/// Duration of one codec frame in milliseconds.
pub const FRAME_DURATION_MS: u32 = 60;
/// Sample rate the speech encoder runs at.
pub const ENCODE_SAMPLE_RATE: u32 = 16000;
/// Samples in one encode-side frame: 60ms @ 16kHz.
pub const ENCODE_FRAME_SAMPLES: usize = frame_samples(ENCODE_SAMPLE_RATE);
/// Playback rates the decoder may be configured for.
pub const SUPPORTED_DECODE_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];
/// Capacity of a decode-side frame, sized for the highest playback rate.
pub const DECODE_FRAME_CAPACITY: usize = frame_samples(48000);
/// Largest compressed packet accepted at ingress.
pub const MAX_PACKET_SIZE: usize = 512;
/// Scratch size handed to the encoder for one output packet.
pub const ENCODE_OUTPUT_SIZE: usize = 4000;

/// Number of mono samples in one frame at `sample_rate`.
pub const fn frame_samples(sample_rate: u32) -> usize {
    (sample_rate * FRAME_DURATION_MS / 1000) as usize
}

/// A block of mono i16 PCM with a fixed backing capacity.
///
/// The backing storage is allocated once (by the buffer pool) and reused;
/// only `count` changes between uses.
#[derive(Debug)]
pub struct PcmFrame {
    samples: Box<[i16]>,
    count: usize,
}

impl PcmFrame {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: vec![0i16; capacity].into_boxed_slice(),
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Valid samples of this frame.
    pub fn as_slice(&self) -> &[i16] {
        &self.samples[..self.count]
    }

    /// Whole backing buffer, for producers that fill in place.
    /// Callers must follow up with [`PcmFrame::set_count`].
    pub fn buffer_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    pub fn set_count(&mut self, count: usize) {
        self.count = count.min(self.samples.len());
    }

    /// Copy `src` into the frame. Samples past the capacity are cut off.
    pub fn fill_from(&mut self, src: &[i16]) -> usize {
        let n = src.len().min(self.samples.len());
        self.samples[..n].copy_from_slice(&src[..n]);
        self.count = n;
        n
    }
}

/// One compressed speech packet, bounded by [`MAX_PACKET_SIZE`].
pub struct CompressedPacket {
    data: [u8; MAX_PACKET_SIZE],
    len: usize,
}

impl CompressedPacket {
    pub fn new() -> Self {
        Self {
            data: [0u8; MAX_PACKET_SIZE],
            len: 0,
        }
    }

    /// Ingress check: a packet must be non-empty and fit the buffer.
    pub fn is_valid_length(len: usize) -> bool {
        len > 0 && len <= MAX_PACKET_SIZE
    }

    /// Copy `bytes` in. Returns false (and leaves the packet untouched)
    /// when the length is out of range.
    pub fn fill_from(&mut self, bytes: &[u8]) -> bool {
        if !Self::is_valid_length(bytes.len()) {
            return false;
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len();
        true
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for CompressedPacket {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CompressedPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedPacket").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_sizes() {
        assert_eq!(ENCODE_FRAME_SAMPLES, 960);
        assert_eq!(DECODE_FRAME_CAPACITY, 2880);
        assert_eq!(frame_samples(24000), 1440);
    }

    #[test]
    fn test_pcm_frame_fill_is_capped() {
        let mut frame = PcmFrame::with_capacity(4);
        assert_eq!(frame.fill_from(&[1, 2, 3, 4, 5, 6]), 4);
        assert_eq!(frame.as_slice(), &[1, 2, 3, 4]);

        frame.fill_from(&[9]);
        assert_eq!(frame.count(), 1);
        assert_eq!(frame.as_slice(), &[9]);
    }

    #[test]
    fn test_packet_length_bounds() {
        let mut pkt = CompressedPacket::new();
        assert!(!pkt.fill_from(&[]));
        assert!(!pkt.fill_from(&vec![0u8; MAX_PACKET_SIZE + 1]));
        assert!(pkt.is_empty());

        assert!(pkt.fill_from(&vec![7u8; MAX_PACKET_SIZE]));
        assert_eq!(pkt.len(), MAX_PACKET_SIZE);
        assert!(pkt.fill_from(&[1, 2, 3]));
        assert_eq!(pkt.as_bytes(), &[1, 2, 3]);
    }
}
