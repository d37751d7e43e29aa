//! In-memory [`AudioPort`] for deterministic tests and host-side tooling.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::port::AudioPort;

#[derive(Default)]
struct PortState {
    input_enabled: bool,
    output_enabled: bool,
    volume: u8,
    /// Every output enable/disable that changed state, in order.
    output_transitions: Vec<bool>,
}

/// Ring-buffer backed port. Input samples are queued up front with
/// [`MemoryPort::push_input`]; everything written while output is enabled
/// is recorded.
pub struct MemoryPort {
    input_rate: u32,
    output_rate: u32,
    input: Mutex<VecDeque<i16>>,
    output: Mutex<Vec<i16>>,
    state: Mutex<PortState>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryPort {
    pub fn new(input_rate: u32, output_rate: u32) -> Self {
        Self {
            input_rate,
            output_rate,
            input: Mutex::new(VecDeque::new()),
            output: Mutex::new(Vec::new()),
            state: Mutex::new(PortState {
                volume: 70,
                ..Default::default()
            }),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn push_input(&self, samples: &[i16]) {
        self.input.lock().extend(samples.iter().copied());
    }

    /// Samples written while output was enabled.
    pub fn output(&self) -> Vec<i16> {
        self.output.lock().clone()
    }

    pub fn output_transitions(&self) -> Vec<bool> {
        self.state.lock().output_transitions.clone()
    }

    pub fn volume(&self) -> u8 {
        self.state.lock().volume
    }

    /// Number of `read` calls made.
    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl AudioPort for MemoryPort {
    fn input_sample_rate(&self) -> u32 {
        self.input_rate
    }

    fn output_sample_rate(&self) -> u32 {
        self.output_rate
    }

    fn read(&self, dst: &mut [i16]) -> usize {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let enabled = self.state.lock().input_enabled;
        let mut input = self.input.lock();
        for sample in dst.iter_mut() {
            *sample = if enabled { input.pop_front().unwrap_or(0) } else { 0 };
        }
        dst.len()
    }

    fn write(&self, data: &[i16]) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if self.state.lock().output_enabled {
            self.output.lock().extend_from_slice(data);
        }
    }

    fn enable_input(&self, enable: bool) {
        self.state.lock().input_enabled = enable;
    }

    fn enable_output(&self, enable: bool) {
        let mut state = self.state.lock();
        if state.output_enabled != enable {
            state.output_enabled = enable;
            state.output_transitions.push(enable);
        }
    }

    fn set_volume(&self, volume: u8) {
        self.state.lock().volume = volume.min(100);
    }

    fn input_enabled(&self) -> bool {
        self.state.lock().input_enabled
    }

    fn output_enabled(&self) -> bool {
        self.state.lock().output_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_silence_while_disabled() {
        let port = MemoryPort::new(16000, 16000);
        port.push_input(&[5, 6, 7]);
        let mut buf = [1i16; 3];
        assert_eq!(port.read(&mut buf), 3);
        assert_eq!(buf, [0, 0, 0]);

        port.enable_input(true);
        let mut buf = [1i16; 5];
        assert_eq!(port.read(&mut buf), 5);
        assert_eq!(buf, [5, 6, 7, 0, 0]);
    }

    #[test]
    fn test_write_discarded_while_disabled() {
        let port = MemoryPort::new(24000, 24000);
        port.write(&[1, 2]);
        port.enable_output(true);
        port.write(&[3, 4]);
        assert_eq!(port.output(), vec![3, 4]);
        assert_eq!(port.write_calls(), 2);
    }

    #[test]
    fn test_output_transitions_only_on_change() {
        let port = MemoryPort::new(24000, 24000);
        port.enable_output(true);
        port.enable_output(true);
        port.enable_output(false);
        assert_eq!(port.output_transitions(), vec![true, false]);
    }

    #[test]
    fn test_volume_clamped() {
        let port = MemoryPort::new(24000, 24000);
        port.set_volume(150);
        assert_eq!(port.volume(), 100);
    }
}
