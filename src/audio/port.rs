//! Hardware audio port abstraction.

/// A mono i16 audio device with independent input and output paths.
///
/// The pipeline treats every call as succeeding: `read` always fills the
/// whole destination (with silence when input is disabled or the device
/// fails) and `write` silently discards while output is disabled.
/// Implementations serialize their own enable/volume state, since the
/// capture task, the playback task and the control plane may call in
/// concurrently.
pub trait AudioPort: Send + Sync {
    /// Native capture rate in Hz.
    fn input_sample_rate(&self) -> u32;

    /// Native playback rate in Hz.
    fn output_sample_rate(&self) -> u32;

    /// Block until `dst` is filled. Always returns `dst.len()`.
    fn read(&self, dst: &mut [i16]) -> usize;

    /// Block until `data` is queued to the device (or discarded).
    fn write(&self, data: &[i16]);

    fn enable_input(&self, enable: bool);

    /// Powers the output path, and with it the speaker amplifier.
    fn enable_output(&self, enable: bool);

    /// Output volume in percent (0..=100).
    fn set_volume(&self, volume: u8);

    fn input_enabled(&self) -> bool;

    fn output_enabled(&self) -> bool;
}
