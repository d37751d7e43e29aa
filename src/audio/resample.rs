//! Linear-interpolation resampling for the capture path.

/// Resample one frame from `src_rate` to `dst_rate`, filling all of `dst`.
///
/// Output sample `i` reads source position `i * src_rate / dst_rate` and
/// blends the two neighbouring samples. Positions at or past the last
/// valid source sample take that sample, so the source is never overrun.
pub fn resample_linear(src: &[i16], src_rate: u32, dst: &mut [i16], dst_rate: u32) {
    if src.is_empty() {
        dst.fill(0);
        return;
    }
    let last = src.len() - 1;
    let ratio = src_rate as f32 / dst_rate as f32;

    for (i, out) in dst.iter_mut().enumerate() {
        let pos = i as f32 * ratio;
        let idx = pos as usize;
        *out = if idx >= last {
            src[last]
        } else {
            let frac = pos - idx as f32;
            (src[idx] as f32 * (1.0 - frac) + src[idx + 1] as f32 * frac) as i16
        };
    }
}
