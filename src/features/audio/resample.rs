pub(crate) fn resample_linear_into(
    out: &mut Vec<f32>,
    samples: &[f32],
    input_rate: u32,
    output_rate: u32,
) {
    let input_rate = input_rate.max(1);
    let output_rate = output_rate.max(1);
    out.clear();
    if samples.is_empty() || input_rate == output_rate {
        out.extend_from_slice(samples);
        return;
    }
    let ratio = input_rate as f64 / output_rate as f64;
    let out_len = (samples.len() as f64 / ratio).round().max(1.0) as usize;
    out.reserve(out_len);
    out.extend((0..out_len).map(|i| lerp_sample(samples, i as f64 * ratio)));
}

fn lerp_sample(samples: &[f32], pos: f64) -> f32 {
    let idx0 = (pos.floor().max(0.0) as usize).min(samples.len().saturating_sub(1));
    let frac = (pos - idx0 as f64).clamp(0.0, 1.0) as f32;
    let idx1 = (idx0 + 1).min(samples.len().saturating_sub(1));
    let a = samples.get(idx0).copied().unwrap_or(0.0);
    let b = samples.get(idx1).copied().unwrap_or(a);
    a + (b - a) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsampling_a_ramp_keeps_its_endpoints() {
        let mut out = Vec::new();
        resample_linear_into(&mut out, &[0.0, 1.0], 1, 2);
        assert_eq!(out.len(), 4);
        assert!(out[0].abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!((out[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn matching_rates_copy_through() {
        let mut out = vec![9.0];
        resample_linear_into(&mut out, &[0.1, 0.2], 44_100, 44_100);
        assert_eq!(out, vec![0.1, 0.2]);
    }

    #[test]
    fn downsampling_halves_the_length() {
        let mut out = Vec::new();
        let input: Vec<f32> = (0..100).map(|i| i as f32).collect();
        resample_linear_into(&mut out, &input, 48_000, 24_000);
        assert_eq!(out.len(), 50);
        assert_eq!(out[10], 20.0);
    }
}
