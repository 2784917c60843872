/// Blackman–Nuttall window of `size` samples.
///
/// Used both for spectral profiling (analysis taper) and for shaping the
/// edges of synthesized impulse responses. The coefficient set sums to 1,
/// so the window peaks at exactly 1.0 at its center.
pub fn blackman_nuttall(size: usize) -> Vec<f32> {
    const A0: f32 = 0.363_581_9;
    const A1: f32 = 0.489_177_5;
    const A2: f32 = 0.136_599_5;
    const A3: f32 = 0.010_641_1;

    if size <= 1 {
        return vec![1.0; size];
    }

    let n1 = (size - 1) as f32;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n1;
            A0 - A1 * x.cos() + A2 * (2.0 * x).cos() - A3 * (3.0 * x).cos()
        })
        .collect()
}
