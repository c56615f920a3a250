use std::sync::Arc;

use num_complex::Complex32;
use rustfft::{num_traits::Zero, Fft, FftPlanner};

/// Helper that wraps the `rustfft` planners for reuse.
pub struct FftHelper {
    fwd: Arc<dyn Fft<f32>>,
    inv: Arc<dyn Fft<f32>>,
    size: usize,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fwd = planner.plan_fft_forward(size);
        let inv = planner.plan_fft_inverse(size);
        Self { fwd, inv, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn forward(&self, input: &[f32]) -> Vec<Complex32> {
        let mut buffer: Vec<Complex32> = input
            .iter()
            .map(|&value| Complex32::new(value, 0.0))
            .collect();
        buffer.resize(self.size, Complex32::zero());
        self.fwd.process(&mut buffer);
        buffer
    }

    /// Inverse transform returning the real part, scaled by 1/N.
    pub fn inverse_real(&self, mut spectrum: Vec<Complex32>) -> Vec<f32> {
        spectrum.resize(self.size, Complex32::zero());
        self.inv.process(&mut spectrum);
        let scale = 1.0 / self.size as f32;
        spectrum.iter().map(|c| c.re * scale).collect()
    }
}
