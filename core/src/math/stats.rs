pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    pub fn median(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            0.5 * (sorted[mid - 1] + sorted[mid])
        } else {
            sorted[mid]
        }
    }

    /// Peak-to-peak span of a sequence.
    pub fn ptp(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let max = samples.iter().copied().fold(f32::MIN, f32::max);
        let min = samples.iter().copied().fold(f32::MAX, f32::min);
        max - min
    }

    /// Median absolute deviation scaled to estimate a Gaussian sigma.
    pub fn mad_sigma(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let med = Self::median(samples);
        let deviations: Vec<f32> = samples.iter().map(|&v| (v - med).abs()).collect();
        1.4826 * Self::median(&deviations)
    }
}
