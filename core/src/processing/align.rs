use num_complex::Complex32;

use crate::archive::Archive;
use crate::math::fft::FftHelper;
use crate::math::stats::StatsHelper;
use crate::prelude::{CombineError, CombineResult};
use crate::telemetry::log::LogManager;

/// Cross-correlation phase aligner over scrunched profiles.
pub struct PhaseAligner {
    logger: LogManager,
}

impl PhaseAligner {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new(),
        }
    }

    /// Offset, in turns, by which `candidate` must be rotated to best
    /// superimpose its pulse onto `reference`. The result lies in
    /// [-0.5, 0.5).
    pub fn offset(&self, reference: &Archive, candidate: &Archive) -> CombineResult<f64> {
        let nbin = reference.nbin();
        if nbin != candidate.nbin() {
            return Err(CombineError::Alignment(format!(
                "bin counts differ: {} vs {}",
                nbin,
                candidate.nbin()
            )));
        }
        if nbin < 8 {
            return Err(CombineError::Alignment(format!(
                "too few phase bins ({})",
                nbin
            )));
        }
        let ref_prof = reference.scrunched();
        let cand_prof = candidate.scrunched();
        if StatsHelper::ptp(&ref_prof) <= f32::EPSILON
            || StatsHelper::ptp(&cand_prof) <= f32::EPSILON
        {
            return Err(CombineError::Alignment(
                "flat profile cannot be aligned".to_string(),
            ));
        }

        let fft = FftHelper::new(nbin);
        let ref_spec = fft.forward(&ref_prof);
        let cand_spec = fft.forward(&cand_prof);
        // Cross-power spectrum; its inverse transform peaks at the lag
        // that carries the candidate onto the reference.
        let cross: Vec<Complex32> = ref_spec
            .iter()
            .zip(cand_spec.iter())
            .map(|(r, c)| r * c.conj())
            .collect();
        let corr = fft.inverse_real(cross);
        let peak_idx = corr
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(idx, _)| idx)
            .ok_or_else(|| CombineError::Alignment("empty correlation".to_string()))?;

        // Parabolic refinement around the correlation peak.
        let prev = corr[(peak_idx + nbin - 1) % nbin];
        let here = corr[peak_idx];
        let next = corr[(peak_idx + 1) % nbin];
        let denom = prev - 2.0 * here + next;
        let frac = if denom.abs() > f32::EPSILON {
            0.5 * (prev - next) / denom
        } else {
            0.0
        };

        let lag = peak_idx as f64 + f64::from(frac);
        let mut turns = lag / nbin as f64;
        if turns >= 0.5 {
            turns -= 1.0;
        }
        self.logger.record(&format!(
            "phase offset {:.4} turns for {}",
            turns, candidate.header.source
        ));
        Ok(turns)
    }

    /// Rotate every channel of `archive` by `turns` of pulse phase using
    /// a spectral-domain phase ramp.
    pub fn rotate_phase(&self, archive: &Archive, turns: f64) -> Archive {
        let nbin = archive.nbin();
        if nbin == 0 || turns == 0.0 {
            return archive.clone();
        }
        let fft = FftHelper::new(nbin);
        let mut rotated = archive.clone();
        for mut row in rotated.data.rows_mut() {
            let samples: Vec<f32> = row.iter().copied().collect();
            let mut spec = fft.forward(&samples);
            for (k, bin) in spec.iter_mut().enumerate() {
                let freq = if k <= nbin / 2 {
                    k as f64
                } else {
                    k as f64 - nbin as f64
                };
                let angle = -2.0 * std::f64::consts::PI * freq * turns;
                *bin *= Complex32::new(angle.cos() as f32, angle.sin() as f32);
            }
            let shifted = fft.inverse_real(spec);
            for (dst, src) in row.iter_mut().zip(shifted.iter()) {
                *dst = *src;
            }
        }
        rotated
    }
}

impl Default for PhaseAligner {
    fn default() -> Self {
        Self::new()
    }
}
