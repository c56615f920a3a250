use crate::archive::Archive;
use crate::math::stats::StatsHelper;
use crate::prelude::{CombineError, CombineResult};
use crate::telemetry::log::LogManager;

/// Signal-to-noise estimator over fully scrunched profiles.
pub struct SnrEstimator {
    logger: LogManager,
}

impl SnrEstimator {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new(),
        }
    }

    /// SNR of the archive: pulse peak above a robust baseline, in units
    /// of the off-pulse noise estimate. Never cached; recomputed on every
    /// call.
    pub fn estimate(&self, archive: &Archive) -> CombineResult<f64> {
        let profile = archive.scrunched();
        if profile.len() < 8 {
            return Err(CombineError::UnreadableArchive {
                archive: archive.header.source.clone(),
                reason: format!("profile has only {} bins", profile.len()),
            });
        }
        let baseline = StatsHelper::median(&profile);
        let noise = StatsHelper::mad_sigma(&profile);
        if noise <= f32::EPSILON {
            return Err(CombineError::UnreadableArchive {
                archive: archive.header.source.clone(),
                reason: "flat profile, no noise estimate".to_string(),
            });
        }
        let peak = profile.iter().copied().fold(f32::MIN, f32::max);
        let snr = f64::from((peak - baseline) / noise);
        self.logger
            .record(&format!("SNR {:.2} for {}", snr, archive.header.source));
        Ok(snr)
    }
}

impl Default for SnrEstimator {
    fn default() -> Self {
        Self::new()
    }
}
