use std::fs;
use std::path::Path;

use ndarray::Array2;
use serde::Serialize;

use crate::archive::Archive;
use crate::prelude::{ArchiveToolkit, CombineError, CombineResult};
use crate::processing::align::PhaseAligner;
use crate::processing::names;
use crate::processing::snr::SnrEstimator;
use crate::telemetry::log::LogManager;

/// Default toolkit binding: in-process SNR estimation, FFT alignment,
/// weight-blended combination, and JSON comparison artifacts.
pub struct PsrToolkit {
    snr: SnrEstimator,
    aligner: PhaseAligner,
    logger: LogManager,
}

/// One panel of a comparison artifact.
#[derive(Debug, Serialize)]
struct DiagnosticPanel {
    label: String,
    source: String,
    snr: Option<f64>,
    profile: Vec<f32>,
}

/// Snapshot document written when an attempt is rejected.
#[derive(Debug, Serialize)]
struct DiagnosticDoc {
    panels: Vec<DiagnosticPanel>,
}

impl PsrToolkit {
    pub fn new() -> Self {
        Self {
            snr: SnrEstimator::new(),
            aligner: PhaseAligner::new(),
            logger: LogManager::new(),
        }
    }

    fn check_compatible(&self, lhs: &Archive, rhs: &Archive) -> CombineResult<()> {
        if lhs.header.source != rhs.header.source {
            return Err(CombineError::Incompatible(format!(
                "source mismatch: {} vs {}",
                lhs.header.source, rhs.header.source
            )));
        }
        if lhs.nbin() != rhs.nbin() || lhs.nchan() != rhs.nchan() {
            return Err(CombineError::Incompatible(format!(
                "shape mismatch: {}x{} vs {}x{}",
                lhs.nchan(),
                lhs.nbin(),
                rhs.nchan(),
                rhs.nbin()
            )));
        }
        if (lhs.header.ctr_freq_mhz - rhs.header.ctr_freq_mhz).abs() > 1e-3 {
            return Err(CombineError::Incompatible(format!(
                "centre frequencies differ: {} MHz vs {} MHz",
                lhs.header.ctr_freq_mhz, rhs.header.ctr_freq_mhz
            )));
        }
        Ok(())
    }

    fn panel(&self, label: &str, archive: &Archive) -> DiagnosticPanel {
        DiagnosticPanel {
            label: label.to_string(),
            source: archive.header.source.clone(),
            snr: self.snr.estimate(archive).ok(),
            profile: archive.scrunched(),
        }
    }
}

impl ArchiveToolkit for PsrToolkit {
    fn snr(&self, archive: &Archive) -> CombineResult<f64> {
        self.snr.estimate(archive)
    }

    fn canonical_name(&self, raw: &str) -> String {
        names::preferred_name(raw)
    }

    fn phase_offset(&self, reference: &Archive, candidate: &Archive) -> CombineResult<f64> {
        self.aligner.offset(reference, candidate)
    }

    fn combine(
        &self,
        accumulator: &Archive,
        candidate: &Archive,
        phase_offset: f64,
    ) -> CombineResult<Archive> {
        self.check_compatible(accumulator, candidate)?;
        let shifted = self.aligner.rotate_phase(candidate, phase_offset);

        let mut header = accumulator.header.clone();
        header.length_s += shifted.header.length_s;
        header.start_mjd = accumulator.header.start_mjd.min(shifted.header.start_mjd);
        for stem in &shifted.header.members {
            if !header.members.contains(stem) {
                header.members.push(stem.clone());
            }
        }

        let nchan = accumulator.nchan();
        let nbin = accumulator.nbin();
        let mut weights = Vec::with_capacity(nchan);
        let mut data = Array2::<f32>::zeros((nchan, nbin));
        for ch in 0..nchan {
            let wl = accumulator.weights[ch];
            let wr = shifted.weights[ch];
            let total = wl + wr;
            weights.push(total);
            if total <= f32::EPSILON {
                continue;
            }
            for bin in 0..nbin {
                data[[ch, bin]] = (accumulator.data[[ch, bin]] * wl
                    + shifted.data[[ch, bin]] * wr)
                    / total;
            }
        }

        self.logger.record(&format!(
            "combined {} recordings into {}",
            header.members.len(),
            header.source
        ));
        Archive::new(header, weights, data)
    }

    fn render_diagnostic(
        &self,
        attempt: Option<&Archive>,
        accumulator: &Archive,
        candidate: &Archive,
        out_path: &Path,
    ) -> CombineResult<()> {
        let mut panels = Vec::with_capacity(3);
        if let Some(attempt) = attempt {
            panels.push(self.panel("rejected merge", attempt));
        }
        panels.push(self.panel("accumulator", accumulator));
        panels.push(self.panel("rejected candidate", candidate));

        let doc = DiagnosticDoc { panels };
        let json = serde_json::to_vec_pretty(&doc)
            .map_err(|err| CombineError::Diagnostic(err.to_string()))?;
        fs::write(out_path, json).map_err(|err| {
            CombineError::Diagnostic(format!("writing {}: {}", out_path.display(), err))
        })?;
        self.logger
            .record(&format!("wrote comparison artifact {}", out_path.display()));
        Ok(())
    }
}

impl Default for PsrToolkit {
    fn default() -> Self {
        Self::new()
    }
}
