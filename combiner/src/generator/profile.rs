use anyhow::Context;
use ndarray::Array2;
use psrcore::archive::{Archive, ArchiveHeader};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for generating synthetic observation archives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub nchan: usize,
    pub nbin: usize,
    /// Pulse centre, in turns of phase.
    pub pulse_phase: f32,
    /// Pulse width (Gaussian sigma), in turns of phase.
    pub pulse_width: f32,
    pub amplitude: f32,
    pub noise: f32,
    pub seed: u64,
    pub source: String,
    pub ctr_freq_mhz: f64,
    pub start_mjd: f64,
    pub length_s: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            nchan: 8,
            nbin: 128,
            pulse_phase: 0.3,
            pulse_width: 0.02,
            amplitude: 1.0,
            noise: 0.1,
            seed: 0,
            source: "J0534+2200".to_string(),
            ctr_freq_mhz: 1360.0,
            start_mjd: 56000.0,
            length_s: 600.0,
        }
    }
}

impl GeneratorConfig {
    fn normalized_nchan(&self) -> usize {
        self.nchan.max(1)
    }

    fn normalized_nbin(&self) -> usize {
        self.nbin.max(8)
    }
}

/// Gaussian pulse shape sampled over one turn of phase.
fn gaussian_pulse(nbin: usize, phase: f32, width: f32) -> Vec<f32> {
    let sigma = width.max(1.0 / nbin as f32);
    (0..nbin)
        .map(|i| {
            let x = i as f32 / nbin as f32;
            // Wrap the distance so the pulse is periodic in phase.
            let mut d = (x - phase).abs();
            if d > 0.5 {
                d = 1.0 - d;
            }
            (-0.5 * (d / sigma) * (d / sigma)).exp()
        })
        .collect()
}

/// Build one synthetic archive: a Gaussian pulse atop seeded noise,
/// identical in phase across channels.
pub fn build_archive(config: &GeneratorConfig) -> anyhow::Result<Archive> {
    let nchan = config.normalized_nchan();
    let nbin = config.normalized_nbin();
    nchan
        .checked_mul(nbin)
        .context("overflow computing sample count for generator")?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let pulse = gaussian_pulse(nbin, config.pulse_phase, config.pulse_width);

    let mut data = Array2::<f32>::zeros((nchan, nbin));
    for ch in 0..nchan {
        for bin in 0..nbin {
            let jitter = if config.noise > 0.0 {
                rng.gen_range(-config.noise..config.noise)
            } else {
                0.0
            };
            data[[ch, bin]] = config.amplitude * pulse[bin] + jitter;
        }
    }

    let header = ArchiveHeader {
        source: config.source.clone(),
        ctr_freq_mhz: config.ctr_freq_mhz,
        start_mjd: config.start_mjd,
        rcvr: "P217-3".to_string(),
        backend: "asterix".to_string(),
        length_s: config.length_s,
        members: vec![],
    };
    let archive = Archive::new(header, vec![1.0; nchan], data)?;
    Ok(archive)
}

/// Generate an archive and write it to `path` as a container file.
pub fn write_archive(config: &GeneratorConfig, path: &Path) -> anyhow::Result<()> {
    let archive = build_archive(config)?;
    archive
        .save(path)
        .with_context(|| format!("writing synthetic archive {}", path.display()))?;
    Ok(())
}
