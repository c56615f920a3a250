use std::path::{Path, PathBuf};

use crate::workflow::config::CombineConfig;
use psrcore::processing::engine::CombineEngine;
use psrcore::processing::toolkit::PsrToolkit;

/// Printable result of one combination run.
#[derive(Debug)]
pub struct RunSummary {
    pub destination: PathBuf,
    pub final_snr: f64,
    pub members: Vec<PathBuf>,
    pub accepted: usize,
    pub rejected: usize,
    pub excluded: usize,
}

#[derive(Clone)]
pub struct Runner {
    config: CombineConfig,
}

impl Runner {
    pub fn new(config: CombineConfig) -> Self {
        Self { config }
    }

    /// Combine `inputs` into `destination` using the default toolkit.
    pub fn execute(&self, inputs: &[PathBuf], destination: &Path) -> anyhow::Result<RunSummary> {
        let toolkit = PsrToolkit::new();
        let mut engine = CombineEngine::new(&toolkit, self.config.to_engine_config());
        let outcome = engine.run(inputs, destination)?;
        Ok(RunSummary {
            destination: outcome.destination,
            final_snr: outcome.final_snr,
            members: outcome.members,
            accepted: outcome.accepted,
            rejected: outcome.rejected,
            excluded: outcome.excluded,
        })
    }
}
