use anyhow::Context;
use psrcore::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CombineConfig {
    #[serde(default)]
    pub always_add: bool,
    #[serde(default)]
    pub min_snr: f64,
    #[serde(default)]
    pub diagnostics_dir: Option<PathBuf>,
}

impl CombineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: CombineConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(always_add: bool, min_snr: f64, diagnostics_dir: Option<PathBuf>) -> Self {
        Self {
            always_add,
            min_snr,
            diagnostics_dir,
        }
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            always_add: self.always_add,
            min_snr: self.min_snr,
            diagnostics_dir: self.diagnostics_dir.clone(),
        }
    }
}
