use serde::{Deserialize, Serialize};

/// Ancillary metadata accompanying each archive container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchiveHeader {
    /// Source name as recorded, or the preferred form once normalized.
    pub source: String,
    /// Centre frequency of the observing band, in MHz.
    pub ctr_freq_mhz: f64,
    /// Start of the observation, in MJD.
    pub start_mjd: f64,
    /// Receiver code.
    pub rcvr: String,
    /// Backend code.
    pub backend: String,
    /// Integration length, in seconds.
    pub length_s: f64,
    /// Stems of the recordings folded into this archive.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}
