use std::fs;
use std::io::Write;
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::archive::header::ArchiveHeader;
use crate::prelude::{CombineError, CombineResult};

/// In-memory pulsar archive: header plus a channels x phase-bins profile
/// matrix with per-channel weights.
#[derive(Debug, Clone)]
pub struct Archive {
    pub header: ArchiveHeader,
    pub weights: Vec<f32>,
    pub data: Array2<f32>,
}

/// On-disk wire form of an archive container.
#[derive(Debug, Serialize, Deserialize)]
struct ContainerDoc {
    header: ArchiveHeader,
    nchan: usize,
    nbin: usize,
    weights: Vec<f32>,
    data: Vec<f32>,
}

impl Archive {
    pub fn new(header: ArchiveHeader, weights: Vec<f32>, data: Array2<f32>) -> CombineResult<Self> {
        if weights.len() != data.nrows() {
            return Err(CombineError::Internal(format!(
                "weight count {} does not match channel count {}",
                weights.len(),
                data.nrows()
            )));
        }
        Ok(Self {
            header,
            weights,
            data,
        })
    }

    pub fn nchan(&self) -> usize {
        self.data.nrows()
    }

    pub fn nbin(&self) -> usize {
        self.data.ncols()
    }

    /// Weight-averaged 1-D profile across all channels.
    pub fn scrunched(&self) -> Vec<f32> {
        let nbin = self.nbin();
        let mut profile = vec![0.0f32; nbin];
        let total: f32 = self.weights.iter().sum();
        for (row, &weight) in self.data.rows().into_iter().zip(self.weights.iter()) {
            for (bin, value) in profile.iter_mut().zip(row.iter()) {
                *bin += value * weight;
            }
        }
        if total > f32::EPSILON {
            for bin in profile.iter_mut() {
                *bin /= total;
            }
        }
        profile
    }

    /// Read an archive container. Any IO or parse failure is reported as
    /// an unreadable archive.
    pub fn load(path: &Path) -> CombineResult<Self> {
        let unreadable = |reason: String| CombineError::UnreadableArchive {
            archive: path.display().to_string(),
            reason,
        };
        let contents = fs::read_to_string(path).map_err(|err| unreadable(err.to_string()))?;
        let doc: ContainerDoc =
            serde_json::from_str(&contents).map_err(|err| unreadable(err.to_string()))?;
        if doc.data.len() != doc.nchan * doc.nbin {
            return Err(unreadable(format!(
                "sample count {} does not match {} channels x {} bins",
                doc.data.len(),
                doc.nchan,
                doc.nbin
            )));
        }
        let data = Array2::from_shape_vec((doc.nchan, doc.nbin), doc.data)
            .map_err(|err| unreadable(err.to_string()))?;
        let mut archive = Archive::new(doc.header, doc.weights, data)
            .map_err(|err| unreadable(err.to_string()))?;
        if archive.header.members.is_empty() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                archive.header.members.push(stem.to_string());
            }
        }
        Ok(archive)
    }

    /// Write the container to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> CombineResult<()> {
        let json = serde_json::to_vec(&self.to_doc())
            .map_err(|err| CombineError::Internal(format!("encoding archive: {}", err)))?;
        fs::write(path, json).map_err(|err| {
            CombineError::Internal(format!("writing archive {}: {}", path.display(), err))
        })
    }

    /// Commit the container to `dest` through a named temp file in the
    /// destination's directory. Refuses to overwrite an existing file.
    pub fn commit(&self, dest: &Path) -> CombineResult<()> {
        let parent = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let json = serde_json::to_vec(&self.to_doc())
            .map_err(|err| CombineError::Commit(err.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|err| CombineError::Commit(err.to_string()))?;
        tmp.write_all(&json)
            .map_err(|err| CombineError::Commit(err.to_string()))?;
        tmp.persist_noclobber(dest)
            .map_err(|err| CombineError::Commit(err.to_string()))?;
        Ok(())
    }

    fn to_doc(&self) -> ContainerDoc {
        ContainerDoc {
            header: self.header.clone(),
            nchan: self.nchan(),
            nbin: self.nbin(),
            weights: self.weights.clone(),
            data: self.data.iter().copied().collect(),
        }
    }
}
