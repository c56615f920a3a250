use std::path::{Path, PathBuf};

use crate::archive::Archive;
use crate::prelude::{ArchiveToolkit, CombineError, CombineResult, EngineConfig};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;

/// Lifecycle of a combination run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Empty,
    Seeded,
    Extending,
    Done,
    Aborted,
}

/// A ranked input surviving the readability filter.
struct RankedInput {
    path: PathBuf,
    archive: Archive,
    snr: f64,
}

/// The running combined archive owned by the engine.
struct Accumulator {
    archive: Archive,
    snr: f64,
    members: Vec<PathBuf>,
}

/// Summary of a finished combination run.
#[derive(Debug, Clone)]
pub struct CombineOutcome {
    pub destination: PathBuf,
    pub final_snr: f64,
    pub members: Vec<PathBuf>,
    pub accepted: usize,
    pub rejected: usize,
    pub excluded: usize,
}

/// Greedy SNR-guided combination engine.
///
/// Inputs are ranked by SNR; the best seeds the accumulator and each
/// further candidate is phase-aligned, tentatively merged, and kept only
/// if the merge improves the accumulated SNR (unless always-add is set).
/// Acceptance is irreversible; a rejected attempt leaves a comparison
/// artifact behind and the accumulator untouched.
pub struct CombineEngine<'a, T: ArchiveToolkit> {
    toolkit: &'a T,
    config: EngineConfig,
    state: EngineState,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl<'a, T: ArchiveToolkit> CombineEngine<'a, T> {
    pub fn new(toolkit: &'a T, config: EngineConfig) -> Self {
        Self {
            toolkit,
            config,
            state: EngineState::Empty,
            metrics: MetricsRecorder::new(),
            logger: LogManager::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run one full combination: rank the inputs, seed from the best one,
    /// greedily extend, and commit the result to `destination`.
    pub fn run(&mut self, inputs: &[PathBuf], destination: &Path) -> CombineResult<CombineOutcome> {
        match self.try_run(inputs, destination) {
            Ok(outcome) => {
                self.state = EngineState::Done;
                Ok(outcome)
            }
            Err(err) => {
                self.state = EngineState::Aborted;
                Err(err)
            }
        }
    }

    fn try_run(
        &mut self,
        inputs: &[PathBuf],
        destination: &Path,
    ) -> CombineResult<CombineOutcome> {
        if destination.exists() {
            return Err(CombineError::DestinationExists(destination.to_path_buf()));
        }

        let ranked = self.rank_inputs(inputs)?;
        let excluded = inputs.len() - ranked.len();

        let mut ranked = ranked.into_iter();
        let seed = ranked
            .next()
            .ok_or(CombineError::InsufficientInput)?;
        let mut accumulator = self.seed(seed);
        self.state = EngineState::Seeded;

        for candidate in ranked {
            self.state = EngineState::Extending;
            self.extend(&mut accumulator, candidate, destination);
        }

        accumulator.archive.commit(destination)?;
        let (accepted, rejected) = self.metrics.snapshot();
        self.logger.record(&format!(
            "committed {} (SNR {:.2}, {} members)",
            destination.display(),
            accumulator.snr,
            accumulator.members.len()
        ));
        Ok(CombineOutcome {
            destination: destination.to_path_buf(),
            final_snr: accumulator.snr,
            members: accumulator.members,
            accepted,
            rejected,
            excluded,
        })
    }

    /// Load every input, query its SNR, and sort descending. Unreadable
    /// inputs are excluded with a warning; ties keep discovery order.
    fn rank_inputs(&self, inputs: &[PathBuf]) -> CombineResult<Vec<RankedInput>> {
        let mut ranked = Vec::with_capacity(inputs.len());
        for path in inputs {
            let archive = match Archive::load(path) {
                Ok(archive) => archive,
                Err(err) => {
                    self.logger
                        .warn(&format!("excluding {}: {}", path.display(), err));
                    continue;
                }
            };
            let snr = match self.toolkit.snr(&archive) {
                Ok(snr) => snr,
                Err(err) => {
                    self.logger
                        .warn(&format!("excluding {}: {}", path.display(), err));
                    continue;
                }
            };
            if snr < self.config.min_snr {
                self.logger.record(&format!(
                    "excluding {}: SNR {:.2} below floor {:.2}",
                    path.display(),
                    snr,
                    self.config.min_snr
                ));
                continue;
            }
            ranked.push(RankedInput {
                path: path.clone(),
                archive,
                snr,
            });
        }
        if ranked.is_empty() {
            return Err(CombineError::InsufficientInput);
        }
        // Stable sort keeps discovery order for equal SNRs.
        ranked.sort_by(|a, b| {
            b.snr
                .partial_cmp(&a.snr)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(ranked)
    }

    fn seed(&mut self, input: RankedInput) -> Accumulator {
        let mut archive = input.archive;
        archive.header.source = self.toolkit.canonical_name(&archive.header.source);
        self.logger.record(&format!(
            "seeded with {} (SNR {:.2})",
            input.path.display(),
            input.snr
        ));
        Accumulator {
            archive,
            snr: input.snr,
            members: vec![input.path],
        }
    }

    /// Attempt to fold one candidate into the accumulator. Alignment or
    /// compatibility failures force a rejection; only the accept path
    /// mutates the accumulator.
    fn extend(&mut self, accumulator: &mut Accumulator, candidate: RankedInput, destination: &Path) {
        let mut cand_archive = candidate.archive;
        cand_archive.header.source = self.toolkit.canonical_name(&cand_archive.header.source);
        let diag_path = self.diagnostic_path(&candidate.path, destination);

        let offset = match self
            .toolkit
            .phase_offset(&accumulator.archive, &cand_archive)
        {
            Ok(offset) => offset,
            Err(err) => {
                self.logger.warn(&format!(
                    "forced rejection of {}: {}",
                    candidate.path.display(),
                    err
                ));
                self.reject(None, accumulator, &cand_archive, &diag_path);
                return;
            }
        };

        let attempt = match self
            .toolkit
            .combine(&accumulator.archive, &cand_archive, offset)
        {
            Ok(attempt) => attempt,
            Err(err) => {
                self.logger.warn(&format!(
                    "forced rejection of {}: {}",
                    candidate.path.display(),
                    err
                ));
                self.reject(None, accumulator, &cand_archive, &diag_path);
                return;
            }
        };

        match self.toolkit.snr(&attempt) {
            Ok(snr) if self.config.always_add || snr > accumulator.snr => {
                self.logger.record(&format!(
                    "accepted {}: SNR {:.2} -> {:.2}",
                    candidate.path.display(),
                    accumulator.snr,
                    snr
                ));
                accumulator.archive = attempt;
                accumulator.snr = snr;
                accumulator.members.push(candidate.path);
                self.metrics.record_accepted();
            }
            Ok(snr) => {
                self.logger.record(&format!(
                    "rejected {}: SNR {:.2} would not improve on {:.2}",
                    candidate.path.display(),
                    snr,
                    accumulator.snr
                ));
                self.reject(Some(&attempt), accumulator, &cand_archive, &diag_path);
            }
            Err(err) if self.config.always_add => {
                // Always-add keeps folding; the running SNR stays at its
                // last known value.
                self.logger.warn(&format!(
                    "adding {} despite unevaluable merge: {}",
                    candidate.path.display(),
                    err
                ));
                accumulator.archive = attempt;
                accumulator.members.push(candidate.path);
                self.metrics.record_accepted();
            }
            Err(err) => {
                self.logger.warn(&format!(
                    "forced rejection of {}: {}",
                    candidate.path.display(),
                    err
                ));
                self.reject(Some(&attempt), accumulator, &cand_archive, &diag_path);
            }
        }
    }

    fn reject(
        &self,
        attempt: Option<&Archive>,
        accumulator: &Accumulator,
        candidate: &Archive,
        diag_path: &Path,
    ) {
        self.metrics.record_rejected();
        if let Err(err) =
            self.toolkit
                .render_diagnostic(attempt, &accumulator.archive, candidate, diag_path)
        {
            self.logger.warn(&format!(
                "diagnostic for {} failed: {}",
                diag_path.display(),
                err
            ));
        }
    }

    fn diagnostic_path(&self, candidate_path: &Path, destination: &Path) -> PathBuf {
        let stem = candidate_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("candidate");
        let dir = self.config.diagnostics_dir.clone().unwrap_or_else(|| {
            destination
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });
        dir.join(format!("{}.cmp.json", stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveHeader;
    use ndarray::Array2;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Scripted toolkit: SNR is read off `length_s`, merges pop their SNR
    /// from a queue, and every collaborator call is counted.
    struct MockToolkit {
        merge_snrs: RefCell<VecDeque<f64>>,
        snr_calls: Cell<usize>,
        align_calls: Cell<usize>,
        combine_calls: Cell<usize>,
        diagnostics: RefCell<Vec<PathBuf>>,
        fail_alignment_for: Option<String>,
    }

    impl MockToolkit {
        fn new(merge_snrs: Vec<f64>) -> Self {
            Self {
                merge_snrs: RefCell::new(merge_snrs.into()),
                snr_calls: Cell::new(0),
                align_calls: Cell::new(0),
                combine_calls: Cell::new(0),
                diagnostics: RefCell::new(Vec::new()),
                fail_alignment_for: None,
            }
        }
    }

    impl ArchiveToolkit for MockToolkit {
        fn snr(&self, archive: &Archive) -> CombineResult<f64> {
            self.snr_calls.set(self.snr_calls.get() + 1);
            Ok(archive.header.length_s)
        }

        fn canonical_name(&self, raw: &str) -> String {
            crate::processing::names::preferred_name(raw)
        }

        fn phase_offset(&self, _reference: &Archive, candidate: &Archive) -> CombineResult<f64> {
            self.align_calls.set(self.align_calls.get() + 1);
            if let Some(bad) = &self.fail_alignment_for {
                if candidate.header.members.contains(bad) {
                    return Err(CombineError::Alignment("scripted failure".to_string()));
                }
            }
            Ok(0.0)
        }

        fn combine(
            &self,
            accumulator: &Archive,
            candidate: &Archive,
            _phase_offset: f64,
        ) -> CombineResult<Archive> {
            self.combine_calls.set(self.combine_calls.get() + 1);
            let mut merged = accumulator.clone();
            let scripted = self.merge_snrs.borrow_mut().pop_front();
            merged.header.length_s = scripted
                .ok_or_else(|| CombineError::Internal("merge queue exhausted".to_string()))?;
            for stem in &candidate.header.members {
                if !merged.header.members.contains(stem) {
                    merged.header.members.push(stem.clone());
                }
            }
            Ok(merged)
        }

        fn render_diagnostic(
            &self,
            _attempt: Option<&Archive>,
            _accumulator: &Archive,
            _candidate: &Archive,
            out_path: &Path,
        ) -> CombineResult<()> {
            self.diagnostics.borrow_mut().push(out_path.to_path_buf());
            Ok(())
        }
    }

    /// Write a container whose scripted SNR is its `length_s`.
    fn write_input(dir: &Path, stem: &str, snr: f64) -> PathBuf {
        let header = ArchiveHeader {
            source: "b0531+21".to_string(),
            ctr_freq_mhz: 1360.0,
            start_mjd: 56000.0,
            rcvr: "P217-3".to_string(),
            backend: "asterix".to_string(),
            length_s: snr,
            members: vec![],
        };
        let data = Array2::zeros((2, 16));
        let archive = Archive::new(header, vec![1.0, 1.0], data).unwrap();
        let path = dir.join(format!("{}.ar", stem));
        archive.save(&path).unwrap();
        path
    }

    #[test]
    fn scenario_ranks_seeds_and_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_input(dir.path(), "A", 10.0);
        let b = write_input(dir.path(), "B", 7.0);
        let c = write_input(dir.path(), "C", 15.0);
        let dest = dir.path().join("out.ar");

        // Ranked order is [C, A, B]: C+A merges to 18 (accept), then
        // B's attempt lands at 16 (reject).
        let toolkit = MockToolkit::new(vec![18.0, 16.0]);
        let mut engine = CombineEngine::new(&toolkit, EngineConfig::default());
        let outcome = engine
            .run(&[a.clone(), b.clone(), c.clone()], &dest)
            .unwrap();

        assert_eq!(engine.state(), EngineState::Done);
        assert_eq!(outcome.members, vec![c, a]);
        assert!((outcome.final_snr - 18.0).abs() < 1e-9);
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(
            toolkit.diagnostics.borrow().as_slice(),
            &[dir.path().join("B.cmp.json")]
        );

        let committed = Archive::load(&dest).unwrap();
        assert_eq!(committed.header.members, vec!["C", "A"]);
        assert_eq!(committed.header.source, "J0534+2200");
    }

    #[test]
    fn single_input_seeds_without_alignment() {
        let dir = tempfile::tempdir().unwrap();
        let d = write_input(dir.path(), "D", 12.0);
        let dest = dir.path().join("out.ar");

        let toolkit = MockToolkit::new(vec![]);
        let mut engine = CombineEngine::new(&toolkit, EngineConfig::default());
        let outcome = engine.run(&[d.clone()], &dest).unwrap();

        assert_eq!(outcome.members, vec![d]);
        assert!((outcome.final_snr - 12.0).abs() < 1e-9);
        assert_eq!(toolkit.align_calls.get(), 0);
        assert_eq!(toolkit.combine_calls.get(), 0);
        assert!(toolkit.diagnostics.borrow().is_empty());

        let committed = Archive::load(&dest).unwrap();
        assert_eq!(committed.header.source, "J0534+2200");
    }

    #[test]
    fn existing_destination_fails_before_any_collaborator_call() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_input(dir.path(), "A", 10.0);
        let dest = dir.path().join("out.ar");
        std::fs::write(&dest, b"prior result").unwrap();

        let toolkit = MockToolkit::new(vec![]);
        let mut engine = CombineEngine::new(&toolkit, EngineConfig::default());
        let err = engine.run(&[a], &dest).unwrap_err();

        assert!(matches!(err, CombineError::DestinationExists(_)));
        assert_eq!(engine.state(), EngineState::Aborted);
        assert_eq!(toolkit.snr_calls.get(), 0);
        assert_eq!(toolkit.align_calls.get(), 0);
        assert_eq!(toolkit.combine_calls.get(), 0);
        assert_eq!(std::fs::read(&dest).unwrap(), b"prior result");
    }

    #[test]
    fn strict_mode_snr_never_decreases() {
        let dir = tempfile::tempdir().unwrap();
        let inputs: Vec<PathBuf> = [("A", 20.0), ("B", 15.0), ("C", 12.0), ("D", 9.0)]
            .iter()
            .map(|(stem, snr)| write_input(dir.path(), stem, *snr))
            .collect();
        let dest = dir.path().join("out.ar");

        // Merges: improve, degrade, improve.
        let toolkit = MockToolkit::new(vec![25.0, 21.0, 30.0]);
        let mut engine = CombineEngine::new(&toolkit, EngineConfig::default());
        let outcome = engine.run(&inputs, &dest).unwrap();

        assert!((outcome.final_snr - 30.0).abs() < 1e-9);
        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(toolkit.diagnostics.borrow().len(), 1);
    }

    #[test]
    fn always_add_folds_every_input() {
        let dir = tempfile::tempdir().unwrap();
        let inputs: Vec<PathBuf> = [("A", 20.0), ("B", 15.0), ("C", 12.0)]
            .iter()
            .map(|(stem, snr)| write_input(dir.path(), stem, *snr))
            .collect();
        let dest = dir.path().join("out.ar");

        // Every merge degrades, but always-add keeps folding.
        let toolkit = MockToolkit::new(vec![18.0, 14.0]);
        let config = EngineConfig {
            always_add: true,
            ..EngineConfig::default()
        };
        let mut engine = CombineEngine::new(&toolkit, config);
        let outcome = engine.run(&inputs, &dest).unwrap();

        assert_eq!(outcome.members, inputs);
        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.rejected, 0);
        assert!(toolkit.diagnostics.borrow().is_empty());
    }

    #[test]
    fn ties_keep_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_input(dir.path(), "first", 10.0);
        let second = write_input(dir.path(), "second", 10.0);
        let dest = dir.path().join("out.ar");

        let toolkit = MockToolkit::new(vec![11.0]);
        let mut engine = CombineEngine::new(&toolkit, EngineConfig::default());
        let outcome = engine.run(&[first.clone(), second.clone()], &dest).unwrap();

        assert_eq!(outcome.members, vec![first, second]);
    }

    #[test]
    fn alignment_failure_is_a_forced_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_input(dir.path(), "A", 20.0);
        let b = write_input(dir.path(), "B", 15.0);
        let c = write_input(dir.path(), "C", 12.0);
        let dest = dir.path().join("out.ar");

        let mut toolkit = MockToolkit::new(vec![25.0]);
        toolkit.fail_alignment_for = Some("B".to_string());
        let mut engine = CombineEngine::new(&toolkit, EngineConfig::default());
        let outcome = engine.run(&[a.clone(), b, c.clone()], &dest).unwrap();

        // B is forcibly rejected, C still gets its attempt.
        assert_eq!(outcome.members, vec![a, c]);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(
            toolkit.diagnostics.borrow().as_slice(),
            &[dir.path().join("B.cmp.json")]
        );
        assert_eq!(engine.state(), EngineState::Done);
    }

    #[test]
    fn unreadable_inputs_are_excluded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_input(dir.path(), "A", 20.0);
        let junk = dir.path().join("junk.ar");
        std::fs::write(&junk, b"not an archive").unwrap();
        let dest = dir.path().join("out.ar");

        let toolkit = MockToolkit::new(vec![]);
        let mut engine = CombineEngine::new(&toolkit, EngineConfig::default());
        let outcome = engine.run(&[junk, a.clone()], &dest).unwrap();

        assert_eq!(outcome.members, vec![a]);
        assert_eq!(outcome.excluded, 1);
    }

    #[test]
    fn empty_survivor_set_is_insufficient() {
        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("junk.ar");
        std::fs::write(&junk, b"not an archive").unwrap();
        let dest = dir.path().join("out.ar");

        let toolkit = MockToolkit::new(vec![]);
        let mut engine = CombineEngine::new(&toolkit, EngineConfig::default());
        let err = engine.run(&[junk], &dest).unwrap_err();

        assert!(matches!(err, CombineError::InsufficientInput));
        assert_eq!(engine.state(), EngineState::Aborted);
        assert!(!dest.exists());
    }

    #[test]
    fn min_snr_floor_excludes_weak_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let strong = write_input(dir.path(), "strong", 20.0);
        let weak = write_input(dir.path(), "weak", 2.0);
        let dest = dir.path().join("out.ar");

        let toolkit = MockToolkit::new(vec![]);
        let config = EngineConfig {
            min_snr: 5.0,
            ..EngineConfig::default()
        };
        let mut engine = CombineEngine::new(&toolkit, config);
        let outcome = engine.run(&[weak, strong.clone()], &dest).unwrap();

        assert_eq!(outcome.members, vec![strong]);
        assert_eq!(outcome.excluded, 1);
        assert_eq!(toolkit.align_calls.get(), 0);
    }
}
