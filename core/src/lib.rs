//! Archive-processing core for the Rust-based pulsar combination platform.
//!
//! The modules mirror the classic psradd-style reduction flow while providing
//! safe abstractions, an explicit engine state machine, and well-defined
//! collaborator seams.

pub mod archive;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use prelude::{ArchiveToolkit, CombineError, CombineResult, EngineConfig};
