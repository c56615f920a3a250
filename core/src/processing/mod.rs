pub mod align;
pub mod engine;
pub mod names;
pub mod snr;
pub mod toolkit;

pub use align::PhaseAligner;
pub use engine::{CombineEngine, CombineOutcome, EngineState};
pub use snr::SnrEstimator;
pub use toolkit::PsrToolkit;
