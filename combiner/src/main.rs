use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use psrcore::CombineError;
use workflow::config::CombineConfig;
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "SNR-guided pulsar archive combination driver")]
struct Args {
    /// Destination for the combined archive (must not already exist)
    #[arg(short = 'o', long = "output")]
    output: PathBuf,
    /// Input archive containers to combine
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Fold in every readable input regardless of its effect on SNR
    #[arg(long, default_value_t = false)]
    always_add: bool,
    /// Ignore inputs whose SNR falls below this value
    #[arg(long, default_value_t = 0.0)]
    min_snr: f64,
    /// Leave out a specific input file (repeatable)
    #[arg(short = 'x', long = "exclude")]
    exclude: Vec<PathBuf>,
    /// Directory for rejection comparison artifacts
    /// (default: the destination's directory)
    #[arg(long)]
    diagnostics_dir: Option<PathBuf>,
    /// Load combination settings from YAML instead of flags
    #[arg(long)]
    workflow: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let config = if let Some(path) = &args.workflow {
        match CombineConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("error: {:#}", err);
                return ExitCode::from(1);
            }
        }
    } else {
        CombineConfig::from_args(args.always_add, args.min_snr, args.diagnostics_dir.clone())
    };

    let inputs: Vec<PathBuf> = args
        .inputs
        .iter()
        .filter(|path| !args.exclude.contains(path))
        .cloned()
        .collect();

    log::info!(
        "combining {} inputs into {}",
        inputs.len(),
        args.output.display()
    );

    let runner = Runner::new(config);
    match runner.execute(&inputs, &args.output) {
        Ok(summary) => {
            println!(
                "Combination run -> {} of {} inputs folded into {} (SNR {:.2}; accepted {}, rejected {}, excluded {})",
                summary.members.len(),
                inputs.len(),
                summary.destination.display(),
                summary.final_snr,
                summary.accepted,
                summary.rejected,
                summary.excluded
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CombineError>() {
        Some(CombineError::DestinationExists(_)) => 2,
        Some(CombineError::InsufficientInput) => 3,
        _ => 1,
    }
}
