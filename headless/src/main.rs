use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use headless::init::{self, RunOptions};
use sim::boids::ExecutionMode;
use sim::TICKS_PER_SECOND;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Batched,
    Scalar,
}

impl From<Mode> for ExecutionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Batched => ExecutionMode::Batched,
            Mode::Scalar => ExecutionMode::Scalar,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// RON scenario file, the built-in scenario is used if it does not exist
    #[arg(short, long, default_value = "scenarios/reef.ron")]
    scenario: PathBuf,

    /// Stop after this many ticks, runs forever if omitted
    #[arg(short, long)]
    ticks: Option<u64>,

    #[arg(short, long, default_value_t = TICKS_PER_SECOND)]
    rate: u64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Override the scenario's flock execution mode
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Override whether floaters near the viewpoint use batched queries
    #[arg(long)]
    accurate_detection: Option<bool>,
}

fn main() {
    let args = Args::parse();

    if args.rate < 1 || args.rate > 1000 {
        eprintln!("Error: rate must be between 1 and 1000 ticks per second.");
        eprintln!("Got: {}", args.rate);
        std::process::exit(1);
    }

    init::init(
        &args.scenario,
        RunOptions {
            ticks: args.ticks,
            ticks_per_second: args.rate,
            seed: args.seed,
            execution_mode: args.mode.map(Into::into),
            accurate_detection: args.accurate_detection,
        },
    );
}
