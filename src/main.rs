use backman::backup::driver::{default_config_path, run, DriverOptions};
use backman::backup::prompt::InteractivePrompt;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::exit;
use tracing::{error, Level};

/// Back up directories as (encrypted) tar archives
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file [default: $XDG_CONFIG_HOME/backman/backman.ini]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of hooks run at the same time
    #[arg(short, long, allow_negative_numbers = true)]
    jobs: Option<i64>,

    /// Write every archive to this directory
    #[arg(long)]
    destdir: Option<PathBuf>,

    /// More output, repeat for even more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Continue with the next target after a failure
    #[arg(long)]
    keep_going: bool,

    /// Targets to back up, or `all`
    targets: Vec<String>,
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(log_level(args.verbose))
        .with_writer(std::io::stderr)
        .init();

    let options = DriverOptions::builder()
        .config(args.config.unwrap_or_else(default_config_path))
        .maybe_jobs(args.jobs)
        .maybe_destdir(args.destdir)
        .keep_going(args.keep_going)
        .targets(args.targets)
        .build();

    if let Err(e) = run(&options, &InteractivePrompt) {
        error!("{e}");
        exit(1);
    }
}
