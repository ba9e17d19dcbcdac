mod driver;
mod fixture;
mod harness;
mod matcher;

use std::{path::PathBuf, process::ExitCode};

/// Checks a decoder against fixture files: every field listed under `expected` must appear in
/// the decoded result with the same value.
#[derive(Debug, clap::Parser)]
#[command(version)]
struct Args {
    #[arg(value_name = "FIXTURE")]
    /// Fixture files to run in order, directories are expanded to the .json files inside them
    fixtures: Vec<PathBuf>,

    #[arg(long, value_name = "PATH", env = "HOLMES_DECODER", default_value = "holmes")]
    /// Decoder executable, run as `<PATH> decode -b|-x <payload>`
    decoder: String,

    #[arg(long)]
    /// Report every failing fixture instead of stopping at the first one
    keep_going: bool,

    #[arg(long)]
    /// Treat a decoder that exits unsuccessfully as a failure
    check_status: bool,

    #[arg(short, long)]
    /// Trace decoder runs on stderr and print a line per fixture plus a summary
    verbose: bool,
}

fn main() -> ExitCode {
    use clap::Parser;

    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            println!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<bool> {
    let fixtures = fixture::discover(&args.fixtures)?;

    let mut driver = driver::ExternalDriver::new(&args.decoder);
    if args.check_status {
        driver = driver.check_status();
    }
    if args.verbose {
        driver = driver.log();
    }

    let counts = harness::Harness::new(driver, std::io::stdout().lock())
        .keep_going(args.keep_going)
        .verbose(args.verbose)
        .run(&fixtures)?;

    Ok(counts.all_passed())
}
