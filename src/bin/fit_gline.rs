use clap::Parser;
use gline::file_fit_gline;
use gline::fitting::scurve::fitting::FitConfig;
use std::path::PathBuf;

pub type BinResult<T, E = Box<dyn std::error::Error + Send + Sync>> = Result<T, E>;

fn main() {
    env_logger::init();
    if let Err(e) = bin_main() {
        eprintln!("error: {e}");
        if let Some(e) = e.source() {
            eprintln!("error: {e}");
        }
        std::process::exit(1);
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file of flight-line elevation profiles
    #[arg()]
    infile: PathBuf,

    /// Output JSON report path
    #[arg()]
    outfile: PathBuf,

    /// Maximum number of solver iterations per flight line
    #[arg(long, default_value_t = FitConfig::default().max_iter)]
    max_iter: usize,

    /// Maximum number of model evaluations per flight line, 0 for no limit
    #[arg(long, default_value_t = FitConfig::default().max_fev)]
    max_fev: usize,

    /// Fitted steps smaller than this fraction of the elevation range are rejected
    #[arg(long, default_value_t = FitConfig::default().min_relative_amplitude)]
    min_relative_amplitude: f64,

    /// Fits whose RMS residual exceeds this fraction of the elevation range are rejected
    #[arg(long, default_value_t = FitConfig::default().max_relative_rms)]
    max_relative_rms: f64,

    /// Fit flight lines one after another instead of in parallel
    #[arg(long)]
    sequential: bool,
}

fn bin_main() -> BinResult<()> {
    let args = Args::parse();

    let config = FitConfig {
        max_iter: args.max_iter,
        max_fev: args.max_fev,
        min_relative_amplitude: args.min_relative_amplitude,
        max_relative_rms: args.max_relative_rms,
        ..Default::default()
    };

    // Fit the flight lines!
    let report = file_fit_gline(&args.infile, &args.outfile, &config, !args.sequential)?;
    for failure in &report.failures {
        eprintln!("skipped {}: {}", failure.id, failure.error);
    }
    println!(
        "{} flight lines fitted, report written to {}",
        report.fits.len(),
        args.outfile.display()
    );
    Ok(())
}
