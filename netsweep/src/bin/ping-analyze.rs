use clap::Parser;
use netsweep::{logging, Settings};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

/// Summarise a saved ping log: loss, round-trip times, jitter and spikes
#[derive(Parser, Debug)]
#[command(name = "ping-analyze", version, about)]
struct Args {
    /// Log file written by ping
    log: PathBuf,

    /// Also write an RTT-by-sequence chart to this SVG file
    #[arg(long)]
    chart: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let settings = Settings::load_or_default();
    logging::init(&settings.logging.level, args.verbose);

    let (log, stats) = match ping_log::analyze_file(&args.log) {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let color = settings.output.color && std::io::stdout().is_terminal();
    ping_log::print_summary(&args.log, &stats, color);

    if let Some(chart) = &args.chart {
        if let Err(e) = ping_log::write_rtt_chart(&log, chart) {
            tracing::warn!("Chart not written: {}", e);
        }
    }
    ExitCode::SUCCESS
}
