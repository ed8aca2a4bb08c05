use clap::Parser;
use iperf3_sweep::error::Result;
use iperf3_sweep::{
    ArtifactStore, ChartGenerator, ConfigurationError, Iperf3Invoker, ReportGenerator,
    StabilityAnalyzer, SweepArtifact, SweepController,
};
use netsweep::cli::{exit_status, EXIT_INTERRUPTED};
use netsweep::{logging, signals, Settings, SweepArgs};
use std::io::IsTerminal;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = SweepArgs::parse();

    let settings = match &args.config {
        Some(path) => match Settings::load(Some(path.as_path())) {
            Ok(settings) => settings,
            Err(e) => {
                let e = ConfigurationError::Settings(format!("{}: {}", path.display(), e));
                eprintln!("Error: {}", e);
                return ExitCode::from(exit_status(&Err(e.into())));
            }
        },
        None => Settings::load_or_default(),
    };

    logging::init(&settings.logging.level, args.verbose);

    let outcome = run(&args, settings).await;
    match &outcome {
        Ok(0) => tracing::error!("No attempt succeeded"),
        Ok(_) => {}
        Err(e) => tracing::error!("{}", e),
    }
    ExitCode::from(exit_status(&outcome))
}

/// Run one sweep and save its results; returns the number of successful attempts
async fn run(args: &SweepArgs, mut settings: Settings) -> Result<usize> {
    args.apply(&mut settings)?;
    settings.sweep.validate()?;

    let invoker = Iperf3Invoker::from_config(&settings.sweep);
    let banner = invoker.preflight().await?;
    tracing::info!("Using {}", banner);

    let color = settings.output.color && std::io::stdout().is_terminal();
    let threshold = settings.sweep.threshold_percent;

    let controller = SweepController::new(settings.sweep.clone(), invoker);
    let shutdown = controller.shutdown_handle();
    tokio::spawn(async move {
        if signals::relay_interrupts(tokio::signal::ctrl_c, move || shutdown.shutdown()).await {
            std::process::exit(EXIT_INTERRUPTED);
        }
    });

    let result = controller.run().await;
    let verdict = StabilityAnalyzer::new(threshold).analyze(&result);

    let report = ReportGenerator::new(color);
    report.print(&result, &verdict);
    let report_text = report.render(&result, &verdict);
    let success_count = result.success_count();

    let store = ArtifactStore::new(&settings.output.dir);
    let run_dir = store.create_run_dir(result.timestamp)?;
    let artifact = SweepArtifact::new(result, verdict);
    store.persist(&run_dir, &artifact)?;
    if let Err(e) = store.write_report(&run_dir, &report_text) {
        tracing::warn!("{}", e);
    }
    ChartGenerator::new().render_all(&artifact.result, &run_dir);

    Ok(success_count)
}
