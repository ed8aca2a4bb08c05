//! Integration tests for the bandwidth sweep.

use iperf3_sweep::artifact::ARTIFACT_FILE_NAME;
use iperf3_sweep::{
    ArtifactStore, AttemptRequest, BandwidthTarget, ChartGenerator, Iperf3Invoker, Jitter,
    MeasurementError, MeasurementTool, Protocol, ReportGenerator, StabilityAnalyzer,
    SweepArtifact, SweepConfig, SweepController, VerdictStatus,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Loss per target rate: 100 Mbps loses 2%, 50 Mbps 0.5%, the rest nothing
const LOSSY_PATH_SCRIPT: &str = r#"
rate=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-b" ]; then rate="$arg"; fi
  prev="$arg"
done
case "$rate" in
  100M) loss=2.0 ;;
  50M) loss=0.5 ;;
  *) loss=0.0 ;;
esac
cat <<EOF
{"start": {"version": "iperf 3.9", "test_start": {"protocol": "UDP", "num_streams": 1}},
 "end": {"sum": {"seconds": 1.0, "bytes": 125000, "bits_per_second": 1000000.0,
                 "jitter_ms": 0.05, "lost_packets": 0, "packets": 100, "lost_percent": $loss}}}
EOF
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn sh_command(script: &Path) -> Vec<String> {
    vec!["sh".to_string(), script.display().to_string()]
}

fn request(target: BandwidthTarget, duration_secs: u64) -> AttemptRequest {
    AttemptRequest {
        server: "127.0.0.1".to_string(),
        port: 5201,
        duration_secs,
        parallel: 1,
        target,
        protocol: Protocol::Udp,
    }
}

#[test]
fn test_config_defaults() {
    let config = SweepConfig::default();
    assert!(config.server.is_empty());
    assert_eq!(config.port, 5201);
    assert_eq!(config.duration_secs, 10);
    assert_eq!(config.parallel, 1);
    assert_eq!(config.protocol, Protocol::Udp);
    assert_eq!(config.threshold_percent, 1.0);
    assert_eq!(config.grace_ms, 10_000);
    assert_eq!(config.pause_ms, 2_000);
    assert_eq!(config.max_retries, 0);
    assert!(config.validate().is_err());
}

#[test]
fn test_config_serialization() {
    let config = SweepConfig {
        server: "198.51.100.7".to_string(),
        port: 5202,
        duration_secs: 5,
        parallel: 4,
        bandwidths: vec![BandwidthTarget::Unbounded, BandwidthTarget::Mbps(250.0)],
        protocol: Protocol::Tcp,
        threshold_percent: 0.5,
        grace_ms: 3_000,
        pause_ms: 0,
        max_retries: 2,
        tool_command: vec!["/usr/local/bin/iperf3".to_string()],
    };

    let json = serde_json::to_string(&config).unwrap();
    let parsed: SweepConfig = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.server, config.server);
    assert_eq!(parsed.port, config.port);
    assert_eq!(parsed.duration_secs, config.duration_secs);
    assert_eq!(parsed.parallel, config.parallel);
    assert_eq!(parsed.bandwidths, config.bandwidths);
    assert_eq!(parsed.protocol, config.protocol);
    assert_eq!(parsed.threshold_percent, config.threshold_percent);
    assert_eq!(parsed.max_retries, config.max_retries);
    assert_eq!(parsed.tool_command, config.tool_command);
}

/// Replays canned payloads, one per call
struct Canned(Vec<&'static str>, std::sync::atomic::AtomicUsize);

impl MeasurementTool for Canned {
    async fn measure(&self, request: &AttemptRequest) -> Result<String, MeasurementError> {
        let idx = self.1.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match self.0.get(idx) {
            Some(payload) => Ok(payload.to_string()),
            None => Err(MeasurementError::Exit {
                target: request.target,
                status: "exit status: 1".to_string(),
                diagnostic: "no more payloads".to_string(),
            }),
        }
    }
}

#[test]
fn test_sweep_with_missing_jitter() {
    let tool = Canned(
        vec![
            r#"{"end": {"sum": {"bits_per_second": 2.0e7, "lost_percent": 0.0}}}"#,
            r#"{"end": {"sum": {"bits_per_second": 1.0e7, "jitter_ms": 0.0, "lost_percent": 0.0}}}"#,
        ],
        Default::default(),
    );
    let config = SweepConfig {
        server: "192.0.2.1".to_string(),
        bandwidths: vec![BandwidthTarget::Mbps(20.0), BandwidthTarget::Mbps(10.0)],
        pause_ms: 0,
        ..Default::default()
    };
    let result = tokio_test::block_on(SweepController::new(config, tool).run());

    assert_eq!(result.attempts()[0].jitter(), Jitter::NotMeasured);
    assert_eq!(result.attempts()[1].jitter(), Jitter::Measured(0.0));

    let verdict = StabilityAnalyzer::default().analyze(&result);
    let report = ReportGenerator::new(false).render(&result, &verdict);
    assert!(report.contains("n/a"));
    assert!(report.contains("0.000 ms"));

    let dir = TempDir::new().unwrap();
    let svg = ChartGenerator::new().jitter_chart(&result).unwrap();
    assert_eq!(svg.matches("<circle").count(), 1);
    assert!(ChartGenerator::new().render_all(&result, dir.path()).len() == 3);
}

#[cfg(unix)]
#[tokio::test]
async fn test_invoker_runs_tool_with_client_arguments() {
    let dir = TempDir::new().unwrap();
    let args_file = dir.path().join("args.txt");
    let script = write_script(
        dir.path(),
        "echo_args.sh",
        &format!(
            "echo \"$@\" > '{}'\necho '{{\"end\": {{}}}}'\n",
            args_file.display()
        ),
    );

    let invoker = Iperf3Invoker::new(sh_command(&script), Duration::from_secs(5));
    let output = invoker
        .run(&request(BandwidthTarget::Mbps(50.0), 1))
        .await
        .unwrap();

    assert_eq!(output.trim(), r#"{"end": {}}"#);
    let args = std::fs::read_to_string(&args_file).unwrap();
    assert_eq!(args.trim(), "-c 127.0.0.1 -p 5201 -t 1 -P 1 -b 50M -J -u");
}

#[cfg(unix)]
#[tokio::test]
async fn test_invoker_reports_non_zero_exit() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "refused.sh",
        "echo 'iperf3: error - unable to connect to server: Connection refused' >&2\nexit 1\n",
    );

    let invoker = Iperf3Invoker::new(sh_command(&script), Duration::from_secs(5));
    let err = invoker
        .run(&request(BandwidthTarget::Mbps(10.0), 1))
        .await
        .unwrap_err();

    match err {
        MeasurementError::Exit { target, diagnostic, .. } => {
            assert_eq!(target, BandwidthTarget::Mbps(10.0));
            assert!(diagnostic.contains("Connection refused"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_invoker_terminates_hung_tool() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "hang.sh", "exec sleep 30\n");

    let invoker = Iperf3Invoker::new(sh_command(&script), Duration::from_millis(300))
        .with_terminate_wait(Duration::from_millis(500));
    let started = std::time::Instant::now();
    let err = invoker
        .run(&request(BandwidthTarget::Mbps(10.0), 0))
        .await
        .unwrap_err();

    assert!(matches!(err, MeasurementError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[cfg(unix)]
#[tokio::test]
async fn test_preflight_reports_banner() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "version.sh", "echo 'iperf 3.16 (cJSON 1.7.15)'\n");
    let invoker = Iperf3Invoker::new(sh_command(&script), Duration::from_secs(1));
    assert_eq!(invoker.preflight().await.unwrap(), "iperf 3.16 (cJSON 1.7.15)");
}

#[cfg(unix)]
#[tokio::test]
async fn test_end_to_end_sweep_persists_artifact() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "lossy.sh", LOSSY_PATH_SCRIPT);

    let config = SweepConfig {
        server: "127.0.0.1".to_string(),
        duration_secs: 1,
        bandwidths: vec![
            BandwidthTarget::Mbps(100.0),
            BandwidthTarget::Mbps(50.0),
            BandwidthTarget::Mbps(20.0),
        ],
        pause_ms: 0,
        tool_command: sh_command(&script),
        ..Default::default()
    };
    config.validate().unwrap();

    let invoker = Iperf3Invoker::from_config(&config);
    let result = SweepController::new(config, invoker).run().await;
    assert_eq!(result.success_count(), 3);

    let verdict = StabilityAnalyzer::default().analyze(&result);
    assert_eq!(verdict.status, VerdictStatus::MetThreshold);
    assert_eq!(verdict.best_bandwidth, Some(50.0));

    let store = ArtifactStore::new(dir.path().join("results"));
    let run_dir = store.create_run_dir(result.timestamp).unwrap();
    let artifact = SweepArtifact::new(result, verdict);
    let path = store.persist(&run_dir, &artifact).unwrap();
    assert_eq!(path, run_dir.join(ARTIFACT_FILE_NAME));

    let loaded = SweepArtifact::load(&path).unwrap();
    assert_eq!(loaded.result.attempts(), artifact.result.attempts());
    assert_eq!(loaded.stability_verdict, artifact.stability_verdict);
}
