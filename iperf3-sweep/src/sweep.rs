//! Sweep controller: runs one attempt per configured bandwidth, in order.

use crate::config::SweepConfig;
use crate::invoker::MeasurementTool;
use crate::model::{BandwidthTarget, MeasurementRecord, SweepResult};
use crate::parser;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Requests that a running sweep stop after the current point
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Stop issuing attempts. The attempt in flight is abandoned.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Drives a sweep against one server
pub struct SweepController<T> {
    config: SweepConfig,
    tool: T,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl<T: MeasurementTool> SweepController<T> {
    /// Create a controller. The configuration is expected to be validated.
    pub fn new(config: SweepConfig, tool: T) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            tool,
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Shutdown the sweep
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Run every configured attempt and return what was accumulated.
    ///
    /// Attempts run one at a time in configured order; failed attempts are
    /// recorded and the sweep moves on. After a shutdown request the result
    /// holds the attempts completed so far and is marked cancelled.
    pub async fn run(&self) -> SweepResult {
        let mut result = SweepResult::new(
            self.config.server.clone(),
            self.config.port,
            Utc::now(),
            self.config.summary(),
        );
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let pause = Duration::from_millis(self.config.pause_ms);
        let total = self.config.bandwidths.len();

        tracing::info!(
            "Starting {} sweep against {}:{} ({} targets, {}s each, {} stream(s))",
            self.config.protocol,
            self.config.server,
            self.config.port,
            total,
            self.config.duration_secs,
            self.config.parallel
        );

        for (index, &target) in self.config.bandwidths.iter().enumerate() {
            if *shutdown_rx.borrow() {
                result.mark_cancelled();
                break;
            }

            if index > 0 && !pause.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = shutdown_rx.wait_for(|stop| *stop) => {
                        result.mark_cancelled();
                        break;
                    }
                }
            }

            tracing::info!("[{}/{}] Testing {}", index + 1, total, target);

            let record = tokio::select! {
                record = self.attempt(target) => record,
                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    tracing::warn!("Sweep interrupted during attempt at {}", target);
                    result.mark_cancelled();
                    break;
                }
            };

            log_record(&record);
            result.push(record);
        }

        if result.cancelled {
            tracing::warn!(
                "Sweep cancelled after {} of {} attempts",
                result.attempts().len(),
                total
            );
        } else {
            tracing::info!(
                "Sweep complete: {} of {} attempts succeeded",
                result.success_count(),
                total
            );
        }
        result
    }

    /// One target, retried up to `max_retries` times. Only the final outcome
    /// is returned.
    async fn attempt(&self, target: BandwidthTarget) -> MeasurementRecord {
        let request = self.config.attempt(target);
        let mut retries = 0;
        loop {
            let started = Instant::now();
            let outcome = match self.tool.measure(&request).await {
                Ok(raw) => parser::parse_measurement(&raw, &request).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(record) => return record,
                Err(reason) if retries < self.config.max_retries => {
                    retries += 1;
                    tracing::warn!(
                        "Attempt at {} failed ({}), retry {}/{}",
                        target,
                        reason,
                        retries,
                        self.config.max_retries
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.pause_ms)).await;
                }
                Err(reason) => {
                    return MeasurementRecord::failed(
                        &request,
                        started.elapsed().as_secs_f64(),
                        reason,
                    );
                }
            }
        }
    }
}

fn log_record(record: &MeasurementRecord) {
    match (record.achieved_throughput(), record.loss_percent()) {
        (Some(achieved), Some(loss)) => tracing::info!(
            "  {}: achieved {:.2} Mbps, loss {:.2}%, jitter {}",
            record.target_bandwidth(),
            achieved,
            loss,
            record
                .jitter()
                .value()
                .map(|ms| format!("{:.3} ms", ms))
                .unwrap_or_else(|| "n/a".to_string())
        ),
        _ => tracing::warn!(
            "  {}: failed: {}",
            record.target_bandwidth(),
            record.error().unwrap_or("unknown error")
        ),
    }
}
