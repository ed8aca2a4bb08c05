//! Turns raw iperf3 output into a [`MeasurementRecord`].

use crate::error::ParseError;
use crate::model::{AttemptRequest, Jitter, Measurement, MeasurementRecord, Protocol};
use crate::protocol::ClientReport;

/// Decode the JSON document without interpreting it
pub fn parse_report(raw: &str) -> Result<ClientReport, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(serde_json::from_str(raw)?)
}

/// Parse the output of one attempt
pub fn parse_measurement(
    raw: &str,
    request: &AttemptRequest,
) -> Result<MeasurementRecord, ParseError> {
    let report = parse_report(raw)?;
    let measurement = normalize(&report, request)?;
    Ok(MeasurementRecord::measured(request, measurement))
}

/// Extract the values of interest, tolerating the schema variants described
/// in [`crate::protocol`]
pub fn normalize(report: &ClientReport, request: &AttemptRequest) -> Result<Measurement, ParseError> {
    if let Some(error) = &report.error {
        return Err(ParseError::ToolReported(error.clone()));
    }

    let end = report.end.as_ref().ok_or(ParseError::MissingSection("end"))?;

    let protocol = match report.protocol() {
        Some(p) if p.eq_ignore_ascii_case("udp") => Protocol::Udp,
        Some(p) if p.eq_ignore_ascii_case("tcp") => Protocol::Tcp,
        _ => request.protocol,
    };

    let (throughput_summary, bits_per_second) = end
        .summaries()
        .find_map(|s| s.bits_per_second.map(|bps| (s, bps)))
        .ok_or(ParseError::MissingField("bits_per_second"))?;
    if !bits_per_second.is_finite() || bits_per_second < 0.0 {
        return Err(ParseError::InvalidValue {
            field: "bits_per_second",
            value: bits_per_second,
        });
    }

    let jitter = match end.summaries().find_map(|s| s.jitter_ms) {
        Some(ms) if ms.is_finite() && ms >= 0.0 => Jitter::Measured(ms),
        Some(ms) => {
            return Err(ParseError::InvalidValue {
                field: "jitter_ms",
                value: ms,
            })
        }
        None => Jitter::NotMeasured,
    };

    let loss_percent = match end.summaries().find_map(|s| s.loss_percent()) {
        Some(loss) if loss.is_finite() => {
            if !(0.0..=100.0).contains(&loss) {
                tracing::debug!("Clamping reported loss {:.3}% for {}", loss, request.target);
            }
            loss
        }
        Some(loss) => {
            return Err(ParseError::InvalidValue {
                field: "lost_percent",
                value: loss,
            })
        }
        // A TCP stream retransmits instead of losing data
        None if protocol == Protocol::Tcp => 0.0,
        None => return Err(ParseError::MissingField("lost_percent")),
    };

    let counters = end.summaries().find(|s| s.packets.is_some());

    Ok(Measurement {
        achieved_mbps: bits_per_second / 1_000_000.0,
        loss_percent,
        jitter,
        duration_secs: throughput_summary
            .seconds
            .unwrap_or(request.duration_secs as f64),
        retransmits: end.summaries().find_map(|s| s.retransmits),
        lost_packets: counters.and_then(|s| s.lost_packets),
        packets: counters.and_then(|s| s.packets),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::request;
    use crate::model::BandwidthTarget;

    const UDP_LEGACY: &str = r#"{
        "start": {"version": "iperf 3.7", "test_start": {"protocol": "UDP", "num_streams": 1}},
        "end": {
            "sum": {"seconds": 10.0, "bytes": 62500000, "bits_per_second": 49750000.0,
                    "jitter_ms": 0.042, "lost_packets": 12, "packets": 4000, "lost_percent": 0.3}
        }
    }"#;

    const UDP_RECENT: &str = r#"{
        "start": {"version": "iperf 3.16", "test_start": {"protocol": "UDP"}},
        "end": {
            "sum_sent": {"seconds": 10.0, "bits_per_second": 100000000.0, "lost_packets": 0, "packets": 8000, "lost_percent": 0.0},
            "sum_received": {"seconds": 10.01, "bits_per_second": 98000000.0, "jitter_ms": 0.11,
                             "lost_packets": 160, "packets": 8000, "lost_percent": 2.0}
        }
    }"#;

    #[test]
    fn test_parse_legacy_udp_summary() {
        let record = parse_measurement(UDP_LEGACY, &request(50.0)).unwrap();
        assert!(record.success());
        assert_eq!(record.target_bandwidth(), BandwidthTarget::Mbps(50.0));
        assert_eq!(record.achieved_throughput(), Some(49.75));
        assert_eq!(record.loss_percent(), Some(0.3));
        assert_eq!(record.jitter(), Jitter::Measured(0.042));
        assert_eq!(record.packets(), Some(4000));
        assert_eq!(record.duration_secs(), 10.0);
    }

    #[test]
    fn test_receiver_side_preferred() {
        let record = parse_measurement(UDP_RECENT, &request(100.0)).unwrap();
        assert_eq!(record.achieved_throughput(), Some(98.0));
        assert_eq!(record.loss_percent(), Some(2.0));
        assert_eq!(record.jitter(), Jitter::Measured(0.11));
        assert_eq!(record.lost_packets(), Some(160));
    }

    #[test]
    fn test_missing_jitter_is_not_measured() {
        let raw = r#"{"end": {"sum": {"bits_per_second": 2.0e7, "lost_packets": 0, "packets": 1700}}}"#;
        let record = parse_measurement(raw, &request(20.0)).unwrap();
        assert_eq!(record.jitter(), Jitter::NotMeasured);
        assert_eq!(record.loss_percent(), Some(0.0));
    }

    #[test]
    fn test_zero_jitter_is_measured() {
        let raw = r#"{"end": {"sum": {"bits_per_second": 2.0e7, "jitter_ms": 0.0, "lost_percent": 0.0}}}"#;
        let record = parse_measurement(raw, &request(20.0)).unwrap();
        assert_eq!(record.jitter(), Jitter::Measured(0.0));
    }

    #[test]
    fn test_tcp_without_counters() {
        let raw = r#"{
            "start": {"test_start": {"protocol": "TCP"}},
            "end": {"sum_sent": {"bits_per_second": 9.4e8, "retransmits": 17},
                    "sum_received": {"bits_per_second": 9.3e8}}
        }"#;
        let record = parse_measurement(raw, &request(1000.0)).unwrap();
        assert_eq!(record.achieved_throughput(), Some(930.0));
        assert_eq!(record.loss_percent(), Some(0.0));
        assert_eq!(record.retransmits(), Some(17));
        assert_eq!(record.jitter(), Jitter::NotMeasured);
    }

    #[test]
    fn test_udp_without_loss_is_an_error() {
        let raw = r#"{"start": {"test_start": {"protocol": "UDP"}}, "end": {"sum": {"bits_per_second": 1.0}}}"#;
        let err = parse_measurement(raw, &request(1.0)).unwrap_err();
        assert!(matches!(err, ParseError::MissingField("lost_percent")));
    }

    #[test]
    fn test_negative_loss_is_clamped() {
        let raw = r#"{"end": {"sum": {"bits_per_second": 1.0e6, "lost_packets": -3, "packets": 100}}}"#;
        let record = parse_measurement(raw, &request(1.0)).unwrap();
        assert_eq!(record.loss_percent(), Some(0.0));
        assert_eq!(record.lost_packets(), Some(-3));
    }

    #[test]
    fn test_empty_and_malformed_payloads() {
        assert!(matches!(parse_measurement("", &request(1.0)), Err(ParseError::Empty)));
        assert!(matches!(parse_measurement("  \n", &request(1.0)), Err(ParseError::Empty)));
        assert!(matches!(
            parse_measurement("iperf3: error - unable to connect", &request(1.0)),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_measurement(r#"{"end": {"sum": "#, &request(1.0)),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_tool_error_field() {
        let raw = r#"{"start": {}, "intervals": [], "end": {}, "error": "unable to connect to server: Connection refused"}"#;
        match parse_measurement(raw, &request(1.0)) {
            Err(ParseError::ToolReported(msg)) => assert!(msg.contains("Connection refused")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_end_section() {
        let raw = r#"{"start": {"version": "iperf 3.9"}}"#;
        assert!(matches!(
            parse_measurement(raw, &request(1.0)),
            Err(ParseError::MissingSection("end"))
        ));
    }

    #[test]
    fn test_missing_throughput() {
        let raw = r#"{"end": {"sum": {"jitter_ms": 0.1, "lost_percent": 0.0}}}"#;
        assert!(matches!(
            parse_measurement(raw, &request(1.0)),
            Err(ParseError::MissingField("bits_per_second"))
        ));
    }

    #[test]
    fn test_request_protocol_used_when_not_announced() {
        let mut req = request(10.0);
        req.protocol = Protocol::Tcp;
        let raw = r#"{"end": {"sum_received": {"bits_per_second": 1.0e7}}}"#;
        let record = parse_measurement(raw, &req).unwrap();
        assert_eq!(record.loss_percent(), Some(0.0));
    }
}
