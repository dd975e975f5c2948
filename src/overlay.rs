use serde::Serialize;

use std::io::Write;

use crate::mapper::VisualParameters;
use crate::orchestrator::ConnectFirstMarker;
use crate::stats::connection::ConnectionStatus;
use crate::stats::TelemetrySample;

/// Everything the presentation side gets on each publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub parameters: VisualParameters,
    pub status: ConnectionStatus,
    pub connect_first: ConnectFirstMarker,
    pub sample: Option<TelemetrySample>,
}

pub trait ParameterSink {
    fn publish(&mut self, frame: &Frame);
}

impl ParameterSink for Vec<Frame> {
    fn publish(&mut self, frame: &Frame) {
        self.push(frame.clone());
    }
}

impl<S: ParameterSink + ?Sized> ParameterSink for Box<S> {
    fn publish(&mut self, frame: &Frame) {
        (**self).publish(frame)
    }
}

pub fn bytes_to_display(bytes: f64) -> (f64, &'static str) {
    let tb = bytes / 1024f64.powi(4);
    if tb >= 1.0 {
        return ((tb * 10.0).round() / 10.0, "TB");
    }
    let gb = bytes / 1024f64.powi(3);
    ((gb * 10.0).round() / 10.0, "GB")
}

fn format_bytes(bytes: f64) -> String {
    let (value, unit) = bytes_to_display(bytes);
    format!("{:.1} {}", value, unit)
}

pub fn describe_sample(sample: &TelemetrySample) -> String {
    format!(
        "CPU {:.1}% | RAM {} / {} | Storage {} / {}",
        sample.cpu_usage_percent(),
        format_bytes(sample.ram.used_bytes),
        format_bytes(sample.ram.total_bytes),
        format_bytes(sample.storage.used_bytes),
        format_bytes(sample.storage.total_bytes),
    )
}

/// Writes status and stats changes through `log`, parameters only at trace level.
#[derive(Debug, Default)]
pub struct LogSink {
    last_status: Option<ConnectionStatus>,
    last_sample: Option<TelemetrySample>,
}

impl LogSink {
    pub fn new() -> LogSink {
        LogSink::default()
    }
}

impl ParameterSink for LogSink {
    fn publish(&mut self, frame: &Frame) {
        if self.last_status != Some(frame.status) {
            match frame.connect_first.elapsed() {
                Some(elapsed) => info!["Server {} (first connected after {:.2}s)", frame.status, elapsed.as_secs_f64()],
                None => info!["Server {}", frame.status],
            }
            self.last_status = Some(frame.status);
        }

        if frame.sample != self.last_sample {
            if let Some(sample) = &frame.sample {
                info!["{}", describe_sample(sample)];
            }
            self.last_sample = frame.sample.clone();
        }

        trace!["Parameters: {:?}", frame.parameters];
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonFrame<'a> {
    #[serde(flatten)]
    parameters: &'a VisualParameters,
    status: ConnectionStatus,
    fade_delay: f64,
    stats: Option<&'a TelemetrySample>,
}

/// One JSON object per published frame, for an external shader host.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> JsonLinesSink<W> {
        JsonLinesSink { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ParameterSink for JsonLinesSink<W> {
    fn publish(&mut self, frame: &Frame) {
        let line = JsonFrame {
            parameters: &frame.parameters,
            status: frame.status,
            fade_delay: frame.connect_first.fade_delay_secs(),
            stats: frame.sample.as_ref(),
        };

        let mut bytes = match serde_json::to_vec(&line) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!["Failed to serialize frame: {}", err];
                return;
            },
        };
        bytes.push(b'\n');

        if let Err(err) = self.out.write_all(&bytes).and_then(|_| self.out.flush()) {
            error!["Failed to write frame: {}", err];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::sample;
    use std::time::Duration;

    fn frame(connect_first: ConnectFirstMarker) -> Frame {
        Frame {
            parameters: VisualParameters::NEUTRAL,
            status: ConnectionStatus::Connected,
            connect_first,
            sample: Some(sample(12.34, 50.0, 50.0)),
        }
    }

    #[test]
    fn bytes_switch_to_terabytes_at_one_tib() {
        assert_eq!(bytes_to_display(16.0 * 1024f64.powi(3)), (16.0, "GB"));
        assert_eq!(bytes_to_display(1023.0 * 1024f64.powi(3)), (1023.0, "GB"));
        assert_eq!(bytes_to_display(1024f64.powi(4)), (1.0, "TB"));
        assert_eq!(bytes_to_display(1.55 * 1024f64.powi(4)).1, "TB");
    }

    #[test]
    fn describes_sample_like_the_stats_panel() {
        assert_eq!(
            describe_sample(&sample(12.34, 50.0, 50.0)),
            "CPU 12.3% | RAM 8.0 GB / 16.0 GB | Storage 1.0 TB / 2.0 TB"
        );
    }

    #[test]
    fn json_lines_carry_parameters_status_and_fade_delay() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.publish(&frame(ConnectFirstMarker::unset()));
        let mut marker = ConnectFirstMarker::unset();
        marker.set_once(Duration::from_millis(1500));
        sink.publish(&frame(marker));

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["speed"], 1.0);
        assert_eq!(lines[0]["starDensity"], 1.0);
        assert_eq!(lines[0]["status"], "connected");
        assert_eq!(lines[0]["fadeDelay"], 9999.0);
        assert_eq!(lines[1]["fadeDelay"], 1.5);
        assert_eq!(lines[1]["stats"]["cpu"]["usage"], 12.34);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "reader went away"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failures_are_logged_not_fatal() {
        let mut sink = JsonLinesSink::new(BrokenPipe);
        sink.publish(&frame(ConnectFirstMarker::unset()));
        sink.publish(&frame(ConnectFirstMarker::unset()));
    }

    #[test]
    fn each_frame_is_one_newline_terminated_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.publish(&frame(ConnectFirstMarker::unset()));
        let out = sink.into_inner();
        assert_eq!(out.last(), Some(&b'\n'));
        assert_eq!(out.iter().filter(|byte| **byte == b'\n').count(), 1);
    }

    #[test]
    fn vec_sink_records_frames() {
        let mut frames: Vec<Frame> = Vec::new();
        frames.publish(&frame(ConnectFirstMarker::unset()));
        assert_eq!(frames.len(), 1);
    }
}
