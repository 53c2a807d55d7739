//! collectd exec plugin plain-text protocol.
//!
//! Each measurement becomes one line on the plugin's stdout:
//! ```text
//! PUTVAL "host/haproxy/derive-srv1.web.bytes_in" interval=10.000 1700000000.000:4096
//! ```

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Mutex;

use super::{Measurement, MetricWriter, Value, WriteError};

/// Writes `PUTVAL` lines to any `io::Write`.
///
/// Lines are written and flushed under a lock, so measurements from the two
/// collection threads never interleave.
pub struct PutvalWriter<W: Write + Send> {
    out: Mutex<W>,
}

impl PutvalWriter<io::Stdout> {
    /// Writer for the collectd exec channel.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> PutvalWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consumes the writer and returns the underlying output.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> MetricWriter for PutvalWriter<W> {
    fn write(&self, measurement: &Measurement) -> Result<(), WriteError> {
        let line = format_putval(measurement);
        let mut out = self.out.lock().map_err(|_| WriteError::Poisoned)?;
        out.write_all(line.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

/// Formats one measurement as a newline-terminated `PUTVAL` command.
pub fn format_putval(m: &Measurement) -> String {
    let mut line = String::with_capacity(96);
    let identifier = format!(
        "{}/{}/{}-{}",
        m.host,
        m.plugin,
        m.kind().as_str(),
        m.identifier
    );
    let time = m.timestamp.timestamp_millis() as f64 / 1000.0;

    let _ = write!(
        line,
        "PUTVAL {} interval={:.3} {:.3}:",
        quote(&identifier),
        m.interval.as_secs_f64(),
        time
    );
    match m.value {
        Value::Derive(v) => {
            let _ = write!(line, "{}", v);
        }
        // collectd's marker for an undefined value
        Value::Gauge(v) if v.is_nan() => line.push('U'),
        Value::Gauge(v) => {
            let _ = write!(line, "{}", v);
        }
    }
    line.push('\n');
    line
}

fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn measurement(identifier: &str, value: Value) -> Measurement {
        Measurement {
            host: "lb1".into(),
            plugin: "haproxy".into(),
            identifier: identifier.into(),
            value,
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_250).unwrap(),
            interval: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_format_derive() {
        let line = format_putval(&measurement("srv1.web.bytes_in", Value::Derive(4096)));
        assert_eq!(
            line,
            "PUTVAL \"lb1/haproxy/derive-srv1.web.bytes_in\" interval=10.000 1700000000.250:4096\n"
        );
    }

    #[test]
    fn test_format_gauge() {
        let line = format_putval(&measurement("max_connections", Value::Gauge(2000.0)));
        assert_eq!(
            line,
            "PUTVAL \"lb1/haproxy/gauge-max_connections\" interval=10.000 1700000000.250:2000\n"
        );
        let line = format_putval(&measurement("idle_pct", Value::Gauge(2.75)));
        assert!(line.ends_with(":2.75\n"));
    }

    #[test]
    fn test_format_nan_gauge_is_undefined() {
        let line = format_putval(&measurement("idle_pct", Value::Gauge(f64::NAN)));
        assert!(line.ends_with(":U\n"));
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn test_writer_emits_lines() {
        let writer = PutvalWriter::new(Vec::new());
        writer
            .write(&measurement("tasks", Value::Gauge(7.0)))
            .unwrap();
        writer
            .write(&measurement("requests", Value::Derive(-1)))
            .unwrap();
        let out = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("gauge-tasks"));
        assert!(lines[1].ends_with(":-1"));
    }
}
