//! Classification of parsed fields into measurements.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::collector::catalog::{MetricCatalog, MetricKind};
use crate::collector::parser::FieldRecord;
use crate::observer::{Observation, Observer};
use crate::writer::{Measurement, MetricWriter, Value};

/// Host and plugin names stamped on every measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub host: String,
    pub plugin: String,
}

/// Why a field did not produce a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownField,
    EmptyValue,
    NumericParse,
}

/// Result of reporting a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// A measurement was handed to the writer and accepted.
    Emitted,
    /// A measurement was built but the writer failed; it is not retried.
    WriteFailed,
    Dropped(DropReason),
}

/// Resolves fields against the catalog, coerces their values and writes
/// the resulting measurements.
pub struct Reporter {
    identity: Identity,
    catalog: &'static MetricCatalog,
    writer: Arc<dyn MetricWriter>,
    observer: Arc<dyn Observer>,
}

impl Reporter {
    /// Creates a reporter using the built-in catalog.
    pub fn new(
        identity: Identity,
        writer: Arc<dyn MetricWriter>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            identity,
            catalog: MetricCatalog::builtin(),
            writer,
            observer,
        }
    }

    /// Replaces the catalog fields are resolved against.
    pub fn with_catalog(mut self, catalog: &'static MetricCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Reports one field. Produces at most one writer call.
    ///
    /// The outcome depends only on the record, `now` and `interval`, so
    /// reporting the same record twice gives the same result.
    pub fn report(
        &self,
        record: &FieldRecord,
        now: DateTime<Utc>,
        interval: Duration,
    ) -> ReportOutcome {
        let key = normalize(&record.key);
        let Some(entry) = self.catalog.resolve(&key) else {
            self.observer
                .observe(&Observation::UnknownField { key: &key });
            return ReportOutcome::Dropped(DropReason::UnknownField);
        };

        let identifier = build_identifier(
            &normalize(&record.service),
            &normalize(&record.proxy),
            entry.output_name,
        );

        let raw_value = record.raw_value.trim();
        if raw_value.is_empty() {
            self.observer.observe(&Observation::EmptyValue {
                key: &key,
                identifier: &identifier,
            });
            return ReportOutcome::Dropped(DropReason::EmptyValue);
        }

        let value = match coerce(raw_value, entry.kind) {
            Ok(value) => value,
            Err(error) => {
                self.observer.observe(&Observation::NumericParse {
                    key: &key,
                    value: raw_value,
                    kind: entry.kind,
                    error: &*error,
                });
                return ReportOutcome::Dropped(DropReason::NumericParse);
            }
        };

        let measurement = Measurement {
            host: self.identity.host.clone(),
            plugin: self.identity.plugin.clone(),
            identifier,
            value,
            timestamp: now,
            interval,
        };

        match self.writer.write(&measurement) {
            Ok(()) => ReportOutcome::Emitted,
            Err(error) => {
                self.observer.observe(&Observation::WriteFailed {
                    identifier: &measurement.identifier,
                    error: &error,
                });
                ReportOutcome::WriteFailed
            }
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Joins the non-empty scope segments with the output name:
/// `service.proxy.name`, `proxy.name`, `service.name` or just `name`.
pub fn build_identifier(service: &str, proxy: &str, output_name: &str) -> String {
    let mut identifier = String::with_capacity(service.len() + proxy.len() + output_name.len() + 2);
    for segment in [service, proxy] {
        if !segment.is_empty() {
            identifier.push_str(segment);
            identifier.push('.');
        }
    }
    identifier.push_str(output_name);
    identifier
}

/// Parses a trimmed raw value as the given kind.
///
/// Gauges that only become infinite by overflowing `f64` are rejected like
/// out-of-range derives; explicit `inf`/`infinity` literals are kept.
fn coerce(raw: &str, kind: MetricKind) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
    Ok(match kind {
        MetricKind::Derive => Value::Derive(raw.parse::<i64>()?),
        MetricKind::Gauge => {
            let value = raw.parse::<f64>()?;
            if value.is_infinite() && !is_infinity_literal(raw) {
                return Err("value out of range".into());
            }
            Value::Gauge(value)
        }
    })
}

fn is_infinity_literal(raw: &str) -> bool {
    let unsigned = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{RecordingObserver, RecordingWriter};
    use crate::collector::parser::parse_info;
    use crate::observer::ObservationKind;
    use chrono::TimeZone;

    const INTERVAL: Duration = Duration::from_secs(10);

    struct Fixture {
        reporter: Reporter,
        writer: Arc<RecordingWriter>,
        observer: Arc<RecordingObserver>,
    }

    fn fixture() -> Fixture {
        let writer = Arc::new(RecordingWriter::new());
        let observer = Arc::new(RecordingObserver::new());
        let reporter = Reporter::new(
            Identity {
                host: "lb1".into(),
                plugin: "haproxy".into(),
            },
            writer.clone(),
            observer.clone(),
        );
        Fixture {
            reporter,
            writer,
            observer,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn record(key: &str, proxy: &str, service: &str, value: &str) -> FieldRecord {
        FieldRecord {
            key: key.into(),
            proxy: proxy.into(),
            service: service.into(),
            raw_value: value.into(),
        }
    }

    #[test]
    fn test_build_identifier_join_rule() {
        assert_eq!(build_identifier("srv1", "web", "bytes_in"), "srv1.web.bytes_in");
        assert_eq!(build_identifier("", "frontend1", "bytes_in"), "frontend1.bytes_in");
        assert_eq!(build_identifier("srv1", "", "bytes_in"), "srv1.bytes_in");
        assert_eq!(build_identifier("", "", "bytes_in"), "bytes_in");
    }

    #[test]
    fn test_identifier_segments_are_normalized() {
        let f = fixture();
        let outcome = f
            .reporter
            .report(&record(" BIN ", " Frontend1 ", "", "1"), now(), INTERVAL);
        assert_eq!(outcome, ReportOutcome::Emitted);
        assert_eq!(f.writer.measurements()[0].identifier, "frontend1.bytes_in");

        f.reporter
            .report(&record("bin", "", "  SRV1", "1"), now(), INTERVAL);
        assert_eq!(f.writer.measurements()[1].identifier, "srv1.bytes_in");
    }

    #[test]
    fn test_derive_value() {
        let f = fixture();
        let outcome = f.reporter.report(&record("bin", "", "", "42"), now(), INTERVAL);
        assert_eq!(outcome, ReportOutcome::Emitted);

        let measurements = f.writer.measurements();
        let m = &measurements[0];
        assert_eq!(m.value, Value::Derive(42));
        assert_eq!(m.kind(), MetricKind::Derive);
        assert_eq!(m.host, "lb1");
        assert_eq!(m.plugin, "haproxy");
        assert_eq!(m.timestamp, now());
        assert_eq!(m.interval, INTERVAL);
    }

    #[test]
    fn test_gauge_value() {
        let f = fixture();
        f.reporter.report(&record("idle_pct", "", "", "2.75"), now(), INTERVAL);
        assert_eq!(f.writer.measurements()[0].value, Value::Gauge(2.75));
    }

    #[test]
    fn test_unparsable_value_is_dropped_and_observed() {
        for key in ["bin", "scur"] {
            let f = fixture();
            let outcome = f.reporter.report(&record(key, "web", "srv1", "abc"), now(), INTERVAL);
            assert_eq!(outcome, ReportOutcome::Dropped(DropReason::NumericParse));
            assert!(f.writer.measurements().is_empty());
            assert_eq!(f.observer.kinds(), vec![ObservationKind::NumericParse]);
        }
    }

    #[test]
    fn test_derive_rejects_fraction_and_overflow() {
        let f = fixture();
        assert_eq!(
            f.reporter.report(&record("bin", "", "", "1.5"), now(), INTERVAL),
            ReportOutcome::Dropped(DropReason::NumericParse)
        );
        assert_eq!(
            f.reporter
                .report(&record("bin", "", "", "9223372036854775808"), now(), INTERVAL),
            ReportOutcome::Dropped(DropReason::NumericParse)
        );
        assert_eq!(
            f.reporter
                .report(&record("bin", "", "", "-9223372036854775808"), now(), INTERVAL),
            ReportOutcome::Emitted
        );
        assert_eq!(f.writer.measurements()[0].value, Value::Derive(i64::MIN));
    }

    #[test]
    fn test_gauge_rejects_overflow_to_infinity() {
        let f = fixture();
        for value in ["1e400", "-1e400"] {
            assert_eq!(
                f.reporter.report(&record("maxconn", "", "", value), now(), INTERVAL),
                ReportOutcome::Dropped(DropReason::NumericParse)
            );
        }
        assert!(f.writer.measurements().is_empty());
        assert_eq!(f.observer.count(ObservationKind::NumericParse), 2);
        assert!(f.observer.messages()[0].contains("out of range"));

        for value in ["inf", "-Infinity", "+INF"] {
            assert_eq!(
                f.reporter.report(&record("idle_pct", "", "", value), now(), INTERVAL),
                ReportOutcome::Emitted
            );
        }
        assert!(
            f.writer
                .measurements()
                .iter()
                .all(|m| matches!(m.value, Value::Gauge(v) if v.is_infinite()))
        );
    }

    #[test]
    fn test_unknown_field_never_emits() {
        let f = fixture();
        for value in ["1", "", "abc", "2.75"] {
            let outcome = f.reporter.report(
                &record("totally_unknown_field", "web", "srv1", value),
                now(),
                INTERVAL,
            );
            assert_eq!(outcome, ReportOutcome::Dropped(DropReason::UnknownField));
        }
        assert!(f.writer.measurements().is_empty());
        assert!(
            f.observer
                .kinds()
                .iter()
                .all(|k| *k == ObservationKind::UnknownField)
        );
    }

    #[test]
    fn test_empty_value_is_dropped() {
        let f = fixture();
        let outcome = f.reporter.report(&record("qcur", "web", "srv1", "   "), now(), INTERVAL);
        assert_eq!(outcome, ReportOutcome::Dropped(DropReason::EmptyValue));
        assert!(f.writer.measurements().is_empty());
        assert_eq!(f.observer.kinds(), vec![ObservationKind::EmptyValue]);
    }

    #[test]
    fn test_report_is_idempotent() {
        let f = fixture();
        let rec = record("scur", "Web", "SRV1", " 12 ");
        let first = f.reporter.report(&rec, now(), INTERVAL);
        let second = f.reporter.report(&rec, now(), INTERVAL);
        assert_eq!(first, second);
        let measurements = f.writer.measurements();
        assert_eq!(measurements.len(), 2);
        assert_eq!(measurements[0], measurements[1]);
    }

    #[test]
    fn test_write_failure_is_observed_not_retried() {
        let f = fixture();
        f.writer.fail_writes(true);
        let outcome = f.reporter.report(&record("bin", "", "", "1"), now(), INTERVAL);
        assert_eq!(outcome, ReportOutcome::WriteFailed);
        assert_eq!(f.writer.attempts(), 1);
        assert_eq!(f.observer.kinds(), vec![ObservationKind::WriteFailed]);
    }

    #[test]
    fn test_custom_catalog() {
        static CATALOG: std::sync::LazyLock<MetricCatalog> = std::sync::LazyLock::new(|| {
            MetricCatalog::from_entries(&[("name", "release_name_len", MetricKind::Gauge)])
        });
        let f = fixture();
        let reporter = f.reporter.with_catalog(&CATALOG);
        assert_eq!(
            reporter.report(&record("bin", "", "", "1"), now(), INTERVAL),
            ReportOutcome::Dropped(DropReason::UnknownField)
        );
    }

    #[test]
    fn test_maxconn_info_line_end_to_end() {
        let f = fixture();
        let records = parse_info(b"Maxconn: 2000\n", f.observer.as_ref());
        for r in &records {
            f.reporter.report(r, now(), INTERVAL);
        }
        let measurements = f.writer.measurements();
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].identifier, "max_connections");
        assert_eq!(measurements[0].kind(), MetricKind::Gauge);
        assert_eq!(measurements[0].value, Value::Gauge(2000.0));
    }
}
