//! Fixed table of HAProxy fields that are reported, with their output
//! names and value types.
//!
//! Keys are normalized (trimmed, lowercase) field names as they appear in
//! `show info` lines and `show stat` CSV headers. Anything not listed here
//! is ignored by the reporter.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Value type of a metric, as understood by collectd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Monotonically increasing counter; the sink derives a rate.
    Derive,
    /// Instantaneous level.
    Gauge,
}

impl MetricKind {
    /// collectd type name.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Derive => "derive",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output name and kind for one recognized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub output_name: &'static str,
    pub kind: MetricKind,
}

use MetricKind::{Derive, Gauge};

/// (field key, output name, kind)
const BUILTIN_ENTRIES: &[(&str, &str, MetricKind)] = &[
    // show info
    ("maxconn", "max_connections", Gauge),
    ("cumconns", "connections", Derive),
    ("cumreq", "requests", Derive),
    ("currconns", "cur_connections", Gauge),
    ("currsslconns", "cur_ssl_connections", Gauge),
    ("maxconnrate", "max_connection_rate", Gauge),
    ("maxsessrate", "max_session_rate", Gauge),
    ("maxsslconns", "max_ssl_connections", Gauge),
    ("cumsslconns", "ssl_connections", Derive),
    ("maxpipes", "max_pipes", Gauge),
    ("idle_pct", "idle_pct", Gauge),
    ("tasks", "tasks", Gauge),
    ("run_queue", "run_queue", Gauge),
    ("pipesused", "pipes_used", Gauge),
    ("pipesfree", "pipes_free", Gauge),
    ("uptime_sec", "uptime_seconds", Derive),
    // show stat
    ("bin", "bytes_in", Derive),
    ("bout", "bytes_out", Derive),
    ("chkfail", "failed_checks", Derive),
    ("downtime", "downtime", Derive),
    ("dresp", "denied_response", Derive),
    ("dreq", "denied_request", Derive),
    ("econ", "error_connection", Derive),
    ("ereq", "error_request", Derive),
    ("eresp", "error_response", Derive),
    ("hrsp_1xx", "response_1xx", Derive),
    ("hrsp_2xx", "response_2xx", Derive),
    ("hrsp_3xx", "response_3xx", Derive),
    ("hrsp_4xx", "response_4xx", Derive),
    ("hrsp_5xx", "response_5xx", Derive),
    ("hrsp_other", "response_other", Derive),
    ("qcur", "queue_current", Gauge),
    ("rate", "session_rate", Gauge),
    ("req_rate", "request_rate", Gauge),
    ("stot", "session_total", Derive),
    ("scur", "session_current", Gauge),
    ("wredis", "redistributed", Derive),
    ("wretr", "retries", Derive),
];

static BUILTIN: LazyLock<MetricCatalog> =
    LazyLock::new(|| MetricCatalog::from_entries(BUILTIN_ENTRIES));

/// Immutable lookup table from normalized field key to `CatalogEntry`.
///
/// Built once and only read afterwards, so it can be shared between the
/// collection threads without locking.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    entries: HashMap<&'static str, CatalogEntry>,
}

impl MetricCatalog {
    /// The catalog of HAProxy fields reported by this plugin.
    pub fn builtin() -> &'static MetricCatalog {
        &BUILTIN
    }

    /// Builds a catalog from `(key, output_name, kind)` triples.
    /// Later duplicates replace earlier ones.
    pub fn from_entries(entries: &[(&'static str, &'static str, MetricKind)]) -> Self {
        let entries = entries
            .iter()
            .map(|&(key, output_name, kind)| (key, CatalogEntry { output_name, kind }))
            .collect();
        Self { entries }
    }

    /// Looks up an already normalized key.
    pub fn resolve(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
