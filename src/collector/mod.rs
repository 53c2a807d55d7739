//! HAProxy admin socket collector.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          Collector                            │
//! │                                                               │
//! │   ControlSocket ──► parse_info / parse_stats ──► Reporter     │
//! │   (trait)            FieldRecord                 │            │
//! │                                          MetricCatalog        │
//! │                                                  │            │
//! └──────────────────────────────────────────────────┼────────────┘
//!                                                    ▼
//!                                              MetricWriter
//!
//!       ┌───────────────────┐   ┌────────────┐
//!       │ UnixControlSocket │   │ MockSocket │
//!       │ (production)      │   │ (testing)  │
//!       └───────────────────┘   └────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use collectd_haproxy::collector::mock::{MockSocket, RecordingObserver, RecordingWriter};
//! use collectd_haproxy::collector::{Collector, CycleKind, Identity, Reporter};
//!
//! let writer = Arc::new(RecordingWriter::new());
//! let observer = Arc::new(RecordingObserver::new());
//! let identity = Identity { host: "lb1".into(), plugin: "haproxy".into() };
//! let reporter = Reporter::new(identity, writer.clone(), observer.clone());
//! let collector = Collector::new(
//!     MockSocket::typical_haproxy(),
//!     reporter,
//!     observer,
//!     Duration::from_secs(10),
//! );
//!
//! collector.collect(CycleKind::Info, chrono::Utc::now()).unwrap();
//! assert!(writer.find("max_connections").is_some());
//! ```

pub mod catalog;
#[allow(clippy::module_inception)]
mod collector;
pub mod mock;
pub mod parser;
mod pool;
pub mod reporter;
pub mod traits;

pub use catalog::{CatalogEntry, MetricCatalog, MetricKind};
pub use collector::{Collector, CycleError, CycleKind, CycleStats};
pub use parser::{FieldRecord, ParseError, parse_info, parse_stats};
pub use pool::{BufferPool, PooledBuffer};
pub use reporter::{DropReason, Identity, ReportOutcome, Reporter};
pub use traits::{ControlSocket, TransportError, UnixControlSocket};
