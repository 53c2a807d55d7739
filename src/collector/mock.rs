//! In-memory fakes for testing collection cycles without a running HAProxy.
//!
//! `MockSocket` answers commands with canned responses, `RecordingWriter`
//! keeps every measurement it receives, and `RecordingObserver` keeps every
//! observation as its kind plus rendered message.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::collector::traits::{ControlSocket, TransportError};
use crate::observer::{Observation, ObservationKind, Observer};
use crate::writer::{Measurement, MetricWriter, WriteError};

/// Canned answer for one command.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Data(Vec<u8>),
    ConnectRefused,
    WriteFailed,
    ReadFailed,
}

/// Control socket double keyed by command.
///
/// Commands without a configured response fail as if the socket did not
/// exist.
#[derive(Debug, Default)]
pub struct MockSocket {
    responses: HashMap<String, MockResponse>,
    calls: Mutex<Vec<String>>,
}

impl MockSocket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `command` with `data`.
    pub fn with_response(mut self, command: &str, data: impl Into<Vec<u8>>) -> Self {
        self.responses
            .insert(command.to_string(), MockResponse::Data(data.into()));
        self
    }

    /// Fails `command` with the given transport failure.
    pub fn with_failure(mut self, command: &str, failure: MockResponse) -> Self {
        self.responses.insert(command.to_string(), failure);
        self
    }

    /// A socket serving typical `show info` and `show stat` answers.
    pub fn typical_haproxy() -> Self {
        Self::new()
            .with_response(
                "show info",
                "\
Name: HAProxy
Version: 1.5.11
Release_date: 2015/01/31
Nbproc: 1
Process_num: 1
Pid: 4242
Uptime: 0d 1h02m03s
Uptime_sec: 3723
Memmax_MB: 0
Ulimit-n: 4031
Maxsock: 4031
Maxconn: 2000
Hard_maxconn: 2000
CurrConns: 12
CumConns: 15021
CumReq: 30042
MaxSslConns: 0
CurrSslConns: 0
CumSslConns: 0
Maxpipes: 0
PipesUsed: 0
PipesFree: 0
ConnRate: 3
ConnRateLimit: 0
MaxConnRate: 87
SessRate: 3
SessRateLimit: 0
MaxSessRate: 87
Tasks: 21
Run_queue: 1
Idle_pct: 98
node: lb1
description:
",
            )
            .with_response(
                "show stat",
                "\
# pxname,svname,qcur,qmax,scur,smax,slim,stot,bin,bout,dreq,dresp,ereq,econ,eresp,wretr,wredis,status,
http-in,FRONTEND,,,12,80,2000,15021,4096000,8192000,0,0,3,,,,,OPEN,
servers,web1,0,0,6,40,,7510,2048000,4096000,,0,,0,0,0,0,UP,
servers,web2,0,0,6,40,,7511,2048000,4096000,,0,,0,0,0,0,UP,
servers,BACKEND,0,0,12,80,200,15021,4096000,8192000,0,0,,0,0,0,0,UP,

",
            )
    }

    /// Commands received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ControlSocket for MockSocket {
    fn fetch(&self, command: &str, buf: &mut Vec<u8>) -> Result<(), TransportError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.to_string());
        }

        match self.responses.get(command) {
            Some(MockResponse::Data(data)) => {
                buf.clear();
                buf.extend_from_slice(data);
                Ok(())
            }
            Some(MockResponse::WriteFailed) => Err(TransportError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock write failure",
            ))),
            Some(MockResponse::ReadFailed) => Err(TransportError::Read(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "mock read failure",
            ))),
            Some(MockResponse::ConnectRefused) | None => Err(TransportError::Connect {
                path: PathBuf::from("/mock/admin.sock"),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "mock connect failure"),
            }),
        }
    }
}

/// Metric writer that stores measurements in memory.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    measurements: Mutex<Vec<Measurement>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent writes fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Accepted measurements, in write order.
    pub fn measurements(&self) -> Vec<Measurement> {
        self.measurements
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Accepted measurement with the given identifier, if any.
    pub fn find(&self, identifier: &str) -> Option<Measurement> {
        self.measurements()
            .into_iter()
            .find(|m| m.identifier == identifier)
    }

    /// Number of write calls, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl MetricWriter for RecordingWriter {
    fn write(&self, measurement: &Measurement) -> Result<(), WriteError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(WriteError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock writer failure",
            )));
        }
        self.measurements
            .lock()
            .map_err(|_| WriteError::Poisoned)?
            .push(measurement.clone());
        Ok(())
    }
}

/// Observer that stores every observation.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<(ObservationKind, String)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(&self) -> Vec<ObservationKind> {
        self.seen
            .lock()
            .map(|s| s.iter().map(|(kind, _)| *kind).collect())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.seen
            .lock()
            .map(|s| s.iter().map(|(_, message)| message.clone()).collect())
            .unwrap_or_default()
    }

    /// Observations of `kind`, ignoring all others.
    pub fn count(&self, kind: ObservationKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    /// Observations that are not routine drops.
    pub fn failures(&self) -> Vec<ObservationKind> {
        self.kinds()
            .into_iter()
            .filter(|k| !matches!(k, ObservationKind::UnknownField | ObservationKind::EmptyValue))
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn observe(&self, observation: &Observation<'_>) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((observation.kind(), observation.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_socket_serves_and_records() {
        let socket = MockSocket::new().with_response("show info", "Maxconn: 1\n");
        let mut buf = b"old".to_vec();
        socket.fetch("show info", &mut buf).unwrap();
        assert_eq!(buf, b"Maxconn: 1\n");
        assert_eq!(socket.calls(), vec!["show info"]);
    }

    #[test]
    fn test_mock_socket_failures() {
        let socket = MockSocket::new()
            .with_failure("show info", MockResponse::ReadFailed)
            .with_failure("show stat", MockResponse::WriteFailed);
        let mut buf = Vec::new();
        assert!(matches!(
            socket.fetch("show info", &mut buf),
            Err(TransportError::Read(_))
        ));
        assert!(matches!(
            socket.fetch("show stat", &mut buf),
            Err(TransportError::Write(_))
        ));
        assert!(matches!(
            socket.fetch("show errors", &mut buf),
            Err(TransportError::Connect { .. })
        ));
        assert_eq!(socket.calls().len(), 3);
    }

    #[test]
    fn test_recording_observer_counts() {
        let observer = RecordingObserver::new();
        observer.observe(&Observation::UnknownField { key: "a" });
        observer.observe(&Observation::UnknownField { key: "b" });
        assert_eq!(observer.count(ObservationKind::UnknownField), 2);
        assert!(observer.failures().is_empty());
        assert_eq!(observer.messages()[1], "unknown field \"b\"");
    }
}
