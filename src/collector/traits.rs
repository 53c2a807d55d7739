//! Abstractions for control socket access to enable testing and mocking.
//!
//! The `ControlSocket` trait allows collection cycles to talk to a real
//! HAProxy admin socket or to an in-memory mock in tests.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors raised while exchanging a command with the control socket.
#[derive(Debug)]
pub enum TransportError {
    /// The socket could not be opened.
    Connect { path: PathBuf, source: io::Error },
    /// The command line could not be fully written.
    Write(io::Error),
    /// Reading the response failed before a clean end-of-stream.
    Read(io::Error),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Connect { path, source } => {
                write!(f, "connect to {}: {}", path.display(), source)
            }
            TransportError::Write(e) => write!(f, "write command: {}", e),
            TransportError::Read(e) => write!(f, "read response: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Connect { source, .. } => Some(source),
            TransportError::Write(e) | TransportError::Read(e) => Some(e),
        }
    }
}

/// One-shot command exchange with a line-oriented control socket.
pub trait ControlSocket: Send + Sync {
    /// Sends `command` followed by a newline and reads the whole response
    /// into `buf`, replacing its previous contents.
    ///
    /// Every call uses its own connection, which is closed before returning
    /// on both the success and the error path.
    fn fetch(&self, command: &str, buf: &mut Vec<u8>) -> Result<(), TransportError>;
}

/// Unix domain stream socket implementation.
#[derive(Debug, Clone)]
pub struct UnixControlSocket {
    path: PathBuf,
    timeout: Option<Duration>,
}

impl UnixControlSocket {
    /// Creates a socket client for the given path. No connection is opened
    /// until the first `fetch`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: None,
        }
    }

    /// Applies a read and write timeout to every connection.
    /// `None` (the default) blocks until the peer closes the connection.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<UnixStream, TransportError> {
        let connect_err = |source| TransportError::Connect {
            path: self.path.clone(),
            source,
        };
        let stream = UnixStream::connect(&self.path).map_err(connect_err)?;
        stream.set_read_timeout(self.timeout).map_err(connect_err)?;
        stream.set_write_timeout(self.timeout).map_err(connect_err)?;
        Ok(stream)
    }
}

impl ControlSocket for UnixControlSocket {
    fn fetch(&self, command: &str, buf: &mut Vec<u8>) -> Result<(), TransportError> {
        let mut stream = self.connect()?;

        let mut line = Vec::with_capacity(command.len() + 1);
        line.extend_from_slice(command.as_bytes());
        line.push(b'\n');
        stream.write_all(&line).map_err(TransportError::Write)?;
        stream.flush().map_err(TransportError::Write)?;

        buf.clear();
        // read_to_end retries on Interrupted and stops at a clean EOF.
        stream.read_to_end(buf).map_err(TransportError::Read)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::os::unix::net::UnixListener;
    use std::thread;

    /// Accepts one connection, returns the received command line and
    /// answers with `response` before closing.
    fn serve_once(listener: UnixListener, response: &'static [u8]) -> thread::JoinHandle<String> {
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut command = String::new();
            reader.read_line(&mut command).unwrap();
            let mut stream = reader.into_inner();
            stream.write_all(response).unwrap();
            command
        })
    }

    #[test]
    fn test_fetch_sends_command_and_reads_until_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = serve_once(listener, b"Name: HAProxy\nMaxconn: 2000\n");

        let socket = UnixControlSocket::new(&path);
        let mut buf = b"stale".to_vec();
        socket.fetch("show info", &mut buf).unwrap();

        assert_eq!(server.join().unwrap(), "show info\n");
        assert_eq!(buf, b"Name: HAProxy\nMaxconn: 2000\n");
    }

    #[test]
    fn test_fetch_reads_large_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let body: &'static [u8] = Box::leak(vec![b'x'; 256 * 1024].into_boxed_slice());
        let server = serve_once(listener, body);

        let mut buf = Vec::new();
        UnixControlSocket::new(&path)
            .fetch("show stat", &mut buf)
            .unwrap();
        server.join().unwrap();
        assert_eq!(buf.len(), 256 * 1024);
    }

    #[test]
    fn test_fetch_empty_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = serve_once(listener, b"");

        let mut buf = Vec::new();
        UnixControlSocket::new(&path)
            .fetch("show stat", &mut buf)
            .unwrap();
        server.join().unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_fetch_missing_socket_is_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let socket = UnixControlSocket::new(dir.path().join("missing.sock"));
        let mut buf = Vec::new();
        let err = socket.fetch("show info", &mut buf).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(err.to_string().contains("missing.sock"));
    }

    #[test]
    fn test_fetch_timeout_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let server = thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            // Hold the connection open without answering.
            let _ = rx.recv();
        });

        let socket =
            UnixControlSocket::new(&path).with_timeout(Some(Duration::from_millis(100)));
        let mut buf = Vec::new();
        let err = socket.fetch("show info", &mut buf).unwrap_err();
        assert!(matches!(err, TransportError::Read(_)));

        tx.send(()).unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let socket = UnixControlSocket::new("/tmp/x.sock").with_timeout(Some(Duration::ZERO));
        assert!(socket.timeout.is_none());
        assert_eq!(socket.path(), Path::new("/tmp/x.sock"));
    }
}
