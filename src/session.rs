use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::endpoint::Endpoint;
use crate::error::{self, FspError, Result};
use crate::frame::{self, ResponseHeader, Status, HEADER_TERMINATOR, MAX_HEADER_SIZE};
use crate::locator::Locator;
use crate::nameserver;

const CHUNK_SIZE: usize = 1024;
const MAX_REASON_SIZE: u64 = 1024;

/// A file written to disk by a finished download.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Saved {
    pub filename: String,
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug)]
pub enum DownloadOutcome {
    Saved(Saved),
    /// `resource` is the locator text, which may not have parsed.
    Failed { resource: String, error: FspError },
}

impl DownloadOutcome {
    pub fn new(resource: impl Into<String>, result: Result<Saved>) -> Self {
        match result {
            Ok(saved) => DownloadOutcome::Saved(saved),
            Err(error) => DownloadOutcome::Failed {
                resource: resource.into(),
                error,
            },
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, DownloadOutcome::Saved(_))
    }
}

/// Resolves the locator's domain and downloads it.
pub fn fetch(config: &Config, locator: &Locator) -> Result<Saved> {
    let endpoint =
        nameserver::resolve(config.nameserver, locator.domain(), config.resolve_timeout)?;
    download(&endpoint, locator, config)
}

/// Downloads `locator` from the file server at `endpoint` into
/// `config.output_dir`. The connection is closed when this returns.
pub fn download(endpoint: &Endpoint, locator: &Locator, config: &Config) -> Result<Saved> {
    let mut stream = connect(endpoint, config)?;
    info!(%endpoint, path = locator.path(), "connected");
    Session::new(endpoint, locator, config).exchange(&mut stream)
}

fn connect(endpoint: &Endpoint, config: &Config) -> Result<TcpStream> {
    let connection_err = |source| FspError::ConnectionError {
        endpoint: endpoint.clone(),
        source,
    };
    let stream =
        TcpStream::connect((endpoint.host(), endpoint.port())).map_err(connection_err)?;
    stream
        .set_read_timeout(config.read_timeout)
        .map_err(connection_err)?;
    stream
        .set_write_timeout(config.read_timeout)
        .map_err(connection_err)?;
    Ok(stream)
}

/// One request/response exchange over an already open stream.
pub(crate) struct Session<'a> {
    endpoint: &'a Endpoint,
    locator: &'a Locator,
    config: &'a Config,
}

impl<'a> Session<'a> {
    pub(crate) fn new(endpoint: &'a Endpoint, locator: &'a Locator, config: &'a Config) -> Self {
        Session {
            endpoint,
            locator,
            config,
        }
    }

    pub(crate) fn exchange<S: Read + Write>(&self, stream: &mut S) -> Result<Saved> {
        let request = frame::request(
            self.locator.path(),
            self.locator.domain(),
            &self.config.agent,
        );
        stream
            .write_all(&request)
            .and_then(|_| stream.flush())
            .map_err(|e| self.network_err(e))?;
        debug!(path = self.locator.path(), "request sent");

        let (header, mut payload) = self.read_header(stream)?;
        let length = match header.status {
            Status::Success => header.length.unwrap_or_default(),
            Status::Failure(status) => {
                return Err(self.not_received(stream, status, header.length, payload))
            }
        };
        info!(path = self.locator.path(), length, "receiving");

        let path = self.config.output_dir.join(self.locator.filename());
        let mut file = File::create(&path).map_err(|e| FspError::io(&path, e))?;
        if payload.len() as u64 > length {
            let surplus = payload.len() as u64 - length;
            warn!(surplus, "discarding bytes past declared length");
            payload.truncate(length as usize);
        }

        match self.receive(stream, &mut file, &path, &payload, length) {
            Ok(bytes) => Ok(Saved {
                filename: self.locator.filename().to_string(),
                path,
                bytes,
            }),
            Err(err) => {
                drop(file);
                let _ = fs::remove_file(&path);
                Err(err)
            }
        }
    }

    /// Reads until the blank line closing the header. Returns the header and
    /// any payload bytes that arrived with it.
    fn read_header<S: Read>(&self, stream: &mut S) -> Result<(ResponseHeader, Vec<u8>)> {
        let oversized = |buf: &[u8]| {
            FspError::MalformedResponseHeader(
                String::from_utf8_lossy(&buf[..MAX_HEADER_SIZE]).into_owned(),
            )
        };
        let mut buf = Vec::with_capacity(CHUNK_SIZE);
        let mut chunk = [0; CHUNK_SIZE];
        loop {
            if let Some((head, rest)) = frame::split_header(&buf) {
                // The blank line itself must also fit within the limit.
                if head.len() + HEADER_TERMINATOR.len() > MAX_HEADER_SIZE {
                    return Err(oversized(&buf));
                }
                return Ok((ResponseHeader::parse(head)?, rest.to_vec()));
            }
            if buf.len() >= MAX_HEADER_SIZE {
                return Err(oversized(&buf));
            }
            let n = self.read(stream, &mut chunk)?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        // Peer closed before the blank line; only a failure status is acceptable.
        let head = trim_line_breaks(&buf);
        let header = ResponseHeader::parse(head)?;
        if header.is_success() {
            return Err(FspError::MalformedResponseHeader(
                String::from_utf8_lossy(head).into_owned(),
            ));
        }
        Ok((header, vec![]))
    }

    fn receive<S: Read, W: Write>(
        &self,
        stream: &mut S,
        sink: &mut W,
        path: &Path,
        head: &[u8],
        length: u64,
    ) -> Result<u64> {
        sink.write_all(head).map_err(|e| FspError::io(path, e))?;
        let mut received = head.len() as u64;

        let mut chunk = [0; CHUNK_SIZE];
        while received < length {
            let want = (length - received).min(CHUNK_SIZE as u64) as usize;
            let n = self.read(stream, &mut chunk[..want])?;
            if n == 0 {
                return Err(FspError::IncompleteTransfer {
                    path: self.locator.path().to_string(),
                    expected: length,
                    received,
                });
            }
            sink.write_all(&chunk[..n]).map_err(|e| FspError::io(path, e))?;
            received += n as u64;
        }
        sink.flush().map_err(|e| FspError::io(path, e))?;
        debug!(path = self.locator.path(), received, "payload complete");
        Ok(received)
    }

    /// Builds the error for a non-success response, reading the explanatory
    /// body when the server declared one.
    fn not_received<S: Read>(
        &self,
        stream: &mut S,
        status: String,
        length: Option<u64>,
        mut body: Vec<u8>,
    ) -> FspError {
        let limit = length.unwrap_or(0).min(MAX_REASON_SIZE) as usize;
        let mut chunk = [0; CHUNK_SIZE];
        while body.len() < limit {
            match self.read(stream, &mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => body.extend_from_slice(&chunk[..n]),
            }
        }
        body.truncate(limit);

        let message = String::from_utf8_lossy(&body);
        let message = message.trim();
        let reason = if message.is_empty() {
            status
        } else {
            format!("{}: {}", status, message)
        };
        warn!(path = self.locator.path(), %reason, "server refused");
        FspError::NotReceived {
            path: self.locator.path().to_string(),
            reason,
        }
    }

    fn read<S: Read>(&self, stream: &mut S, buf: &mut [u8]) -> Result<usize> {
        loop {
            match stream.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.network_err(e)),
            }
        }
    }

    fn network_err(&self, source: io::Error) -> FspError {
        match self.config.read_timeout {
            Some(timeout) if error::is_timeout(&source) => FspError::ReadTimeout {
                endpoint: self.endpoint.clone(),
                timeout,
            },
            _ => FspError::ConnectionError {
                endpoint: self.endpoint.clone(),
                source,
            },
        }
    }
}

fn trim_line_breaks(buf: &[u8]) -> &[u8] {
    let end = buf
        .iter()
        .rposition(|&b| b != b'\r' && b != b'\n')
        .map_or(0, |i| i + 1);
    &buf[..end]
}
