use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FspError, Result};
use crate::frame::AGENT;

pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by every resolution and download of a run.
#[derive(Debug, Clone)]
pub struct Config {
    pub nameserver: SocketAddr,
    pub resolve_timeout: Duration,
    /// `None` blocks on a stalled file server forever.
    pub read_timeout: Option<Duration>,
    pub agent: String,
    pub output_dir: PathBuf,
}

impl Config {
    pub fn new(nameserver: SocketAddr) -> Self {
        Config {
            nameserver,
            resolve_timeout: RESOLVE_TIMEOUT,
            read_timeout: Some(READ_TIMEOUT),
            agent: AGENT.to_string(),
            output_dir: PathBuf::from("."),
        }
    }

    /// Parses a nameserver given as `IP:PORT`.
    pub fn parse_nameserver(addr: &str) -> Result<SocketAddr> {
        addr.trim()
            .parse()
            .map_err(|_| FspError::InvalidNameserver(addr.to_string()))
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}
