use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{self, FspError, Result};

pub const WHEREIS: &str = "WHEREIS";
const OK: &str = "OK ";
const ERR: &str = "ERR ";
const REPLY_BUFFER_SIZE: usize = 1024;

/// Decoded nameserver reply.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Resolution {
    Resolved(Endpoint),
    Failed(String),
}

impl Resolution {
    /// Parses `OK <host>:<port>` or `ERR <details>`.
    pub fn parse(reply: &[u8]) -> Result<Self> {
        let malformed =
            || FspError::MalformedNameserverReply(String::from_utf8_lossy(reply).into_owned());
        let text = std::str::from_utf8(reply).map_err(|_| malformed())?;
        let text = text.trim_end_matches(&['\r', '\n'][..]);

        if let Some(addr) = text.strip_prefix(OK) {
            let (host, port) = addr.trim().rsplit_once(':').ok_or_else(malformed)?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            let port = port.parse::<u16>().map_err(|_| malformed())?;
            if host.is_empty() {
                return Err(malformed());
            }
            Ok(Resolution::Resolved(Endpoint::new(host, port)))
        } else if let Some(details) = text.strip_prefix(ERR) {
            Ok(Resolution::Failed(details.to_string()))
        } else if text == ERR.trim_end() {
            Ok(Resolution::Failed(String::new()))
        } else {
            Err(malformed())
        }
    }
}

pub fn lookup_request(domain: &str) -> Vec<u8> {
    format!("{} {}", WHEREIS, domain).into_bytes()
}

/// Asks `nameserver` where `domain` lives. A missing reply is abandoned after
/// `timeout`; the socket is dropped on every path.
pub fn resolve(nameserver: SocketAddr, domain: &str, timeout: Duration) -> Result<Endpoint> {
    let bind_addr = if nameserver.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket_err = |e| FspError::io(format!("udp socket for {}", nameserver), e);

    let socket = UdpSocket::bind(bind_addr).map_err(socket_err)?;
    socket.set_read_timeout(Some(timeout)).map_err(socket_err)?;
    socket.connect(nameserver).map_err(socket_err)?;

    // The socket is connected, so an ICMP port-unreachable surfaces as a refusal.
    let exchange_err = |e: io::Error| match e.kind() {
        io::ErrorKind::ConnectionRefused => FspError::NameserverUnreachable {
            nameserver,
            source: e,
        },
        _ if error::is_timeout(&e) => FspError::NameserverTimeout {
            nameserver,
            timeout,
        },
        _ => socket_err(e),
    };

    socket.send(&lookup_request(domain)).map_err(exchange_err)?;
    debug!(%nameserver, domain, "lookup sent");

    let mut reply = vec![0; REPLY_BUFFER_SIZE];
    let amt = socket.recv(&mut reply).map_err(exchange_err)?;
    debug!(reply = %String::from_utf8_lossy(&reply[..amt]), "nameserver replied");

    match Resolution::parse(&reply[..amt])? {
        Resolution::Resolved(endpoint) => Ok(endpoint),
        Resolution::Failed(reason) => Err(FspError::ResolutionFailed(reason)),
    }
}
