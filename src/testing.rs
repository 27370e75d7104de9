//! In-process nameserver and file server doubles for tests.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::frame;

pub struct FakeNameserver {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeNameserver {
    /// `reply` maps a looked-up domain to the reply datagram; `None` stays silent.
    pub fn start<F>(reply: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = socket.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(vec![]));

        let log = requests.clone();
        thread::spawn(move || {
            let mut buf = [0; 1024];
            loop {
                let (amt, peer) = match socket.recv_from(&mut buf) {
                    Ok(r) => r,
                    Err(_) => return,
                };
                let request = String::from_utf8_lossy(&buf[..amt]).into_owned();
                let domain = request.strip_prefix("WHEREIS ").unwrap_or("").to_string();
                log.lock().unwrap().push(request);
                if let Some(answer) = reply(&domain) {
                    let _ = socket.send_to(answer.as_bytes(), peer);
                }
            }
        });

        FakeNameserver { addr, requests }
    }

    /// Resolves `domain` to `endpoint` and refuses everything else.
    pub fn pointing_to(domain: &str, endpoint: Endpoint) -> Self {
        let domain = domain.to_string();
        FakeNameserver::start(move |looked_up| {
            if looked_up == domain {
                Some(format!("OK {}", endpoint))
            } else {
                Some("ERR Not Found".into())
            }
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// How the fake file server answers one request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Writes the bytes and closes.
    Close(Vec<u8>),
    /// Writes each chunk separately with a short pause in between, then closes.
    Chunks(Vec<Vec<u8>>),
    /// Writes the bytes and holds the connection open.
    Stall(Vec<u8>, Duration),
}

pub fn success(body: &[u8]) -> Vec<u8> {
    let mut response = format!("FSP/1.0 Success\r\nLength:{}\r\n\r\n", body.len()).into_bytes();
    response.extend_from_slice(body);
    response
}

pub fn not_found() -> Vec<u8> {
    let body = b"File not found";
    let mut response = format!("FSP/1.0 Not Found\r\nLength:{}\r\n\r\n", body.len()).into_bytes();
    response.extend_from_slice(body);
    response
}

pub struct FakeFileServer {
    endpoint: Endpoint,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeFileServer {
    /// `reply` maps the requested path to the server's answer.
    pub fn start<F>(reply: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(vec![]));

        let log = requests.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = match stream {
                    Ok(s) => s,
                    Err(_) => return,
                };
                let request = match read_request(&mut stream) {
                    Some(r) => r,
                    None => continue,
                };
                let path = request
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or_default()
                    .to_string();
                log.lock().unwrap().push(request);
                let _ = answer(&mut stream, reply(&path));
            }
        });

        FakeFileServer {
            endpoint: Endpoint::new("127.0.0.1", port),
            requests,
        }
    }

    /// Serves the given files and answers `Not Found` for anything else.
    pub fn serving(files: &[(&str, &[u8])]) -> Self {
        let files: HashMap<String, Vec<u8>> = files
            .iter()
            .map(|(path, body)| (path.to_string(), body.to_vec()))
            .collect();
        FakeFileServer::start(move |path| match files.get(path) {
            Some(body) => Reply::Close(success(body)),
            None => Reply::Close(not_found()),
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint.clone()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Paths requested so far, in order.
    pub fn paths(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.split_whitespace().nth(1).map(str::to_string))
            .collect()
    }
}

fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut buf = vec![];
    let mut chunk = [0; 256];
    while frame::split_header(&buf).is_none() {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(String::from_utf8_lossy(&buf).into_owned())
}

fn answer(stream: &mut TcpStream, reply: Reply) -> std::io::Result<()> {
    match reply {
        Reply::Close(bytes) => stream.write_all(&bytes),
        Reply::Chunks(chunks) => {
            for chunk in chunks {
                stream.write_all(&chunk)?;
                stream.flush()?;
                thread::sleep(Duration::from_millis(20));
            }
            Ok(())
        }
        Reply::Stall(bytes, hold) => {
            stream.write_all(&bytes)?;
            thread::sleep(hold);
            Ok(())
        }
    }
}

/// Returns the port of a listener that was bound and dropped again, so
/// connecting to it is refused.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Address of a UDP socket that was bound and dropped again, so datagrams
/// sent there draw a port-unreachable.
pub fn closed_udp_addr() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap()
}
