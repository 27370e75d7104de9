//! Wire format of the file retrieval exchange: the `GET` request frame and
//! the response header that precedes the payload.

use crate::error::{FspError, Result};

pub const COMMAND: &str = "GET";
pub const VERSION: &str = "FSP/1.0";
pub const AGENT: &str = "fspget";
pub const SUCCESS: &str = "Success";

pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
pub const MAX_HEADER_SIZE: usize = 1024;
const LINE_BREAK: &str = "\r\n";
const LENGTH_FIELD: &str = "Length:";

/// Builds `GET <path> FSP/1.0\r\nHostname: <domain>\r\nAgent: <agent>\r\n\r\n`.
pub fn request(path: &str, domain: &str, agent: &str) -> Vec<u8> {
    format!(
        "{} {} {}\r\nHostname: {}\r\nAgent: {}\r\n\r\n",
        COMMAND, path, VERSION, domain, agent
    )
    .into_bytes()
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Status {
    Success,
    /// Any status text other than `Success`, e.g. `Not Found`.
    Failure(String),
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ResponseHeader {
    pub status: Status,
    /// Always present on success. Failures may declare the length of an
    /// explanatory body.
    pub length: Option<u64>,
}

impl ResponseHeader {
    /// Parses the header lines, i.e. everything before the blank line.
    pub fn parse(head: &[u8]) -> Result<Self> {
        let malformed =
            || FspError::MalformedResponseHeader(String::from_utf8_lossy(head).into_owned());
        let text = std::str::from_utf8(head).map_err(|_| malformed())?;
        let mut lines = text.split(LINE_BREAK);

        let status_line = lines.next().unwrap_or_default();
        let status_text = status_line
            .strip_prefix(VERSION)
            .and_then(|rest| rest.strip_prefix(' '))
            .ok_or_else(malformed)?
            .trim();
        if status_text.is_empty() {
            return Err(malformed());
        }

        let mut length = None;
        for line in lines {
            if let Some(value) = line.strip_prefix(LENGTH_FIELD) {
                length = Some(value.trim().parse::<u64>().map_err(|_| malformed())?);
            }
        }

        if status_text == SUCCESS {
            match length {
                Some(_) => Ok(ResponseHeader {
                    status: Status::Success,
                    length,
                }),
                None => Err(malformed()),
            }
        } else {
            Ok(ResponseHeader {
                status: Status::Failure(status_text.to_string()),
                length,
            })
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Splits `buf` at the blank line ending the header. Returns the header lines
/// and whatever payload bytes followed them in the same buffer.
pub fn split_header(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|i| (&buf[..i], &buf[i + HEADER_TERMINATOR.len()..]))
}
