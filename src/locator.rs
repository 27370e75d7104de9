use std::fmt::Display;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{FspError, Result};

pub const SCHEME: &str = "fsp";
pub const INDEX: &str = "index";
const WILDCARD: &str = "/*";

/// A parsed `fsp://<domain>/<path>` resource locator.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Locator {
    domain: String,
    path: String,
    wildcard: bool,
}

impl Locator {
    pub fn parse(locator: &str) -> Result<Self> {
        let malformed = || FspError::MalformedLocator(locator.to_string());
        let text = locator.trim();
        // Url silently drops raw tabs and line breaks, so check before parsing.
        if !is_wire_safe(text) {
            return Err(malformed());
        }
        let url = Url::parse(text).map_err(|_| malformed())?;

        // Url lowercases the scheme already.
        if url.scheme() != SCHEME
            || url.port().is_some()
            || !url.username().is_empty()
            || url.password().is_some()
            || url.query().is_some()
            || url.fragment().is_some()
        {
            return Err(malformed());
        }
        let domain = match url.host_str() {
            Some(host) if !host.is_empty() && is_wire_safe(host) => host.to_string(),
            _ => return Err(malformed()),
        };

        let raw = percent_decode_str(url.path())
            .decode_utf8()
            .map_err(|_| malformed())?;
        let raw = raw.trim();
        let wildcard = raw.ends_with(WILDCARD);
        let path = raw.trim_start_matches('/');
        if path.is_empty() || (!wildcard && path.ends_with('/')) || !is_wire_safe(path) {
            return Err(malformed());
        }

        Ok(Locator {
            domain,
            path: path.to_string(),
            wildcard,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Resource path as requested from the file server, without the leading `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// The path with a trailing `/*` removed; empty for `fsp://domain/*`.
    pub fn base_path(&self) -> &str {
        if self.wildcard {
            self.path
                .strip_suffix(WILDCARD)
                .or_else(|| self.path.strip_suffix('*'))
                .unwrap_or(&self.path)
        } else {
            &self.path
        }
    }

    /// Last path segment, used as the local file name.
    pub fn filename(&self) -> &str {
        match self.path.rsplit_once('/') {
            Some((_, name)) => name,
            None => &self.path,
        }
    }

    /// Locator of `name` under this locator's base path. Names that could not
    /// travel in a request line are malformed.
    pub fn child(&self, name: &str) -> Result<Locator> {
        if name.is_empty() || name.ends_with('/') || !is_wire_safe(name) {
            return Err(FspError::MalformedLocator(self.join(name)));
        }
        Ok(self.child_unchecked(name))
    }

    /// Locator of the index resource listing the files under the base path.
    pub fn index(&self) -> Locator {
        self.child_unchecked(INDEX)
    }

    /// `fsp://<domain>/<base>/<name>` as text, whether or not `name` is valid.
    pub fn join(&self, name: &str) -> String {
        format!("{}://{}/{}", SCHEME, self.domain, self.child_path(name))
    }

    fn child_unchecked(&self, name: &str) -> Locator {
        Locator {
            domain: self.domain.clone(),
            path: self.child_path(name),
            wildcard: false,
        }
    }

    fn child_path(&self, name: &str) -> String {
        let base = self.base_path();
        if base.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", base, name)
        }
    }
}

/// The request line is `GET <path> FSP/1.0`, so a path must not contain
/// whitespace or control characters.
fn is_wire_safe(s: &str) -> bool {
    !s.chars().any(|c| c.is_whitespace() || c.is_control())
}

impl FromStr for Locator {
    type Err = FspError;

    fn from_str(s: &str) -> Result<Self> {
        Locator::parse(s)
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}/{}", SCHEME, self.domain, self.path)
    }
}
