//! Client for the FSP file service: resolves a domain through a UDP
//! nameserver, then downloads files from the resolved server over TCP.

pub mod batch;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod locator;
pub mod nameserver;
pub mod session;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use endpoint::Endpoint;
pub use error::{FspError, Result};
pub use locator::Locator;
pub use session::{DownloadOutcome, Saved};
