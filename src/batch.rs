use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{FspError, Result};
use crate::locator::Locator;
use crate::nameserver;
use crate::session::{self, DownloadOutcome};

/// The downloaded index file. Removed from disk when dropped.
struct IndexArtifact {
    path: PathBuf,
}

impl Drop for IndexArtifact {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "index removed"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove index"),
        }
    }
}

/// Downloads every resource listed in the `index` under the locator's base
/// path, one after another. A failed file does not stop the rest; a failed
/// index download aborts the batch.
pub fn download_all(config: &Config, locator: &Locator) -> Result<Vec<DownloadOutcome>> {
    download_all_with(config, locator, |_| {})
}

/// Like [`download_all`], but calls `on_index` with the path of the index
/// file as soon as this run has written it.
pub fn download_all_with<F>(
    config: &Config,
    locator: &Locator,
    mut on_index: F,
) -> Result<Vec<DownloadOutcome>>
where
    F: FnMut(&Path),
{
    let endpoint =
        nameserver::resolve(config.nameserver, locator.domain(), config.resolve_timeout)?;

    let index = locator.index();
    let saved = session::download(&endpoint, &index, config)?;
    let artifact = IndexArtifact { path: saved.path };
    on_index(&artifact.path);

    let names = read_index(&artifact.path)?;
    info!(count = names.len(), base = locator.base_path(), "index read");

    let mut outcomes = Vec::with_capacity(names.len());
    for name in &names {
        let outcome = match locator.child(name) {
            Ok(target) if target.filename() == index.filename() => DownloadOutcome::new(
                target.to_string(),
                Err(FspError::ReservedName {
                    name: name.clone(),
                }),
            ),
            Ok(target) => {
                let result = session::download(&endpoint, &target, config);
                DownloadOutcome::new(target.to_string(), result)
            }
            Err(error) => DownloadOutcome::new(locator.join(name), Err(error)),
        };
        if let DownloadOutcome::Failed { resource, error } = &outcome {
            warn!(%resource, %error, "download failed, continuing");
        }
        outcomes.push(outcome);
    }

    drop(artifact);
    Ok(outcomes)
}

/// Reads resource names from an index file, one per line. Surrounding
/// whitespace is trimmed and blank lines are skipped.
pub fn read_index(path: &Path) -> Result<Vec<String>> {
    let content = fs::read(path).map_err(|e| FspError::io(path, e))?;
    Ok(parse_index(&String::from_utf8_lossy(&content)))
}

fn parse_index(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
