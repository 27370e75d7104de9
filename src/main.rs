use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{App, Arg, ArgMatches};
use tracing_subscriber::EnvFilter;

use fspget::{batch, session, Config, DownloadOutcome, Locator};

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app = App::new("fspget")
        .about("Downloads files over FSP/1.0")
        .arg(
            Arg::new("nameserver")
                .short('n')
                .long("nameserver")
                .value_name("IP:PORT")
                .help("Nameserver address")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::new("surl")
                .short('f')
                .long("file")
                .value_name("SURL")
                .help("File to download as fsp://<domain>/<path>, or <path>/* for a whole index")
                .takes_value(true)
                .required(true),
        )
        .get_matches();

    if let Err(err) = run(&app) {
        eprintln!("error: {:#}", err);
        process::exit(1);
    }
}

fn run(app: &ArgMatches) -> Result<()> {
    let nameserver = Config::parse_nameserver(app.value_of("nameserver").unwrap_or_default())?;
    let locator = Locator::parse(app.value_of("surl").unwrap_or_default())?;
    let config = Config::new(nameserver);

    if !locator.is_wildcard() {
        let saved = session::fetch(&config, &locator)
            .with_context(|| format!("downloading {}", locator))?;
        println!("{} ({} bytes)", saved.filename, saved.bytes);
        return Ok(());
    }

    // The index's drop guard does not run on Ctrl-C. Only an index this run
    // wrote is removed; the slot stays empty until then.
    let written_index: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
    let pending = written_index.clone();
    ctrlc::set_handler(move || {
        if let Ok(slot) = pending.lock() {
            if let Some(path) = slot.as_ref() {
                let _ = fs::remove_file(path);
            }
        }
        process::exit(130);
    })
    .context("installing Ctrl-C handler")?;

    let outcomes = batch::download_all_with(&config, &locator, |path| {
        if let Ok(mut slot) = written_index.lock() {
            *slot = Some(path.to_path_buf());
        }
    })
    .with_context(|| format!("fetching index for {}", locator))?;

    let mut failed = 0;
    for outcome in &outcomes {
        match outcome {
            DownloadOutcome::Saved(saved) => {
                println!("{} ({} bytes)", saved.filename, saved.bytes)
            }
            DownloadOutcome::Failed { resource, error } => {
                failed += 1;
                eprintln!("{:?}: {} [{}]", resource, error, error.code());
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} files failed", failed, outcomes.len());
    }
    Ok(())
}
