use std::time::Duration;

use anyhow::Result;
use clap::{App, Arg};
use fspget::nameserver;
use fspget::{Config, Locator};

fn main() -> Result<()> {
    let app = App::new("whereis")
        .about("Asks an FSP nameserver where a domain lives")
        .arg(Arg::new("surl").required(true))
        .arg(Arg::new("nameserver").default_value("127.0.0.1:3333"))
        .arg(Arg::new("timeout").long("timeout").takes_value(true).default_value("30"))
        .get_matches();

    let nameserver = Config::parse_nameserver(app.value_of("nameserver").unwrap_or_default())?;
    println!("nameserver:  {}", nameserver);

    let locator = Locator::parse(app.value_of("surl").unwrap_or_default())?;
    let timeout = Duration::from_secs(app.value_of_t("timeout")?);

    let endpoint = nameserver::resolve(nameserver, locator.domain(), timeout)?;
    println!("{} -> {}", locator.domain(), endpoint);
    Ok(())
}
