use anyhow::{Context, Result};
use log::info;
use mimalloc::MiMalloc;

use influx_json_recorder::{
    console,
    influx::Writer,
    logging,
    recorder::Recorder,
    source::Fetcher,
    types::config::{Config, ConfigError},
    util,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    logging::setup()?;

    // get config
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => {
            Config::bootstrap(&config_path)
                .context("couldn't create config file")?;
            info!(
                "config file {} did not exist, created one with placeholder values. edit it and run again",
                config_path,
            );
            return Ok(());
        }
        Err(e) => return Err(e).context("couldn't load config file"),
    };

    let fetcher = Fetcher::new(config.record.json_url.clone())?;
    let writer = Writer::new(&config.influx)?;

    let (quit_tx, quit_rx) = tokio::sync::mpsc::channel(1);
    console::spawn(quit_tx);

    info!("recording {} into {}/{}", fetcher.url(), config.influx.org, config.influx.bucket);

    let recorder = Recorder::new(
        &fetcher,
        &writer,
        config.influx.measurement.clone(),
        config.record.tags.clone(),
        config.record.interval(),
    );
    recorder.run(util::shutdown_signal(quit_rx)).await;

    info!("flushing buffered points");
    writer.close().await;

    info!("quitting");
    Ok(())
}
