use anyhow::{Context, Result};
use lazy_static::lazy_static;
use log::{Level, LevelFilter};
use parking_lot::RwLock;

lazy_static! {
    pub static ref LOG_LEVEL: RwLock<Level> = RwLock::new(Level::Info);
}

pub const LOG_FILE: &str = "recorder.log";

pub fn setup() -> Result<()> {
    fern::Dispatch::new()
        .filter(|metadata| {
            match metadata.target() {
                "influx_json_recorder" => true,
                x if x.starts_with("influx_json_recorder::") => true,
                x if x == "reqwest" || x.starts_with("reqwest::") => metadata.level() <= Level::Warn,
                _ => false,
            }
        })
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}:{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S %Z"),
                record.level(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                message,
            ))
        })
        .chain(fern::Dispatch::new()
            .filter(|meta| {
                meta.level() <= *LOG_LEVEL.read()
            })
            .chain(std::io::stdout())
        )
        .chain(fern::Dispatch::new()
            .level(LevelFilter::Trace)
            .chain(fern::log_file(LOG_FILE)?)
        )
        .apply()
        .context("could not set up logging facility")
}
