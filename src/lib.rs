pub mod console;
pub mod influx;
pub mod logging;
pub mod recorder;
pub mod source;
pub mod types;
pub mod util;
