use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::redacted::Redacted;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file {0} does not exist")]
    NotFound(PathBuf),
    #[error("config file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("could not encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(rename = "Record")]
    pub record: Record,
    #[serde(rename = "InfluxDb")]
    pub influx: InfluxDb,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Record {
    #[serde(rename = "jsonURL")]
    pub json_url: String,
    #[serde(rename = "recordIntervalMsec")]
    pub interval_ms: u64,
    #[serde(rename = "tagsToAttachWhenRecord")]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InfluxDb {
    #[serde(rename = "dbUrl")]
    pub url: String,
    pub token: Redacted<String>,
    #[serde(rename = "bucketName")]
    pub bucket: String,
    #[serde(rename = "organizationName")]
    pub org: String,
    #[serde(rename = "measurementName")]
    pub measurement: String,
}

impl Record {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Reads and validates the config at `path`.
    ///
    /// A missing file is reported as [`ConfigError::NotFound`] so the caller can
    /// [`bootstrap`](Config::bootstrap) one instead of failing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config_toml = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        let config: Config = toml::from_str(&config_toml)
            .map_err(|source| ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;

        Ok(config)
    }

    /// Writes [`Config::placeholder`] to `path`. Never replaces an existing file.
    pub fn bootstrap(path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        let encoded = toml::to_string(&Self::placeholder())?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(io_err)?;
        file.write_all(encoded.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        Ok(())
    }

    pub fn placeholder() -> Self {
        let mut tags = BTreeMap::new();
        tags.insert("Host".to_string(), "Home00".to_string());

        Config {
            record: Record {
                json_url: "http://192.168.0.XXX".to_string(),
                interval_ms: 5000,
                tags,
            },
            influx: InfluxDb {
                url: "http://192.168.0.XXX".to_string(),
                token: Redacted::new("XXXXXXXXXXXXXXXXXXXXX".to_string()),
                bucket: "MyBucket".to_string(),
                org: "MyOrganization".to_string(),
                measurement: "MyMeasurement".to_string(),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.record.interval_ms == 0 {
            return Err(ConfigError::Invalid("recordIntervalMsec must be greater than zero".into()));
        }

        if self.influx.measurement.is_empty() {
            return Err(ConfigError::Invalid("measurementName cannot be empty".into()));
        }

        Ok(())
    }
}
