use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, trace, warn};
use reqwest::Client;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use url::Url;

use crate::types::config::InfluxDb;
use crate::types::point::{FieldValue, Point};
use crate::util::redacted::Redacted;

pub const BATCH_SIZE: usize = 5000;
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(1000);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Somewhere to put finished points.
pub trait Sink {
    fn write(&self, point: Point);
}

/// Buffered writer for the InfluxDB v2 write API.
///
/// Points are queued to a background task which posts them in batches. Nothing is
/// guaranteed to have reached the server until [`Writer::close`] returns.
pub struct Writer {
    tx: UnboundedSender<Point>,
    handle: JoinHandle<()>,
}

impl Writer {
    pub fn new(influx: &InfluxDb) -> Result<Self> {
        let mut url = Url::parse(&influx.url)
            .and_then(|url| url.join("/api/v2/write"))
            .context("failed to parse influxdb url")?;

        url.query_pairs_mut()
            .append_pair("org", &influx.org)
            .append_pair("bucket", &influx.bucket)
            .append_pair("precision", "ns");

        let client = Client::builder()
            .timeout(WRITE_TIMEOUT)
            .build()
            .context("could not build influxdb client")?;
        let auth = Redacted::new(format!("Token {}", influx.token.as_inner()));

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::task::spawn(flush_loop(client, url, auth, rx));

        Ok(Writer { tx, handle })
    }

    /// Stops accepting points and waits for everything queued to be sent.
    pub async fn close(self) {
        let Writer { tx, handle } = self;
        drop(tx);

        if let Err(e) = handle.await {
            error!("influxdb writer task failed: {}", e);
        }
    }
}

impl Sink for Writer {
    fn write(&self, point: Point) {
        if self.tx.send(point).is_err() {
            error!("influxdb writer is gone, dropping point");
        }
    }
}

async fn flush_loop(client: Client, url: Url, auth: Redacted<String>, mut rx: UnboundedReceiver<Point>) {
    let mut batch = Vec::new();

    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            point = rx.recv() => {
                let point = match point {
                    Some(p) => p,
                    None => break,
                };

                match to_line(&point) {
                    Some(line) => batch.push(line),
                    None => warn!("point for {} has no writable fields, dropping it", point.measurement()),
                }

                if batch.len() >= BATCH_SIZE {
                    flush(&client, &url, &auth, &mut batch).await;
                }
            }
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    flush(&client, &url, &auth, &mut batch).await;
                }
            }
        }
    }

    if !batch.is_empty() {
        flush(&client, &url, &auth, &mut batch).await;
    }

    debug!("influxdb writer stopped");
}

async fn flush(client: &Client, url: &Url, auth: &Redacted<String>, batch: &mut Vec<String>) {
    let body = batch.join("\n");
    let lines = batch.len();
    batch.clear();

    trace!("line_format: {}", body);

    let res = client.post(url.clone())
        .header("Authorization", auth.as_inner())
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(body)
        .send()
        .await
        .and_then(|resp| resp.error_for_status());

    match res {
        Ok(_) => debug!("sent {} point(s) to influxdb", lines),
        Err(e) => error!("failed to send {} point(s) to influxdb: {}", lines, e),
    }
}

/// Encodes a point as one line of InfluxDB line protocol.
///
/// Every number is written as a float so a source that sends `60` in one cycle and
/// `60.5` in the next does not produce a field type conflict. Null fields and empty tag
/// values are skipped; a point left with no fields cannot be written and yields `None`.
pub fn to_line(point: &Point) -> Option<String> {
    let mut line = escape(point.measurement(), &[',', ' ']);

    for (key, value) in point.tags() {
        if key.is_empty() || value.is_empty() {
            continue;
        }

        line.push(',');
        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        line.push_str(&escape(value, &[',', '=', ' ']));
    }

    let mut first = true;
    for (key, value) in point.fields() {
        let encoded = match value {
            FieldValue::Null => continue,
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::UInteger(u) => u.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::String(s) => quote(s),
            FieldValue::Nested(v) => quote(&v.to_string()),
        };

        if key.is_empty() {
            continue;
        }

        line.push(if first { ' ' } else { ',' });
        first = false;

        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        line.push_str(&encoded);
    }

    if first {
        return None;
    }

    if let Some(nanos) = point.timestamp().timestamp_nanos_opt() {
        let _ = write!(line, " {}", nanos);
    }

    Some(line)
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }

    // a trailing backslash would escape the separator that follows it
    if out.ends_with('\\') {
        out.push('\\');
    }

    out
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');

    out
}
