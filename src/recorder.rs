use std::future::Future;
use std::time::Duration;

use log::{debug, error, info};
use tokio::time::{Instant, MissedTickBehavior};

use crate::influx::Sink;
use crate::source::Source;
use crate::types::point::{Point, Tags};

/// Polls a [`Source`] on a fixed interval and hands each result to a [`Sink`].
pub struct Recorder<'a, S, W> {
    source: &'a S,
    sink: &'a W,
    measurement: String,
    tags: Tags,
    interval: Duration,
}

impl<'a, S: Source, W: Sink> Recorder<'a, S, W> {
    pub fn new(source: &'a S, sink: &'a W, measurement: impl Into<String>, tags: Tags, interval: Duration) -> Self {
        Recorder {
            source,
            sink,
            measurement: measurement.into(),
            tags,
            interval,
        }
    }

    /// Runs cycles until `shutdown` resolves.
    ///
    /// The first cycle starts one interval after the call. A cycle that runs long pushes
    /// the next one back instead of queueing extra ticks, so cycles never overlap. A cycle
    /// already in progress is finished before returning.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        info!("recording every {:?}", self.interval);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.cycle().await;
                }
            }
        }

        debug!("recorder stopped");
    }

    /// One fetch, build, write sequence. Returns whether a point was written.
    pub async fn cycle(&self) -> bool {
        let fields = match self.source.fetch().await {
            Ok(fields) => fields,
            Err(e) => {
                error!("could not fetch json: {}", e);
                return false;
            }
        };

        let point = Point::now(self.measurement.clone(), self.tags.clone(), fields);
        debug!("recording {} field(s) to {}", point.fields().len(), self.measurement);
        self.sink.write(point);

        true
    }
}
