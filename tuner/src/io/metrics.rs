//! Metrics queries used to evaluate stop bounds.
//!
//! The [`MetricsSource`] trait decouples the scheduler from the metrics
//! service. An unreachable service, a non-success response or an empty series
//! all mean "no signal yet" and never stop a run.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use tracing::{debug, instrument};

use crate::core::stop::{Breach, ScalarPoint, StopBound};

/// Source of the latest scalar reported for a run/tag pair.
pub trait MetricsSource {
    /// Latest point, or `None` when no data is available (yet).
    fn latest(&self, run: &str, tag: &str) -> Option<ScalarPoint>;
}

/// Scalars endpoint answering `GET ?run=..&tag=..` with `[[wall_time, step, value], ...]`.
pub struct HttpMetrics {
    client: Client,
    endpoint: String,
}

impl HttpMetrics {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("build metrics http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn fetch(&self, run: &str, tag: &str) -> Result<Option<ScalarPoint>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("run", run), ("tag", tag)])
            .send()
            .context("send metrics request")?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "no scalar data yet");
            return Ok(None);
        }
        let series: Vec<(f64, f64, f64)> = response.json().context("decode scalar series")?;
        Ok(series.last().map(|&(wall_time, step, value)| ScalarPoint {
            wall_time,
            step: step.max(0.0) as u64,
            value,
        }))
    }
}

impl MetricsSource for HttpMetrics {
    #[instrument(skip(self))]
    fn latest(&self, run: &str, tag: &str) -> Option<ScalarPoint> {
        match self.fetch(run, tag) {
            Ok(point) => point,
            Err(err) => {
                debug!(err = %format!("{err:#}"), "could not query metrics service");
                None
            }
        }
    }
}

/// Evaluate one bound for one run.
pub fn evaluate<M: MetricsSource + ?Sized>(bound: &StopBound, source: &M, run: &str) -> Option<Breach> {
    let point = source.latest(run, &bound.tag)?;
    bound.check(&point)
}

/// First breach over every bound and every composite id, bounds outermost.
pub fn first_breach<M: MetricsSource + ?Sized>(
    bounds: &[StopBound],
    source: &M,
    composite_ids: &[String],
) -> Option<Breach> {
    bounds
        .iter()
        .flat_map(|bound| composite_ids.iter().map(move |id| (bound, id)))
        .find_map(|(bound, id)| evaluate(bound, source, id))
}
