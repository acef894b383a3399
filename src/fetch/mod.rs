//! Downloads the raw wide-format series from the CSSE repository.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{error, info};

use crate::error::{PipelineError, PipelineResult};
use crate::metric::Metric;

pub const DEFAULT_BASE_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/";

/// GETs `url` and returns the body. Non-success statuses are errors.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

pub fn series_url(base_url: &str, metric: Metric) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        metric.remote_filename()
    )
}

/// Downloads one metric into `data_dir` under its local file name.
#[tracing::instrument(skip(client))]
pub async fn download_series<C: HttpClient>(
    client: &C,
    base_url: &str,
    metric: Metric,
    data_dir: &Path,
) -> PipelineResult<PathBuf> {
    let url = series_url(base_url, metric);
    let failure = |reason: String| PipelineError::Fetch {
        metric,
        url: url.clone(),
        reason,
    };

    let bytes = fetch_bytes(client, &url)
        .await
        .map_err(|e| failure(format!("{e:#}")))?;

    let path = data_dir.join(metric.local_filename());
    fs::create_dir_all(data_dir)
        .and_then(|_| fs::write(&path, &bytes))
        .map_err(|e| failure(e.to_string()))?;

    info!(path = %path.display(), bytes = bytes.len(), "Downloaded series");
    Ok(path)
}

/// Downloads all three metrics. A failed file is reported in its slot and
/// does not stop the remaining downloads.
pub async fn download_all<C: HttpClient>(
    client: &C,
    base_url: &str,
    data_dir: &Path,
) -> Vec<(Metric, PipelineResult<PathBuf>)> {
    let mut results = Vec::with_capacity(Metric::ALL.len());

    for metric in Metric::ALL {
        let result = download_series(client, base_url, metric, data_dir).await;
        if let Err(e) = &result {
            error!(%metric, error = %e, "Series download failed");
        }
        results.push((metric, result));
    }

    results
}
