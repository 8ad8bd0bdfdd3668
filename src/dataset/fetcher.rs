//! Remote disclosure file downloads.
//!
//! This module fetches quarterly disclosure files over HTTP with a bounded
//! number of attempts, reporting progress while the body streams in.

use crate::error::LcaError;
use crate::models::Period;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where disclosure files come from.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Human-readable location of the file for `period` (used in logs).
    fn location(&self, period: Period) -> String;

    /// Fetch the raw file for `period`.
    async fn fetch(&self, period: Period) -> Result<Vec<u8>, LcaError>;
}

/// Options for the HTTP source.
#[derive(Debug, Clone)]
pub struct HttpSourceOptions {
    /// URL with `{year}` and `{quarter}` placeholders.
    pub url_template: String,
    pub timeout_seconds: u64,
    /// Total attempts before giving up (at least one).
    pub retries: usize,
    /// Base delay between attempts; grows linearly with the attempt number.
    pub retry_delay: Duration,
    pub show_progress: bool,
}

impl Default for HttpSourceOptions {
    fn default() -> Self {
        Self {
            url_template: "https://www.flcdatacenter.com/download/LCA_{year}Q{quarter}.xlsx"
                .to_string(),
            timeout_seconds: 60,
            retries: 3,
            retry_delay: Duration::from_millis(1000),
            show_progress: true,
        }
    }
}

/// Downloads disclosure files over HTTP.
pub struct HttpSource {
    options: HttpSourceOptions,
    client: reqwest::Client,
}

/// Outcome of a single download attempt.
enum Attempt {
    Done(Vec<u8>),
    /// Not worth retrying (e.g. the period does not exist).
    Fatal(String),
    Retry(String),
}

impl HttpSource {
    pub fn new(options: HttpSourceOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .user_agent(concat!("lcasearch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { options, client })
    }

    /// Expand the URL template for a period.
    pub fn url_for(&self, period: Period) -> String {
        expand_template(&self.options.url_template, period)
    }

    async fn attempt(&self, url: &str) -> Attempt {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Attempt::Retry(format!(
                    "request timed out after {}s",
                    self.options.timeout_seconds
                ))
            }
            Err(e) if e.is_connect() => {
                return Attempt::Retry(format!("cannot connect to {}", url));
            }
            Err(e) => return Attempt::Retry(format!("request failed: {}", e)),
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Attempt::Fatal(format!("{} returned 404 Not Found", url));
        }
        if status.is_client_error() && !is_transient(status) {
            return Attempt::Fatal(format!("{} returned {}", url, status));
        }
        if !status.is_success() {
            return Attempt::Retry(format!("{} returned {}", url, status));
        }

        let progress = self.progress_bar(response.content_length());
        let mut body = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    body.extend_from_slice(&bytes);
                    if let Some(ref pb) = progress {
                        pb.set_position(body.len() as u64);
                    }
                }
                Err(e) => {
                    if let Some(pb) = progress {
                        pb.abandon_with_message("Download interrupted");
                    }
                    return Attempt::Retry(format!("download interrupted: {}", e));
                }
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message("Download complete");
        }

        Attempt::Done(body)
    }

    fn progress_bar(&self, length: Option<u64>) -> Option<ProgressBar> {
        if !self.options.show_progress {
            return None;
        }
        let pb = match length {
            Some(len) => {
                let pb = ProgressBar::new(len);
                if let Ok(style) = ProgressStyle::default_bar().template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                ) {
                    pb.set_style(style.progress_chars("#>-"));
                }
                pb
            }
            None => ProgressBar::new_spinner(),
        };
        Some(pb)
    }
}

#[async_trait]
impl DatasetSource for HttpSource {
    fn location(&self, period: Period) -> String {
        self.url_for(period)
    }

    async fn fetch(&self, period: Period) -> Result<Vec<u8>, LcaError> {
        let url = self.url_for(period);
        let attempts = self.options.retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            info!("Downloading {} (attempt {}/{})", url, attempt, attempts);

            match self.attempt(&url).await {
                Attempt::Done(body) => {
                    debug!("Downloaded {} bytes from {}", body.len(), url);
                    return Ok(body);
                }
                Attempt::Fatal(reason) => {
                    return Err(LcaError::DataUnavailable { period, reason });
                }
                Attempt::Retry(reason) => {
                    warn!("Attempt {}/{} failed: {}", attempt, attempts, reason);
                    last_error = reason;
                    if attempt < attempts {
                        tokio::time::sleep(self.options.retry_delay * attempt as u32).await;
                    }
                }
            }
        }

        Err(LcaError::DataUnavailable {
            period,
            reason: format!("giving up after {} attempts: {}", attempts, last_error),
        })
    }
}

/// Client errors that clear up on their own and are worth another attempt.
fn is_transient(status: reqwest::StatusCode) -> bool {
    matches!(
        status,
        reqwest::StatusCode::REQUEST_TIMEOUT | reqwest::StatusCode::TOO_MANY_REQUESTS
    )
}

/// Substitute `{year}` and `{quarter}` in a URL template.
pub fn expand_template(template: &str, period: Period) -> String {
    template
        .replace("{year}", &period.year.to_string())
        .replace("{quarter}", &period.quarter.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_template() {
        let period = Period::new(2023, 2).unwrap();
        assert_eq!(
            expand_template("https://example.test/LCA_{year}Q{quarter}.xlsx", period),
            "https://example.test/LCA_2023Q2.xlsx"
        );
    }

    #[test]
    fn test_transient_client_errors() {
        assert!(is_transient(reqwest::StatusCode::REQUEST_TIMEOUT));
        assert!(is_transient(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient(reqwest::StatusCode::NOT_FOUND));
        assert!(!is_transient(reqwest::StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_http_source_url() {
        let source = HttpSource::new(HttpSourceOptions::default()).unwrap();
        assert_eq!(
            source.location(Period::default()),
            "https://www.flcdatacenter.com/download/LCA_2024Q4.xlsx"
        );
    }

    #[test]
    fn test_unreachable_host_is_data_unavailable() {
        let options = HttpSourceOptions {
            url_template: "http://127.0.0.1:9/LCA_{year}Q{quarter}.csv".to_string(),
            timeout_seconds: 2,
            retries: 2,
            retry_delay: Duration::from_millis(10),
            show_progress: false,
        };
        let source = HttpSource::new(options).unwrap();
        let err = tokio_test::block_on(source.fetch(Period::default())).unwrap_err();
        assert!(matches!(err, LcaError::DataUnavailable { .. }));
    }
}
