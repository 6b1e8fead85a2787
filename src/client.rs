use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::Client;
use serde_json::Value;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info};

use crate::error::FetchError;

pub const DEFAULT_BASE_URL: &str = "https://api.winnipegtransit.com/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Fetches raw stop schedules from the Winnipeg Transit API.
pub struct TransitClient {
    api_key: String,
    base_url: String,
    client: Client,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl TransitClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            min_interval: Duration::from_secs(1),
            last_request: Mutex::new(None),
        })
    }

    /// Minimum spacing between two requests sent by this client.
    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn schedule_url(&self, stop: &str, window: Option<(NaiveDateTime, NaiveDateTime)>) -> String {
        let mut url = format!(
            "{}/stops/{}/schedule.json?api-key={}",
            self.base_url, stop, self.api_key
        );
        if let Some((start, end)) = window {
            url.push_str(&format!(
                "&start={}&end={}",
                start.format(TIMESTAMP_FORMAT),
                end.format(TIMESTAMP_FORMAT)
            ));
        }
        url
    }

    /// Fetches the schedule tree for `stop`, optionally limited to a window
    /// of departure times. The body is returned undecoded for the normalizer.
    pub async fn fetch_schedule(
        &self,
        stop: &str,
        window: Option<(NaiveDateTime, NaiveDateTime)>,
    ) -> Result<Value, FetchError> {
        self.throttle().await;

        info!("Fetching schedule for stop {}", stop);
        let response = self.client.get(self.schedule_url(stop, window)).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                stop: stop.to_string(),
                status: response.status(),
            });
        }

        Ok(response.json().await?)
    }

    async fn throttle(&self) {
        let mut last_request = self.last_request.lock().await;
        if let Some(previous) = *last_request {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                debug!("rate limiting schedule request");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_request = Some(Instant::now());
    }
}
