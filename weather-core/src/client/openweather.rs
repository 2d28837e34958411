use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{FetchError, model::WeatherRecord};

use super::WeatherSource;

/// Client for the OpenWeatherMap "current weather" endpoint.
///
/// The endpoint is used exactly as given: city, units and API key are
/// already part of its query string.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    endpoint: Url,
    http: Client,
}

#[derive(Debug)]
pub struct WeatherClientBuilder {
    endpoint: Url,
    timeout: Option<Duration>,
}

impl WeatherClientBuilder {
    /// Whole-request timeout. `None` leaves the transport default in place.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<WeatherClient, FetchError> {
        // Pooled connections are bound to the runtime that opened them, and
        // the blocking form runs every call on its own short-lived runtime.
        let mut http = Client::builder().pool_max_idle_per_host(0);
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        let http = http.build().map_err(|e| FetchError::network(&e))?;

        Ok(WeatherClient { endpoint: self.endpoint, http })
    }
}

impl WeatherClient {
    pub fn new(endpoint: Url) -> Result<Self, FetchError> {
        Self::builder(endpoint).build()
    }

    pub fn builder(endpoint: Url) -> WeatherClientBuilder {
        WeatherClientBuilder { endpoint, timeout: None }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Blocking form of [`WeatherSource::fetch`]; see [`super::fetch_blocking`].
    pub fn fetch_blocking(&self) -> Result<WeatherRecord, FetchError> {
        super::fetch_blocking(self)
    }

    /// Callback form of [`WeatherSource::fetch`]; see [`super::fetch_async`].
    pub fn fetch_async<F>(&self, on_result: F)
    where
        F: FnOnce(Result<WeatherRecord, FetchError>) + Send + 'static,
    {
        super::fetch_async(Arc::new(self.clone()), on_result)
    }

    async fn fetch_current(&self) -> Result<WeatherRecord, FetchError> {
        info!(host = self.endpoint.host_str().unwrap_or_default(), "fetching current weather");

        let res = self
            .http
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|e| FetchError::network(&e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| FetchError::network(&e))?;

        // The body is decoded whatever the status; error payloads simply
        // fail to decode.
        if !status.is_success() {
            warn!("weather endpoint answered {}: {}", status, truncate_body(&body));
        }

        decode_current(&body)
    }
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn fetch(&self) -> Result<WeatherRecord, FetchError> {
        self.fetch_current().await
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    pressure: f64,
    humidity: f64,
}

// `name` and `dt` stay untyped so an unexpected shape drops the field
// instead of failing the decode.
#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    name: Option<Value>,
    dt: Option<Value>,
}

/// Decodes a current-weather body into a record.
///
/// Only `main.temp`, `main.pressure` and `main.humidity` are required, and
/// all three must be numbers. `name` and `dt` are picked up when present;
/// everything else is ignored.
pub fn decode_current(body: &str) -> Result<WeatherRecord, FetchError> {
    let parsed: OwCurrentResponse = serde_json::from_str(body)?;

    let mut record =
        WeatherRecord::new(parsed.main.temp, parsed.main.pressure, parsed.main.humidity);
    if let Some(name) = parsed.name.as_ref().and_then(Value::as_str).filter(|n| !n.is_empty()) {
        record = record.with_location(name);
    }
    if let Some(observed_at) = parsed.dt.as_ref().and_then(unix_seconds).and_then(unix_to_utc) {
        record = record.with_observed_at(observed_at);
    }

    Ok(record)
}

fn unix_seconds(dt: &Value) -> Option<i64> {
    dt.as_i64().or_else(|| dt.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
