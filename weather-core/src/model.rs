use chrono::{DateTime, Utc};
use serde::Serialize;

/// Current conditions decoded from one successful fetch.
///
/// A record only exists once every measurement has been decoded; there is
/// no partially filled form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRecord {
    temperature: f64,
    pressure: f64,
    humidity: f64,
    location: Option<String>,
    observed_at: Option<DateTime<Utc>>,
}

impl WeatherRecord {
    pub fn new(temperature: f64, pressure: f64, humidity: f64) -> Self {
        Self { temperature, pressure, humidity, location: None, observed_at: None }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = Some(observed_at);
        self
    }

    /// Temperature in the units the endpoint was queried with.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Atmospheric pressure, hPa.
    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    /// Relative humidity, percent.
    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        self.observed_at
    }
}
