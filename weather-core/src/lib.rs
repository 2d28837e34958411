//! Core library for the `weather` screen.
//!
//! This crate defines:
//! - Configuration of the endpoint (city, units, API key)
//! - The `WeatherRecord` model and the `FetchError` taxonomy
//! - The `WeatherSource` seam with its blocking and callback call forms
//! - The OpenWeatherMap client and its response decoder
//!
//! It is used by `weather-screen`, but can also be reused by other binaries or services.

pub mod client;
pub mod config;
pub mod error;
pub mod model;

pub use client::{
    WeatherSource, client_from_config, fetch_async, fetch_blocking,
    openweather::{WeatherClient, WeatherClientBuilder, decode_current},
};
pub use config::{Config, Units};
pub use error::FetchError;
pub use model::WeatherRecord;
