use crate::{Config, FetchError, WeatherRecord, client::openweather::WeatherClient};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc, thread};
use tokio::runtime::{Builder, Handle};
use tracing::{debug, error};

pub mod openweather;

/// Anything that can produce the current conditions for one fixed place.
///
/// This is the only non-blocking implementation of a fetch;
/// [`fetch_blocking`] and [`fetch_async`] are the two ways of calling it.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn fetch(&self) -> Result<WeatherRecord, FetchError>;
}

/// Runs one fetch to completion on the calling thread.
///
/// Drives a fresh current-thread runtime, so it must be called from a
/// worker (`spawn_blocking` or a plain thread), never from inside an async
/// task.
pub fn fetch_blocking(source: &dyn WeatherSource) -> Result<WeatherRecord, FetchError> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| FetchError::network(&e))?;

    let result = runtime.block_on(source.fetch());
    log_outcome(&result);
    result
}

/// Schedules one fetch and calls `on_result` exactly once when it ends.
///
/// The fetch runs on the ambient Tokio runtime if there is one, otherwise
/// on a dedicated thread. Either way `on_result` fires from that worker and
/// not from the caller's thread.
pub fn fetch_async<F>(source: Arc<dyn WeatherSource>, on_result: F)
where
    F: FnOnce(Result<WeatherRecord, FetchError>) + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                let result = source.fetch().await;
                log_outcome(&result);
                on_result(result);
            });
        }
        Err(_) => {
            debug!("no runtime on this thread, fetching on a worker thread");
            thread::spawn(move || on_result(fetch_blocking(source.as_ref())));
        }
    }
}

fn log_outcome(result: &Result<WeatherRecord, FetchError>) {
    match result {
        Ok(record) => debug!(?record, "weather fetched"),
        Err(e) => error!("weather fetch failed: {e}"),
    }
}

/// Construct the OpenWeatherMap client described by `config`.
pub fn client_from_config(config: &Config) -> anyhow::Result<WeatherClient> {
    let endpoint = config.endpoint()?;
    let client = WeatherClient::builder(endpoint).timeout(config.timeout()).build()?;
    Ok(client)
}
