use thiserror::Error;

/// Why a fetch produced no [`WeatherRecord`](crate::WeatherRecord).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not complete: connect, DNS, timeout or body read.
    /// Carries the transport's message, source chain included.
    #[error("{0}")]
    Network(String),

    /// The body is not JSON or lacks one of the expected numeric leaves.
    #[error("Failed to decode weather response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Builds a `Network` error from any error, flattening its source chain
    /// so the displayed message names the root cause.
    pub fn network(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        FetchError::Network(message)
    }

    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, FetchError::Decode(_))
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(e.to_string())
    }
}
