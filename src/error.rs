use chrono::NaiveDateTime;
use thiserror::Error;

/// Failure of a single time endpoint. Every variant makes the fetch fall
/// through to the next endpoint in priority order.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} answered with HTTP status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("{endpoint} sent no Date header")]
    MissingDateHeader { endpoint: String },
    #[error("unparseable Date header '{value}'")]
    InvalidDateHeader { value: String },
}

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("current time is unknown; no time source has answered")]
    TimeUnknown,
    #[error("local time {0} does not exist in this time zone")]
    NonexistentLocalTime(NaiveDateTime),
    #[error("date out of range while composing alarm time")]
    DateOutOfRange,
    #[error("invalid clock config: {0}")]
    InvalidConfig(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("failed to spawn time sync worker: {0}")]
    SpawnWorker(#[source] std::io::Error),
}
