use chrono::{DateTime, NaiveDateTime, Utc};
use log::{info, warn};
use reqwest::blocking::Client;
use reqwest::header::DATE;

use crate::config::ClockConfig;
use crate::error::{ClockError, FetchError};

/// An authoritative instant reported by one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTime {
    pub at: DateTime<Utc>,
    pub endpoint: String,
}

/// One round trip to a time endpoint, yielding the raw `Date` header value.
pub trait DateProbe: Send + Sync {
    fn probe(&self, endpoint: &str) -> Result<String, FetchError>;
}

pub struct HttpDateProbe {
    client: Client,
}

impl HttpDateProbe {
    pub fn new(config: &ClockConfig) -> Result<Self, ClockError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(ClockError::HttpClient)?;
        Ok(Self { client })
    }
}

impl DateProbe for HttpDateProbe {
    fn probe(&self, endpoint: &str) -> Result<String, FetchError> {
        let response =
            self.client
                .head(endpoint)
                .send()
                .map_err(|source| FetchError::Request {
                    endpoint: endpoint.to_string(),
                    source,
                })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let value = response
            .headers()
            .get(DATE)
            .ok_or_else(|| FetchError::MissingDateHeader {
                endpoint: endpoint.to_string(),
            })?;
        value
            .to_str()
            .map(str::to_string)
            .map_err(|_| FetchError::InvalidDateHeader {
                value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })
    }
}

/// Parses an HTTP `Date` header. IMF-fixdate is what servers send today;
/// the obsolete RFC 850 and asctime forms are accepted as well and read as GMT.
pub fn parse_date_header(value: &str) -> Result<DateTime<Utc>, FetchError> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%A, %d-%b-%y %H:%M:%S GMT")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%a %b %e %H:%M:%S %Y"))
        .map(|naive| naive.and_utc())
        .map_err(|_| FetchError::InvalidDateHeader {
            value: trimmed.to_string(),
        })
}

/// Walks `endpoints` in order and returns the first instant that could be
/// fetched and parsed. `None` means every endpoint failed.
pub fn fetch_authoritative_time(probe: &dyn DateProbe, endpoints: &[String]) -> Option<NetworkTime> {
    for endpoint in endpoints {
        match probe
            .probe(endpoint)
            .and_then(|header| parse_date_header(&header))
        {
            Ok(at) => {
                info!("time received from {endpoint}: {at}");
                return Some(NetworkTime {
                    at,
                    endpoint: endpoint.clone(),
                });
            }
            Err(err) => warn!("time endpoint {endpoint} failed: {err}"),
        }
    }
    warn!(
        "all {} time endpoints failed; current time is unknown",
        endpoints.len()
    );
    None
}
