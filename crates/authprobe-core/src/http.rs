//! reqwest-backed [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::domain::HttpMethod;
use crate::error::TransportError;
use crate::transport::{NormalizedResponse, ProbeRequest, Transport};

const USER_AGENT: &str = concat!("authprobe/", env!("CARGO_PKG_VERSION"));

/// HTTP transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HttpTransport {
    pub fn new(default_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("http client: {e}")))?;
        Ok(Self::with_client(client, default_timeout))
    }

    pub fn with_client(client: reqwest::Client, default_timeout: Duration) -> Self {
        Self {
            client,
            default_timeout,
        }
    }

    fn header_map(request: &ProbeRequest) -> Result<HeaderMap, TransportError> {
        let mut map = HeaderMap::new();
        for (name, value) in request.merged_headers() {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            let header_value =
                HeaderValue::from_str(&value).map_err(|e| TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ProbeRequest) -> Result<NormalizedResponse, TransportError> {
        let url = request.url()?;
        let headers = Self::header_map(request)?;

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        }
        .headers(headers)
        .timeout(request.timeout.unwrap_or(self.default_timeout));

        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| TransportError::InvalidRequest(format!("body: {e}")))?;
            builder = builder.body(bytes);
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => return Ok(network_error(&e)),
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => Ok(NormalizedResponse::from_parts(status, &body)),
            // headers arrived but the body did not; keep the status
            Err(_) => Ok(NormalizedResponse::from_parts(status, &[])),
        }
    }
}

fn network_error(err: &reqwest::Error) -> NormalizedResponse {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    NormalizedResponse::NetworkError {
        message: format!("{}: {}", kind, err),
    }
}
