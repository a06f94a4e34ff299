use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// Header carrying the per-attempt trace id to the receiver.
pub const TRACE_HEADER: &str = "X-Trace-Id";

/// Terminal result of one outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success { body: String },
    /// The receiver answered 429.
    RateLimited,
    Failure { detail: String },
}

impl CallOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CallOutcome::Success { .. } => "success",
            CallOutcome::RateLimited => "rate_limited",
            CallOutcome::Failure { .. } => "failure",
        }
    }
}

/// Outbound `GET /ping`. Implementations never retry.
#[async_trait]
pub trait PongClient: Send + Sync + 'static {
    async fn ping(&self, trace_id: &str) -> CallOutcome;
}

#[derive(Debug, Clone)]
pub struct HttpPongClient {
    client: reqwest::Client,
    url: String,
}

impl HttpPongClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PongClient for HttpPongClient {
    async fn ping(&self, trace_id: &str) -> CallOutcome {
        let response = match self
            .client
            .get(&self.url)
            .header(TRACE_HEADER, trace_id)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return CallOutcome::Failure {
                    detail: format!("request timed out: {e}"),
                }
            }
            Err(e) => {
                return CallOutcome::Failure {
                    detail: format!("HTTP error: {e}"),
                }
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return CallOutcome::RateLimited;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return CallOutcome::Failure {
                detail: format!("Pong returned {status}: {body}"),
            };
        }

        match response.text().await {
            Ok(body) => CallOutcome::Success { body },
            Err(e) => CallOutcome::Failure {
                detail: format!("failed to read response body: {e}"),
            },
        }
    }
}
