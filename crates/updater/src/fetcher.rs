use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, UpdaterError};
use crate::logging::{EventLog, TracingLog};

/// Default per-request deadline.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(20_000);

const PREVIEW_CHARS: usize = 200;

/// Response body, parsed according to its declared content type.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedBody {
    Json(Value),
    Text(String),
}

impl FetchedBody {
    /// Deserialize a JSON body into `T`. Text bodies are a decode error.
    pub fn decode<T: DeserializeOwned>(self, url: &str) -> Result<T> {
        match self {
            FetchedBody::Json(value) => {
                serde_json::from_value(value).map_err(|err| UpdaterError::decode(url, err))
            }
            FetchedBody::Text(_) => Err(UpdaterError::decode(url, "expected a JSON document")),
        }
    }

    fn preview(&self) -> String {
        let rendered = match self {
            FetchedBody::Json(value) => value.to_string(),
            FetchedBody::Text(text) => Value::String(text.clone()).to_string(),
        };
        rendered.chars().take(PREVIEW_CHARS).collect()
    }
}

/// Abstraction over timed HTTP GET requests.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// GET `url`, failing with [`UpdaterError::Timeout`] when no response
    /// arrives within `timeout`. A zero timeout means the client default.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedBody>;
}

/// Builder for [`TimedHttpClient`].
#[derive(Default)]
pub struct TimedHttpClientBuilder {
    client: Option<Client>,
    user_agent: Option<String>,
    default_timeout: Option<Duration>,
    log: Option<Arc<dyn EventLog>>,
}

impl TimedHttpClientBuilder {
    /// Provide a custom reqwest client instance. Overrides `user_agent`.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn log(mut self, log: Arc<dyn EventLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<TimedHttpClient> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(
                    self.user_agent
                        .unwrap_or_else(|| concat!("splash-updater/", env!("CARGO_PKG_VERSION")).to_string()),
                )
                .build()
                .map_err(|err| UpdaterError::Other(format!("failed to build HTTP client: {err}")))?,
        };
        let default_timeout = self
            .default_timeout
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(DEFAULT_FETCH_TIMEOUT);

        Ok(TimedHttpClient {
            client,
            default_timeout,
            log: self.log.unwrap_or_else(TracingLog::shared),
        })
    }
}

/// reqwest-backed fetcher with per-call deadlines and lifecycle logging.
#[derive(Clone)]
pub struct TimedHttpClient {
    client: Client,
    default_timeout: Duration,
    log: Arc<dyn EventLog>,
}

impl TimedHttpClient {
    /// Create a new builder.
    pub fn builder() -> TimedHttpClientBuilder {
        TimedHttpClientBuilder::default()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Underlying client, shared with streaming downloads.
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    async fn request(&self, url: &str, timeout: Duration) -> Result<FetchedBody> {
        let parsed = Url::parse(url).map_err(|err| UpdaterError::InvalidUrl(format!("{url}: {err}")))?;

        let exchange = async {
            let response = self
                .client
                .get(parsed)
                .send()
                .await
                .map_err(|source| UpdaterError::Network {
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status();
            self.log
                .info(&format!("[FETCH-STATUS] {url} -> {}", status.as_u16()));
            if !status.is_success() {
                return Err(UpdaterError::Http {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let is_json = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(is_json_content_type)
                .unwrap_or(false);

            let text = response
                .text()
                .await
                .map_err(|source| UpdaterError::Network {
                    url: url.to_string(),
                    source,
                })?;

            if is_json {
                serde_json::from_str(&text)
                    .map(FetchedBody::Json)
                    .map_err(|err| UpdaterError::decode(url, err))
            } else {
                Ok(FetchedBody::Text(text))
            }
        };

        // Dropping the exchange future on expiry aborts the in-flight request.
        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(UpdaterError::Timeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }
}

#[async_trait]
impl HttpFetcher for TimedHttpClient {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedBody> {
        let timeout = if timeout.is_zero() {
            self.default_timeout
        } else {
            timeout
        };
        let _scope = FetchScope::start(self.log.clone(), url);

        match self.request(url, timeout).await {
            Ok(body) => {
                self.log
                    .debug(&format!("[FETCH-DATA] {url} -> {}", body.preview()));
                Ok(body)
            }
            Err(err) => {
                self.log.error(&format!("[FETCH-ERROR] {url}: {err}"));
                Err(err)
            }
        }
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("application/json") || content_type.contains("+json")
}

/// Emits the start line on creation and the end line when dropped, so the
/// end line fires once on every exit path, including cancellation.
struct FetchScope {
    log: Arc<dyn EventLog>,
    url: String,
    started: Instant,
}

impl FetchScope {
    fn start(log: Arc<dyn EventLog>, url: &str) -> Self {
        log.info(&format!("[FETCH-START] {url}"));
        Self {
            log,
            url: url.to_string(),
            started: Instant::now(),
        }
    }
}

impl Drop for FetchScope {
    fn drop(&mut self) {
        self.log.info(&format!(
            "[FETCH-END] {} ({} ms)",
            self.url,
            self.started.elapsed().as_millis()
        ));
    }
}
