//! TalkBI client for reading and managing subscribers.
//!
//! TalkBI exposes a bearer-token JSON API. Only four endpoints are used:
//!
//! | Method   | Path                        | Purpose                     |
//! |----------|-----------------------------|-----------------------------|
//! | `GET`    | `subscribers?page=&limit=`  | paginated contact listing   |
//! | `POST`   | `subscriber/create`         | create, returns `user_ns`   |
//! | `DELETE` | `subscriber/delete`         | delete by `user_ns` in body |
//! | `POST`   | `subscriber/send-sub-flow`  | start a sub-flow            |

use std::time::Duration;

use crm_core::error::AppError;
use crm_core::models::{ContactPage, RemoteContact, SubscriberPayload};
use crm_core::traits::{ContactSource, SubscriberDirectory};
use crm_core::HttpConfig;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

/// Response of `GET /subscribers`.
///
/// Laravel-style pagination: `meta` and `links` are both optional and either
/// may be the only continuation signal the API sends.
#[derive(Deserialize, Debug)]
struct SubscribersResponse {
    data: Option<Vec<RemoteContact>>,
    #[serde(default)]
    meta: Option<PageMeta>,
    #[serde(default)]
    links: Option<PageLinks>,
}

#[derive(Deserialize, Debug)]
struct PageMeta {
    current_page: Option<u32>,
    last_page: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct PageLinks {
    next: Option<String>,
}

/// Response of `POST /subscriber/create`.
///
/// The identifier comes back either nested under `data` or at the top level.
#[derive(Deserialize, Debug)]
struct CreateResponse {
    data: Option<CreatedSubscriber>,
    user_ns: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CreatedSubscriber {
    user_ns: Option<String>,
}

impl CreateResponse {
    fn into_user_ns(self) -> Option<String> {
        self.data
            .and_then(|d| d.user_ns)
            .or(self.user_ns)
            .filter(|id| !id.trim().is_empty())
    }
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    user_ns: &'a str,
}

#[derive(Serialize)]
struct SubFlowRequest<'a> {
    user_ns: &'a str,
    sub_flow_ns: &'a str,
}

/// HTTP client for the TalkBI subscribers API.
///
/// # Examples
///
/// ```no_run
/// use crm_talkbi::TalkbiClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = TalkbiClient::new("https://api.talkbi.com/api/", "secret-token")?;
/// let page = client.list_subscribers(1, 100).await?;
/// println!("{} contacts on page 1", page.contacts.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TalkbiClient {
    client: Client,
    base_url: Url,
    token: String,
    http_config: HttpConfig,
}

impl TalkbiClient {
    /// Creates a client with the default [`HttpConfig`].
    ///
    /// # Arguments
    ///
    /// * `base_url_str` - API root, e.g. `https://api.talkbi.com/api`
    /// * `token` - Bearer token sent with every request
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the URL cannot be parsed or is not http(s).
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(base_url_str: &str, token: &str) -> Result<Self, AppError> {
        Self::with_http_config(base_url_str, token, HttpConfig::default())
    }

    /// Creates a client with explicit timeout and retry settings.
    pub fn with_http_config(
        base_url_str: &str,
        token: &str,
        http_config: HttpConfig,
    ) -> Result<Self, AppError> {
        let mut base_url = Url::parse(base_url_str.trim())
            .map_err(|_| AppError::InvalidUrl(base_url_str.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(AppError::InvalidUrl(base_url_str.to_string()));
        }
        // `Url::join` replaces the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(concat!("crm-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(http_config.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
            http_config,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Fetches one page of subscribers.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ClientError` on a non-success status and
    /// `AppError::MalformedResponse` if the body has no `data` array.
    pub async fn list_subscribers(&self, page: u32, limit: u32) -> Result<ContactPage, AppError> {
        let mut url = self.endpoint("subscribers")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string());

        let resp = self.send(Method::GET, &url, None::<&()>).await?;
        let body: SubscribersResponse = Self::parse(resp).await?;

        let contacts = body
            .data
            .ok_or_else(|| AppError::MalformedResponse(format!("missing `data` in {}", url)))?;

        let mut result = ContactPage::new(contacts);
        if let Some(PageMeta {
            current_page: Some(current),
            last_page: Some(last),
        }) = body.meta
        {
            result = result.with_meta(current, last);
        }
        if let Some(next) = body.links.and_then(|l| l.next) {
            result = result.with_next_link(next);
        }

        tracing::debug!(page, limit, received = result.contacts.len(), "Fetched TalkBI subscribers");
        Ok(result)
    }

    /// Creates a subscriber and returns its `user_ns`.
    pub async fn create(&self, payload: &SubscriberPayload) -> Result<String, AppError> {
        let url = self.endpoint("subscriber/create")?;
        let resp = self.send(Method::POST, &url, Some(payload)).await?;
        let body: CreateResponse = Self::parse(resp).await?;

        body.into_user_ns()
            .ok_or_else(|| AppError::MalformedResponse("create response has no user_ns".to_string()))
    }

    /// Deletes a subscriber. A 404 counts as already deleted.
    pub async fn delete(&self, user_ns: &str) -> Result<(), AppError> {
        let url = self.endpoint("subscriber/delete")?;
        match self
            .send(Method::DELETE, &url, Some(&DeleteRequest { user_ns }))
            .await
        {
            Ok(_) => Ok(()),
            Err(AppError::ClientError(msg)) if msg.starts_with("HTTP 404 ") => {
                tracing::debug!(user_ns, "Subscriber already absent on TalkBI");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Starts the sub-flow `sub_flow_ns` for `user_ns`.
    pub async fn send_sub_flow(&self, user_ns: &str, sub_flow_ns: &str) -> Result<(), AppError> {
        let url = self.endpoint("subscriber/send-sub-flow")?;
        self.send(
            Method::POST,
            &url,
            Some(&SubFlowRequest {
                user_ns,
                sub_flow_ns,
            }),
        )
        .await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::InvalidUrl(e.to_string()))
    }

    async fn parse<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, AppError> {
        let url = resp.url().clone();
        let text = resp
            .text()
            .await
            .map_err(|e| AppError::NetworkError(e.to_string()))?;
        serde_json::from_str(&text)
            .map_err(|e| AppError::MalformedResponse(format!("{} from {}", e, url)))
    }

    fn request<B: Serialize + ?Sized>(&self, method: &Method, url: &Url, body: Option<&B>) -> RequestBuilder {
        let builder = self
            .client
            .request(method.clone(), url.clone())
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json");
        match body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }

    /// Sends a request, retrying transient failures.
    ///
    /// Connection failures and 429s are retried for every method. Server
    /// errors and timeouts are only retried for `GET` and `DELETE`, since a
    /// repeated `POST /subscriber/create` could create a duplicate.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &Url,
        body: Option<&B>,
    ) -> Result<Response, AppError> {
        let max_retries = self.http_config.max_retries.max(1);
        let base_delay = self.http_config.retry_base_delay;
        let max_delay = self.http_config.max_retry_delay;
        let idempotent = method == Method::GET || method == Method::DELETE;
        let mut last_error = AppError::Generic("No attempts made".to_string());

        for attempt in 1..=max_retries {
            let retries_left = attempt < max_retries;

            match self.request(&method, url, body).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = AppError::RateLimitExceeded;
                        if retries_left {
                            let delay = resp
                                .headers()
                                .get(reqwest::header::RETRY_AFTER)
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.parse::<u64>().ok())
                                .map(Duration::from_secs)
                                .unwrap_or_else(|| base_delay * 2_u32.pow(attempt))
                                .min(max_delay);
                            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, %url, "Rate limited by TalkBI");
                            sleep(delay).await;
                            continue;
                        }
                        return Err(last_error);
                    }

                    if status.is_server_error() && idempotent && retries_left {
                        tracing::debug!(attempt, status = status.as_u16(), %url, "TalkBI server error, retrying");
                        sleep((base_delay * attempt).min(max_delay)).await;
                        continue;
                    }

                    return Err(AppError::ClientError(format!(
                        "HTTP {} from {}",
                        status.as_u16(),
                        url
                    )));
                }
                Err(e) => {
                    last_error = if e.is_timeout() {
                        AppError::Timeout(self.http_config.timeout.as_secs())
                    } else if e.is_connect() {
                        AppError::NetworkError(format!("Connection failed: {}", e))
                    } else {
                        AppError::ClientError(e.to_string())
                    };

                    // Timeouts may have reached the server, so only idempotent calls repeat them
                    let retryable = last_error.is_retryable()
                        && (idempotent || !matches!(last_error, AppError::Timeout(_)));
                    if retryable && retries_left {
                        tracing::debug!(attempt, error = %e, %url, "TalkBI request failed, retrying");
                        sleep((base_delay * attempt).min(max_delay)).await;
                        continue;
                    }
                    return Err(last_error);
                }
            }
        }

        Err(last_error)
    }
}

// =============================================================================
// Trait Implementations: ContactSource and SubscriberDirectory
// =============================================================================

impl ContactSource for TalkbiClient {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<ContactPage, AppError> {
        self.list_subscribers(page, limit).await
    }
}

impl SubscriberDirectory for TalkbiClient {
    async fn create_subscriber(&self, payload: &SubscriberPayload) -> Result<String, AppError> {
        self.create(payload).await
    }

    async fn delete_subscriber(&self, user_ns: &str) -> Result<(), AppError> {
        self.delete(user_ns).await
    }

    async fn send_sub_flow(&self, user_ns: &str, flow_ns: &str) -> Result<(), AppError> {
        TalkbiClient::send_sub_flow(self, user_ns, flow_ns).await
    }
}
