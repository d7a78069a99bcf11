//! GitHub REST API client.
//!
//! Adapts the two endpoints this service needs onto the [`GithubClient`]
//! trait. Contributor statistics are computed server-side: the endpoint
//! answers 202 until the numbers are ready, so [`Client::stats_by_project`]
//! waits and retries a bounded number of times.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, Request, StatusCode, Url};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::GithubClient;
use crate::error::{Error, UpstreamError};
use crate::model::{ContributorStats, Project};
use crate::upstream::http::HttpDo;
use crate::upstream::response::{self, SearchResponse, StatsResponse};

/// Read cap for `/search/repositories` bodies.
const PROJECTS_RESPONSE_MAX_SIZE: usize = 10 * 1024 * 1024;

/// Read cap for `/stats/contributors` bodies.
const STATS_RESPONSE_MAX_SIZE: usize = 100 * 1024 * 1024;

const DEFAULT_ACCEPT_WAIT_TIME: Duration = Duration::from_secs(5);
const DEFAULT_RETRIES_ON_ACCEPTED: u32 = 7;

/// How much of an unwanted body to pull before dropping the response, so the
/// underlying connection stays reusable.
const DRAIN_LIMIT: usize = 1024;

/// GitHub REST client over an [`HttpDo`] transport.
pub struct Client<D> {
    doer: D,
    address: String,
    auth_token: Option<String>,
    accept_wait_time: Duration,
    retries_on_accepted: u32,
    projects_response_max_size: usize,
    stats_response_max_size: usize,
}

impl<D: HttpDo> Client<D> {
    /// Creates a client for the API at `address`.
    ///
    /// `auth_token` is optional; without it GitHub applies the much lower
    /// unauthenticated rate limit.
    pub fn new(doer: D, address: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            doer,
            address: address.into(),
            auth_token,
            accept_wait_time: DEFAULT_ACCEPT_WAIT_TIME,
            retries_on_accepted: DEFAULT_RETRIES_ON_ACCEPTED,
            projects_response_max_size: PROJECTS_RESPONSE_MAX_SIZE,
            stats_response_max_size: STATS_RESPONSE_MAX_SIZE,
        }
    }

    /// Sets the wait between 202 retries.
    pub fn with_accept_wait_time(mut self, wait: Duration) -> Self {
        self.accept_wait_time = wait;
        self
    }

    /// Sets the maximum number of attempts while the upstream answers 202.
    pub fn with_retries_on_accepted(mut self, retries: u32) -> Self {
        self.retries_on_accepted = retries;
        self
    }

    async fn make_request(
        &self,
        cancel: &CancellationToken,
        url: Url,
        max_bytes: usize,
    ) -> Result<(Vec<u8>, StatusCode), Error> {
        let mut request = Request::new(Method::GET, url);
        let headers = request.headers_mut();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        if let Some(token) = &self.auth_token {
            let mut value = HeaderValue::from_str(&format!("token {token}")).map_err(|e| {
                Error::InvalidRequest(format!("auth token is not a valid header value: {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut response = self.doer.execute(request, cancel).await?;
        let status = response.status();
        debug!(status = status.as_u16(), "upstream response");

        if status == StatusCode::NO_CONTENT {
            drain(response).await;
            return Ok((Vec::new(), status));
        }
        if status.as_u16() / 100 > 3 {
            let rate_limited = rate_limit_exceeded(response.headers());
            drain(response).await;
            if rate_limited {
                return Err(UpstreamError::RateLimitExceeded.into());
            }
            return Err(UpstreamError::Status(status.as_u16()).into());
        }

        let body = read_capped(&mut response, max_bytes).await?;
        Ok((body, status))
    }
}

#[async_trait]
impl<D: HttpDo> GithubClient for Client<D> {
    async fn projects_by_language(
        &self,
        cancel: &CancellationToken,
        language: &str,
        count: usize,
    ) -> Result<Vec<Project>, Error> {
        if language.is_empty() {
            return Err(Error::InvalidRequest("language cannot be empty".to_string()));
        }
        if !(1..=99).contains(&count) {
            return Err(Error::InvalidRequest(
                "count must be in range <1..99>".to_string(),
            ));
        }

        let mut url = Url::parse(&format!("{}/search/repositories", self.address))
            .map_err(|e| Error::InvalidRequest(format!("invalid upstream url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("q", &format!("language:{language}"))
            .append_pair("sort", "stars")
            .append_pair("per_page", &count.to_string());

        let (body, status) = self
            .make_request(cancel, url, self.projects_response_max_size)
            .await?;
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        let response: SearchResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Upstream(UpstreamError::Decode(e.to_string())))?;
        Ok(response.into_projects())
    }

    async fn stats_by_project(
        &self,
        cancel: &CancellationToken,
        name: &str,
        owner: &str,
    ) -> Result<Vec<ContributorStats>, Error> {
        if name.is_empty() {
            return Err(Error::InvalidRequest(
                "project name cannot be empty".to_string(),
            ));
        }
        if owner.is_empty() {
            return Err(Error::InvalidRequest(
                "project owner login cannot be empty".to_string(),
            ));
        }

        let url = Url::parse(&format!(
            "{}/repos/{owner}/{name}/stats/contributors",
            self.address
        ))
        .map_err(|e| Error::InvalidRequest(format!("invalid upstream url: {e}")))?;

        let mut tries: u32 = 0;
        let body = loop {
            tries += 1;
            let (body, status) = self
                .make_request(cancel, url.clone(), self.stats_response_max_size)
                .await?;
            if status == StatusCode::NO_CONTENT {
                return Ok(Vec::new());
            }
            if status == StatusCode::ACCEPTED {
                if tries < self.retries_on_accepted {
                    debug!(tries, "upstream still computing stats, waiting");
                    tokio::select! {
                        biased;

                        _ = cancel.cancelled() => {
                            return Err(Error::Upstream(UpstreamError::Cancelled));
                        }

                        _ = tokio::time::sleep(self.accept_wait_time) => {}
                    }
                    continue;
                }
                return Err(Error::Upstream(UpstreamError::Retries));
            }
            break body;
        };

        let response: StatsResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Upstream(UpstreamError::Decode(e.to_string())))?;
        Ok(response::into_stats(response))
    }
}

/// True when the upstream marks its quota as exhausted.
fn rate_limit_exceeded(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok())
        .is_some_and(|remaining| remaining == 0)
}

async fn read_capped(response: &mut reqwest::Response, max_bytes: usize) -> Result<Vec<u8>, Error> {
    let mut body = Vec::new();
    loop {
        let chunk = response
            .chunk()
            .await
            .map_err(|e| Error::Upstream(UpstreamError::Transport(e.to_string())))?;
        let Some(chunk) = chunk else { break };
        if body.len() + chunk.len() > max_bytes {
            return Err(UpstreamError::BodyTooLarge { limit: max_bytes }.into());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

async fn drain(mut response: reqwest::Response) {
    let mut read = 0usize;
    while read < DRAIN_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => read += chunk.len(),
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Scripted = (u16, Vec<(&'static str, &'static str)>, Vec<u8>);

    /// Doer that replays scripted responses and records every request.
    struct ScriptedDo {
        responses: Mutex<VecDeque<Scripted>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, HeaderMap)>>,
    }

    impl ScriptedDo {
        fn new(responses: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_url(&self) -> String {
            self.seen.lock().unwrap().last().unwrap().0.clone()
        }

        fn last_headers(&self) -> HeaderMap {
            self.seen.lock().unwrap().last().unwrap().1.clone()
        }
    }

    #[async_trait]
    impl HttpDo for Arc<ScriptedDo> {
        async fn execute(
            &self,
            request: Request,
            _cancel: &CancellationToken,
        ) -> Result<reqwest::Response, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((request.url().to_string(), request.headers().clone()));

            let (status, headers, body) = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted response left");
            let mut builder = http::Response::builder().status(status);
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
            Ok(reqwest::Response::from(builder.body(body).unwrap()))
        }
    }

    const BASE: &str = "https://api.github.test";

    fn search_body() -> Vec<u8> {
        br#"{"items": [{"id": 1, "name": "alpha", "owner": {"login": "a"}}]}"#.to_vec()
    }

    fn stats_body() -> Vec<u8> {
        br#"[{"total": 4, "author": {"id": 9, "login": "z"}}]"#.to_vec()
    }

    #[tokio::test]
    async fn projects_rejects_empty_language() {
        let doer = ScriptedDo::new(vec![]);
        let client = Client::new(Arc::clone(&doer), BASE, None);

        let result = client
            .projects_by_language(&CancellationToken::new(), "", 5)
            .await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
        assert_eq!(doer.calls(), 0);
    }

    #[tokio::test]
    async fn projects_count_boundaries() {
        for (count, ok) in [(0, false), (1, true), (99, true), (100, false)] {
            let doer = ScriptedDo::new(vec![(200, vec![], search_body())]);
            let client = Client::new(Arc::clone(&doer), BASE, None);

            let result = client
                .projects_by_language(&CancellationToken::new(), "go", count)
                .await;
            if ok {
                assert!(result.is_ok(), "count {count}");
            } else {
                assert!(
                    matches!(result, Err(Error::InvalidRequest(_))),
                    "count {count}"
                );
                assert_eq!(doer.calls(), 0);
            }
        }
    }

    #[tokio::test]
    async fn projects_builds_search_url_and_headers() {
        let doer = ScriptedDo::new(vec![(200, vec![], search_body())]);
        let client = Client::new(Arc::clone(&doer), BASE, Some("sekret".to_string()));

        let projects = client
            .projects_by_language(&CancellationToken::new(), "go", 3)
            .await
            .unwrap();

        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "alpha");

        let url = doer.last_url();
        assert!(url.starts_with(&format!("{BASE}/search/repositories?")));
        assert!(url.contains("q=language%3Ago"));
        assert!(url.contains("sort=stars"));
        assert!(url.contains("per_page=3"));

        let headers = doer.last_headers();
        assert_eq!(
            headers.get(ACCEPT).unwrap(),
            "application/vnd.github.v3+json"
        );
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "token sekret");
    }

    #[tokio::test]
    async fn projects_no_content_yields_empty_list() {
        let doer = ScriptedDo::new(vec![(204, vec![], Vec::new())]);
        let client = Client::new(Arc::clone(&doer), BASE, None);

        let projects = client
            .projects_by_language(&CancellationToken::new(), "go", 5)
            .await
            .unwrap();
        assert!(projects.is_empty());
    }

    #[tokio::test]
    async fn projects_server_error_maps_to_status() {
        let doer = ScriptedDo::new(vec![(500, vec![], Vec::new())]);
        let client = Client::new(Arc::clone(&doer), BASE, None);

        let result = client
            .projects_by_language(&CancellationToken::new(), "go", 5)
            .await;
        assert!(matches!(
            result,
            Err(Error::Upstream(UpstreamError::Status(500)))
        ));
    }

    #[tokio::test]
    async fn exhausted_rate_limit_header_is_detected() {
        let doer = ScriptedDo::new(vec![(403, vec![("x-ratelimit-remaining", "0")], Vec::new())]);
        let client = Client::new(Arc::clone(&doer), BASE, None);

        let result = client
            .projects_by_language(&CancellationToken::new(), "go", 5)
            .await;
        assert!(matches!(
            result,
            Err(Error::Upstream(UpstreamError::RateLimitExceeded))
        ));
    }

    #[tokio::test]
    async fn remaining_quota_is_not_a_rate_limit() {
        let doer = ScriptedDo::new(vec![(403, vec![("x-ratelimit-remaining", "12")], Vec::new())]);
        let client = Client::new(Arc::clone(&doer), BASE, None);

        let result = client
            .projects_by_language(&CancellationToken::new(), "go", 5)
            .await;
        assert!(matches!(
            result,
            Err(Error::Upstream(UpstreamError::Status(403)))
        ));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let doer = ScriptedDo::new(vec![(200, vec![], vec![b' '; PROJECTS_RESPONSE_MAX_SIZE + 1])]);
        let client = Client::new(Arc::clone(&doer), BASE, None);

        let result = client
            .projects_by_language(&CancellationToken::new(), "go", 5)
            .await;
        assert!(matches!(
            result,
            Err(Error::Upstream(UpstreamError::BodyTooLarge { .. }))
        ));
    }

    #[tokio::test]
    async fn stats_rejects_empty_name_and_owner() {
        let doer = ScriptedDo::new(vec![]);
        let client = Client::new(Arc::clone(&doer), BASE, None);
        let cancel = CancellationToken::new();

        assert!(matches!(
            client.stats_by_project(&cancel, "", "owner").await,
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            client.stats_by_project(&cancel, "name", "").await,
            Err(Error::InvalidRequest(_))
        ));
        assert_eq!(doer.calls(), 0);
    }

    #[tokio::test]
    async fn stats_retries_through_accepted_then_succeeds() {
        let doer = ScriptedDo::new(vec![
            (202, vec![], Vec::new()),
            (202, vec![], Vec::new()),
            (200, vec![], stats_body()),
        ]);
        let client =
            Client::new(Arc::clone(&doer), BASE, None).with_accept_wait_time(Duration::from_millis(1));

        let stats = client
            .stats_by_project(&CancellationToken::new(), "alpha", "a")
            .await
            .unwrap();

        assert_eq!(doer.calls(), 3);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].contributor.login, "z");
        assert_eq!(doer.last_url(), format!("{BASE}/repos/a/alpha/stats/contributors"));
    }

    #[tokio::test]
    async fn stats_gives_up_after_retry_budget() {
        let retries = DEFAULT_RETRIES_ON_ACCEPTED as usize;
        let doer = ScriptedDo::new(vec![(202, vec![], Vec::new()); retries]);
        let client =
            Client::new(Arc::clone(&doer), BASE, None).with_accept_wait_time(Duration::from_millis(1));

        let result = client
            .stats_by_project(&CancellationToken::new(), "alpha", "a")
            .await;

        assert!(matches!(
            result,
            Err(Error::Upstream(UpstreamError::Retries))
        ));
        assert_eq!(doer.calls(), retries);
    }

    #[tokio::test]
    async fn stats_succeeds_on_last_allowed_attempt() {
        let mut responses = vec![(202, vec![], Vec::new()); DEFAULT_RETRIES_ON_ACCEPTED as usize - 1];
        responses.push((200, vec![], stats_body()));
        let doer = ScriptedDo::new(responses);
        let client =
            Client::new(Arc::clone(&doer), BASE, None).with_accept_wait_time(Duration::from_millis(1));

        let stats = client
            .stats_by_project(&CancellationToken::new(), "alpha", "a")
            .await
            .unwrap();

        assert_eq!(doer.calls(), DEFAULT_RETRIES_ON_ACCEPTED as usize);
        assert_eq!(stats.len(), 1);
    }

    #[tokio::test]
    async fn stats_wait_honours_cancellation() {
        let doer = ScriptedDo::new(vec![(202, vec![], Vec::new())]);
        let client = Client::new(Arc::clone(&doer), BASE, None).with_accept_wait_time(Duration::from_secs(60));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = client.stats_by_project(&cancel, "alpha", "a").await;
        assert!(matches!(
            result,
            Err(Error::Upstream(UpstreamError::Cancelled))
        ));
        assert_eq!(doer.calls(), 1);
    }

    #[tokio::test]
    async fn stats_decode_failure_is_reported() {
        let doer = ScriptedDo::new(vec![(200, vec![], b"not json".to_vec())]);
        let client = Client::new(Arc::clone(&doer), BASE, None);

        let result = client
            .stats_by_project(&CancellationToken::new(), "alpha", "a")
            .await;
        assert!(matches!(
            result,
            Err(Error::Upstream(UpstreamError::Decode(_)))
        ));
    }
}
