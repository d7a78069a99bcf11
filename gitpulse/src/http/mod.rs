//! HTTP API.
//!
//! One route: `GET /bestcontributors/{language}`. Query parameters `count`
//! and `projectsCount` are optional; values outside `1..=99` (or values
//! that are not numbers) silently fall back to the defaults, so the
//! endpoint stays forgiving to hand-typed URLs.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::Error;
use crate::model::ContributorStats;
use crate::service::Service;

const DEFAULT_COUNT: usize = 10;
const DEFAULT_PROJECTS_COUNT: usize = 5;

/// What the HTTP layer needs from the application service.
#[async_trait]
pub trait ContributorsService: Send + Sync {
    async fn most_active_contributors(
        &self,
        cancel: &CancellationToken,
        language: &str,
        projects_count: usize,
        count: usize,
    ) -> Result<Vec<ContributorStats>, Error>;
}

#[async_trait]
impl ContributorsService for Service {
    async fn most_active_contributors(
        &self,
        cancel: &CancellationToken,
        language: &str,
        projects_count: usize,
        count: usize,
    ) -> Result<Vec<ContributorStats>, Error> {
        Service::most_active_contributors(self, cancel, language, projects_count, count).await
    }
}

#[derive(Clone)]
struct AppState {
    service: Arc<dyn ContributorsService>,
}

/// Builds the application router.
pub fn router(service: Arc<dyn ContributorsService>) -> Router {
    Router::new()
        .route("/bestcontributors/{language}", get(contributors))
        .with_state(AppState { service })
}

#[derive(Debug, Deserialize)]
struct ContributorsParams {
    count: Option<String>,
    #[serde(rename = "projectsCount")]
    projects_count: Option<String>,
}

#[derive(Debug, Serialize)]
struct ContributorsResponse {
    language: String,
    contributors: Vec<ContributorEntry>,
}

#[derive(Debug, Serialize)]
struct ContributorEntry {
    name: String,
    commits: u64,
}

impl ContributorsResponse {
    fn new(language: String, stats: Vec<ContributorStats>) -> Self {
        Self {
            language,
            contributors: stats
                .into_iter()
                .map(|stat| ContributorEntry {
                    name: stat.contributor.login,
                    commits: stat.commits,
                })
                .collect(),
        }
    }
}

async fn contributors(
    State(state): State<AppState>,
    Path(language): Path<String>,
    Query(params): Query<ContributorsParams>,
) -> Response {
    let count = int_param(params.count.as_deref(), DEFAULT_COUNT);
    let projects_count = int_param(params.projects_count.as_deref(), DEFAULT_PROJECTS_COUNT);

    let cancel = CancellationToken::new();
    match state
        .service
        .most_active_contributors(&cancel, &language, projects_count, count)
        .await
    {
        Ok(stats) => Json(ContributorsResponse::new(language, stats)).into_response(),
        Err(e) => error_response(e),
    }
}

fn int_param(value: Option<&str>, default: usize) -> usize {
    value
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|&v| v > 0 && v < 100)
        .unwrap_or(default)
}

fn error_response(err: Error) -> Response {
    match err {
        Error::InvalidRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
        Error::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS.into_response(),
        Error::ScheduledForLater(_) => StatusCode::ACCEPTED.into_response(),
        other => {
            error!(error = %other, "contributors handler failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Contributor;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Service stand-in recording the parameters it was called with.
    struct MockService {
        result: Mutex<Option<Result<Vec<ContributorStats>, Error>>>,
        seen: Mutex<Option<(String, usize, usize)>>,
    }

    impl MockService {
        fn new(result: Result<Vec<ContributorStats>, Error>) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(result)),
                seen: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl ContributorsService for MockService {
        async fn most_active_contributors(
            &self,
            _cancel: &CancellationToken,
            language: &str,
            projects_count: usize,
            count: usize,
        ) -> Result<Vec<ContributorStats>, Error> {
            *self.seen.lock().unwrap() = Some((language.to_string(), projects_count, count));
            self.result
                .lock()
                .unwrap()
                .take()
                .expect("service called more than once")
        }
    }

    async fn call(service: Arc<MockService>, uri: &str) -> (StatusCode, Vec<u8>) {
        let app = router(service);
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    fn sample_stats() -> Vec<ContributorStats> {
        vec![ContributorStats {
            contributor: Contributor {
                id: 1,
                login: "octocat".to_string(),
            },
            commits: 42,
        }]
    }

    #[tokio::test]
    async fn success_returns_json_contributors() {
        let service = MockService::new(Ok(sample_stats()));
        let (status, body) = call(Arc::clone(&service), "/bestcontributors/go").await;

        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["language"], "go");
        assert_eq!(body["contributors"][0]["name"], "octocat");
        assert_eq!(body["contributors"][0]["commits"], 42);
    }

    #[tokio::test]
    async fn query_params_are_forwarded() {
        let service = MockService::new(Ok(vec![]));
        call(
            Arc::clone(&service),
            "/bestcontributors/rust?count=7&projectsCount=3",
        )
        .await;

        let seen = service.seen.lock().unwrap().clone();
        assert_eq!(seen, Some(("rust".to_string(), 3, 7)));
    }

    #[tokio::test]
    async fn out_of_range_params_fall_back_to_defaults() {
        let service = MockService::new(Ok(vec![]));
        call(
            Arc::clone(&service),
            "/bestcontributors/go?count=100&projectsCount=abc",
        )
        .await;

        let seen = service.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            Some(("go".to_string(), DEFAULT_PROJECTS_COUNT, DEFAULT_COUNT))
        );
    }

    #[tokio::test]
    async fn invalid_request_maps_to_400_with_message() {
        let service = MockService::new(Err(Error::InvalidRequest("bad language".to_string())));
        let (status, body) = call(service, "/bestcontributors/go").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, b"bad language");
    }

    #[tokio::test]
    async fn too_many_requests_maps_to_429() {
        let service = MockService::new(Err(Error::TooManyRequests("later".to_string())));
        let (status, _) = call(service, "/bestcontributors/go").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn scheduled_for_later_maps_to_202() {
        let service = MockService::new(Err(Error::ScheduledForLater("scheduled".to_string())));
        let (status, _) = call(service, "/bestcontributors/go").await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn other_errors_map_to_500() {
        let service = MockService::new(Err(Error::Internal("db on fire".to_string())));
        let (status, body) = call(service, "/bestcontributors/go").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        // Internals never leak to the caller.
        assert!(body.is_empty());
    }
}
