#![allow(non_snake_case)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, warn};
use reqwest::{
    Client, StatusCode,
    header::{HeaderMap, RETRY_AFTER},
};
use serde::Deserialize;

use crate::{
    ApiToken, Cursor, FetchOutcome, FetcherRateLimit, Page, RateLimitKind, RateLimitSignal,
    Repository, RepositoryFetcher, Response, SearchRepositoriesRequest, StdResult, TransientKind,
    build_search_payload,
};

/// The GraphQL production endpoint for GitHub.
pub const GITHUB_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

const USER_AGENT: &str = concat!("github-stars-crawler/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const HEADER_RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

const HEADER_RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

#[derive(Deserialize, Debug)]
struct GraphQlResponse {
    data: Option<serde_json::Value>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize, Debug)]
struct GraphQlError {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: String,
}

impl GraphQlError {
    fn is_rate_limited(&self) -> bool {
        self.error_type.as_deref() == Some("RATE_LIMITED") || mentions_rate_limit(&self.message)
    }
}

#[derive(Deserialize, Debug)]
struct SearchQueryData {
    search: SearchResult,
    rateLimit: RateLimit,
}

#[derive(Deserialize, Debug)]
struct SearchResult {
    edges: Vec<Option<SearchEdge>>,
    pageInfo: PageInfo,
}

#[derive(Deserialize, Debug)]
struct SearchEdge {
    node: RepositoryNode,
}

#[derive(Deserialize, Debug)]
struct RepositoryNode {
    id: String,
    name: String,
    url: String,
    owner: Owner,
    stargazerCount: u32,
}

#[derive(Deserialize, Debug)]
struct Owner {
    login: String,
}

#[derive(Deserialize, Debug)]
struct PageInfo {
    endCursor: Option<String>,
    hasNextPage: bool,
}

#[derive(Deserialize, Debug)]
struct RateLimit {
    limit: i32,
    cost: i32,
    remaining: i32,
    resetAt: DateTime<Utc>,
}

impl From<RateLimit> for FetcherRateLimit {
    fn from(rate_limit: RateLimit) -> Self {
        Self {
            limit: rate_limit.limit,
            cost: rate_limit.cost,
            remaining: rate_limit.remaining,
            reset_at: rate_limit.resetAt,
        }
    }
}

impl TryFrom<SearchQueryData> for Response {
    type Error = String;

    fn try_from(data: SearchQueryData) -> Result<Self, Self::Error> {
        let next_cursor = match (data.search.pageInfo.hasNextPage, data.search.pageInfo.endCursor)
        {
            (true, Some(end_cursor)) => Some(Cursor(end_cursor)),
            (true, None) => return Err("next page announced without an end cursor".to_string()),
            (false, _) => None,
        };
        let repositories = data
            .search
            .edges
            .into_iter()
            .filter_map(|edge| {
                edge.map(|edge| {
                    Repository::new(
                        &edge.node.id,
                        &edge.node.owner.login,
                        &edge.node.name,
                        &edge.node.url,
                        edge.node.stargazerCount,
                    )
                })
            })
            .collect();

        Ok(Response::new(
            Page::new(repositories, next_cursor),
            data.rateLimit.into(),
        ))
    }
}

fn mentions_rate_limit(message: &str) -> bool {
    message.to_lowercase().contains("rate limit")
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn rate_limit_reset_from_headers(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    header_value(headers, HEADER_RATE_LIMIT_RESET)
        .and_then(|reset| reset.trim().parse::<i64>().ok())
        .and_then(|reset| DateTime::from_timestamp(reset, 0))
}

fn rate_limit_signal_from_headers(headers: &HeaderMap, body: &str) -> Option<RateLimitSignal> {
    if let Some(retry_after) =
        header_value(headers, RETRY_AFTER.as_str()).and_then(|value| value.trim().parse::<u64>().ok())
    {
        return Some(RateLimitSignal {
            kind: RateLimitKind::Secondary,
            resume_at: None,
            retry_after: Some(Duration::from_secs(retry_after)),
            message: body.to_string(),
        });
    }
    if header_value(headers, HEADER_RATE_LIMIT_REMAINING).map(str::trim) == Some("0") {
        return Some(RateLimitSignal {
            kind: RateLimitKind::Primary,
            resume_at: rate_limit_reset_from_headers(headers),
            retry_after: None,
            message: body.to_string(),
        });
    }
    if mentions_rate_limit(body) {
        let kind = if body.to_lowercase().contains("secondary") {
            RateLimitKind::Secondary
        } else {
            RateLimitKind::Primary
        };
        return Some(RateLimitSignal {
            kind,
            resume_at: rate_limit_reset_from_headers(headers),
            retry_after: None,
            message: body.to_string(),
        });
    }

    None
}

/// Classifies a raw API response into a fetch outcome.
pub fn classify_response(status: StatusCode, headers: &HeaderMap, body: &str) -> FetchOutcome {
    if status == StatusCode::UNAUTHORIZED {
        return FetchOutcome::fatal(format!("Authentication failed ({status}): {body}"));
    }
    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        if let Some(signal) = rate_limit_signal_from_headers(headers, body) {
            return FetchOutcome::RateLimited(signal);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return FetchOutcome::RateLimited(RateLimitSignal {
                kind: RateLimitKind::Secondary,
                resume_at: None,
                retry_after: None,
                message: body.to_string(),
            });
        }
        return FetchOutcome::fatal(format!("Authorization failed ({status}): {body}"));
    }
    if status.is_server_error() {
        return FetchOutcome::transient(TransientKind::Server, format!("{status}: {body}"));
    }
    if status.is_client_error() {
        return FetchOutcome::fatal(format!("Invalid request ({status}): {body}"));
    }
    if !status.is_success() {
        return FetchOutcome::transient(
            TransientKind::Server,
            format!("Unexpected status {status}: {body}"),
        );
    }

    classify_graphql_body(headers, body)
}

fn classify_graphql_body(headers: &HeaderMap, body: &str) -> FetchOutcome {
    let response = match serde_json::from_str::<GraphQlResponse>(body) {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to parse GraphQL response: {e}");
            return FetchOutcome::transient(TransientKind::MalformedResponse, e.to_string());
        }
    };
    let errors = response.errors.unwrap_or_default();
    if let Some(rate_limit_error) = errors.iter().find(|error| error.is_rate_limited()) {
        return FetchOutcome::RateLimited(RateLimitSignal {
            kind: RateLimitKind::Primary,
            resume_at: rate_limit_reset_from_headers(headers),
            retry_after: None,
            message: rate_limit_error.message.clone(),
        });
    }
    let messages = errors
        .iter()
        .map(|error| error.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    let data = match response.data {
        Some(data) if !data.is_null() => data,
        _ if !errors.is_empty() => {
            return FetchOutcome::fatal(format!("GraphQL query rejected: {messages}"));
        }
        _ => {
            return FetchOutcome::transient(
                TransientKind::MalformedResponse,
                "Response carries neither data nor errors",
            );
        }
    };
    if !errors.is_empty() {
        warn!("GraphQL response carries partial errors: {messages}");
    }

    match serde_json::from_value::<SearchQueryData>(data)
        .map_err(|e| e.to_string())
        .and_then(Response::try_from)
    {
        Ok(response) => FetchOutcome::Success(response),
        Err(e) => {
            error!("Failed to parse GraphQL search data: {e}");
            FetchOutcome::transient(TransientKind::MalformedResponse, e)
        }
    }
}

/// Fetches repository data from a GraphQL API.
pub struct GraphQlFetcher {
    client: Client,
    endpoint: String,
    api_token: ApiToken,
}

impl GraphQlFetcher {
    /// Creates a new `GraphQlFetcher` instance for the given endpoint and credential.
    pub fn try_new(endpoint: &str, api_token: ApiToken) -> StdResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_token,
        })
    }
}

#[async_trait::async_trait]
impl RepositoryFetcher for GraphQlFetcher {
    async fn fetch(&self, request: &SearchRepositoriesRequest) -> FetchOutcome {
        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_token.expose())
            .json(&build_search_payload(request))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchOutcome::transient(TransientKind::Network, e.to_string()),
        };
        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return FetchOutcome::transient(TransientKind::Network, e.to_string()),
        };

        classify_response(status, &headers, &body)
    }
}
