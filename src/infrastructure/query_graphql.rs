use serde::Serialize;

use crate::SearchRepositoriesRequest;

/// The repository search query, selecting the rate limit telemetry alongside the page.
pub const SEARCH_QUERY: &str = r#"
query ($query: String!, $first: Int!, $after: String) {
  search(query: $query, type: REPOSITORY, first: $first, after: $after) {
    edges {
      node {
        ... on Repository {
          id
          name
          url
          owner {
            login
          }
          stargazerCount
        }
      }
    }
    pageInfo {
      endCursor
      hasNextPage
    }
  }
  rateLimit {
    limit
    cost
    remaining
    resetAt
  }
}
"#;

/// The variables of the repository search query
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct GraphQlSearchVariables {
    /// The search query string.
    pub(super) query: String,
    /// The number of repositories to return.
    pub(super) first: u16,
    /// The cursor for pagination.
    pub(super) after: Option<String>,
}

impl From<&SearchRepositoriesRequest> for GraphQlSearchVariables {
    fn from(request: &SearchRepositoriesRequest) -> Self {
        Self {
            query: request.query().to_owned(),
            first: request.first(),
            after: request.after().map(|cursor| cursor.to_string()),
        }
    }
}

/// A GraphQL request body
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct GraphQlPayload {
    /// The GraphQL document.
    pub(super) query: &'static str,
    /// The document variables.
    pub(super) variables: GraphQlSearchVariables,
}

/// Builds the request body fetching the page of `request`.
pub fn build_search_payload(request: &SearchRepositoriesRequest) -> GraphQlPayload {
    GraphQlPayload {
        query: SEARCH_QUERY,
        variables: request.into(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::Cursor;

    use super::*;

    #[test]
    fn payload_for_first_page_has_null_cursor() {
        let request = SearchRepositoriesRequest::try_new("stars:>1", 100, None).unwrap();

        let payload = serde_json::to_value(build_search_payload(&request)).unwrap();

        assert_eq!(
            json!({"query": "stars:>1", "first": 100, "after": null}),
            payload["variables"]
        );
    }

    #[test]
    fn payload_for_next_page_carries_cursor() {
        let request =
            SearchRepositoriesRequest::try_new("stars:>1", 50, Some(Cursor::new("c1"))).unwrap();

        let payload = serde_json::to_value(build_search_payload(&request)).unwrap();

        assert_eq!(
            json!({"query": "stars:>1", "first": 50, "after": "c1"}),
            payload["variables"]
        );
    }

    #[test]
    fn query_requests_identity_stars_and_rate_limit() {
        for field in [
            "id",
            "name",
            "url",
            "login",
            "stargazerCount",
            "endCursor",
            "hasNextPage",
            "rateLimit",
            "resetAt",
        ] {
            assert!(SEARCH_QUERY.contains(field), "missing field {field}");
        }
    }
}
