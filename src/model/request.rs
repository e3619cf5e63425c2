use std::fmt::Display;

use anyhow::anyhow;
use serde::Serialize;

use super::{Cursor, StdResult};

/// The maximum number of nodes the API returns for a single connection.
pub const MAX_PAGE_SIZE: u16 = 100;

/// The maximum cost, in rate limit points, a single page query may spend.
pub const MAX_QUERY_COST: u32 = 1;

/// A repository search request being made to the GitHub API
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Hash)]
pub struct SearchRepositoriesRequest {
    /// The text query.
    pub(crate) query: String,

    /// The number of repositories to return.
    pub(crate) first: u16,

    /// The cursor for pagination, `None` meaning the start of the result stream.
    pub(crate) after: Option<Cursor>,
}

impl SearchRepositoriesRequest {
    /// Creates a new `SearchRepositoriesRequest`, checking the page size fits the query cost budget.
    pub fn try_new(query: &str, first: u16, after: Option<Cursor>) -> StdResult<Self> {
        if first == 0 || first > MAX_PAGE_SIZE {
            return Err(anyhow!(
                "Page size must be between 1 and {MAX_PAGE_SIZE}, got {first}"
            ));
        }
        let request = Self {
            query: query.to_string(),
            first,
            after,
        };
        if request.estimated_cost() > MAX_QUERY_COST {
            return Err(anyhow!(
                "Estimated query cost {} exceeds the per call budget {MAX_QUERY_COST}",
                request.estimated_cost()
            ));
        }

        Ok(request)
    }

    /// Estimates the rate limit cost of the request: one point per hundred requested nodes.
    pub fn estimated_cost(&self) -> u32 {
        u32::from(self.first).div_ceil(100).max(1)
    }

    /// Builds the request for the page following `cursor`.
    pub fn next_page(&self, cursor: Cursor) -> Self {
        Self {
            query: self.query.clone(),
            first: self.first,
            after: Some(cursor),
        }
    }

    /// Retrieves the text query.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Retrieves the page size.
    pub fn first(&self) -> u16 {
        self.first
    }

    /// Retrieves the pagination cursor.
    pub fn after(&self) -> Option<&Cursor> {
        self.after.as_ref()
    }

    /// Creates a dummy `SearchRepositoriesRequest` for testing purposes.
    #[cfg(test)]
    pub(crate) fn dummy() -> Self {
        Self {
            query: "stars:>1".to_string(),
            first: 10,
            after: None,
        }
    }
}

impl Display for SearchRepositoriesRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SearchRepositoriesRequest: query={}, first={}, after={:?}",
            self.query,
            self.first,
            self.after.as_deref()
        )
    }
}
