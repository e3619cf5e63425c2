use std::{fmt::Display, ops::Deref, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The identifier assigned to a repository by GitHub, stable across crawls.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryId(pub String);

impl Deref for RepositoryId {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The name of a repository.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RepositoryName(pub String);

impl Deref for RepositoryName {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for RepositoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The login of the user or organization owning a repository.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct OwnerName(pub String);

impl Deref for OwnerName {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for OwnerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The canonical web address of a repository.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RepositoryUrl(pub String);

impl Deref for RepositoryUrl {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The number of stars a repository has.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarsCounter(pub u32);

impl Deref for StarsCounter {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for StarsCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata of a GitHub repository.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// The identifier of the repository.
    id: RepositoryId,

    /// The login of the owner of the repository.
    owner: OwnerName,

    /// The name of the repository.
    name: RepositoryName,

    /// The web address of the repository.
    url: RepositoryUrl,

    /// The number of stars the repository has.
    stars: StarsCounter,
}

impl Repository {
    /// Creates a new `Repository` instance.
    pub fn new(id: &str, owner: &str, name: &str, url: &str, stars: u32) -> Self {
        Self {
            id: RepositoryId(id.to_string()),
            owner: OwnerName(owner.to_string()),
            name: RepositoryName(name.to_string()),
            url: RepositoryUrl(url.to_string()),
            stars: StarsCounter(stars),
        }
    }

    /// Retrieves the repository identifier.
    pub fn id(&self) -> &RepositoryId {
        &self.id
    }

    /// Retrieves the owner login.
    pub fn owner(&self) -> &OwnerName {
        &self.owner
    }

    /// Retrieves the repository name.
    pub fn name(&self) -> &RepositoryName {
        &self.name
    }

    /// Retrieves the repository web address.
    pub fn url(&self) -> &RepositoryUrl {
        &self.url
    }

    /// Retrieves the total stars of the repository.
    pub fn stars(&self) -> StarsCounter {
        self.stars
    }

    /// Creates a dummy `Repository` whose owner and name derive from `id`, for testing purposes.
    #[cfg(test)]
    pub(crate) fn dummy(id: &str, full_name: &str, stars: u32) -> Self {
        let (owner, name) = full_name.split_once('/').unwrap_or(("owner", full_name));

        Self::new(
            id,
            owner,
            name,
            &format!("https://github.com/{owner}/{name}"),
            stars,
        )
    }
}

impl Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Repository: {}/{} (id={}), Stars: {}",
            self.owner, self.name, self.id, self.stars
        )
    }
}

/// An opaque pagination token issued by the API.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(pub String);

impl Cursor {
    /// Creates a new `Cursor` from its raw token.
    pub fn new(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl Deref for Cursor {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fetcher API rate limit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetcherRateLimit {
    /// The maximum number of points that can be spent in a given time period.
    pub limit: i32,
    /// The cost of the current request.
    pub cost: i32,
    /// The remaining number of points that can be spent in the current time period.
    pub remaining: i32,
    /// The time at which the rate limit will reset.
    pub reset_at: DateTime<Utc>,
}

impl FetcherRateLimit {
    /// Returns true if no call budget is left in the current window.
    pub fn is_exceeded(&self) -> bool {
        self.remaining <= 0
    }

    /// Returns true if the remaining budget cannot cover another call plus `reserve` points.
    pub fn is_nearly_exhausted(&self, reserve: i32) -> bool {
        self.remaining < self.cost.saturating_add(reserve)
    }

    /// Computes how long to wait from `now` until the budget is reset.
    pub fn duration_until_reset(&self, now: DateTime<Utc>) -> Duration {
        (self.reset_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    #[cfg(test)]
    /// Creates a dummy `FetcherRateLimit` instance for testing purposes.
    pub fn dummy() -> Self {
        Self {
            limit: 5000,
            cost: 1,
            remaining: 4999,
            reset_at: "2025-01-01T00:00:00Z".parse().unwrap(),
        }
    }
}

impl Display for FetcherRateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RateLimit: calls={}/{} (+{}), reset={}",
            self.limit - self.remaining,
            self.limit,
            self.cost,
            self.reset_at.to_rfc3339()
        )
    }
}
