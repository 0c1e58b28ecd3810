// Remote data access contract.
//
// A `RemoteDataSource` turns a `RequestScope` into freshly constructed,
// unattached entities. Callers attach results to the tree themselves and rely
// on the `DataLoader` for memoization.

pub mod espn;
pub mod fetch;
pub mod parse;

use async_trait::async_trait;
use thiserror::Error;

use crate::grouping::{Grouping, GroupingLevel, Player, RequestScope};
use crate::news::NewsItem;

pub use espn::{EspnDataSource, EspnSettings, ThrottleGate};
pub use fetch::{Fetch, HttpFetcher};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DataError {
    /// The scope passed to an operation has the wrong level. This is a caller
    /// bug; no request is made.
    #[error("{operation} requires a {expected} node, got {actual}")]
    Precondition {
        operation: &'static str,
        expected: GroupingLevel,
        actual: GroupingLevel,
    },

    /// The scope has no ancestor of a level the request URL needs.
    #[error("{operation} needs a {level} ancestor")]
    MissingScope {
        operation: &'static str,
        level: GroupingLevel,
    },

    #[error("network error: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no data: {0}")]
    NotFound(String),
}

// ---------------------------------------------------------------------------
// RemoteDataSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RemoteDataSource: Send + Sync {
    /// Leagues of a SPORT node.
    async fn load_leagues(&self, sport: &RequestScope) -> Result<Vec<Grouping>, DataError>;

    /// Teams of a LEAGUE node.
    async fn load_teams(&self, league: &RequestScope) -> Result<Vec<Grouping>, DataError>;

    /// Roster of a team-scoped node.
    async fn load_players(&self, team: &RequestScope) -> Result<Vec<Player>, DataError>;

    /// Headlines for the nearest sport/league of any node.
    async fn load_news(&self, scope: &RequestScope) -> Result<Vec<NewsItem>, DataError>;
}

/// Reject a scope whose level does not match what the operation needs.
pub(crate) fn require_level(
    operation: &'static str,
    scope: &RequestScope,
    expected: GroupingLevel,
) -> Result<(), DataError> {
    if scope.level != expected {
        return Err(DataError::Precondition {
            operation,
            expected,
            actual: scope.level,
        });
    }
    Ok(())
}
