// ESPN-backed `RemoteDataSource`.
//
// Requests go through an optional caching proxy. The proxy prepends a single
// '1' to the body when it had to call ESPN itself; only those calls count
// against the upstream rate limit. All physical calls are serialized through
// one `ThrottleGate`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::fetch::{Fetch, HttpFetcher};
use super::parse;
use super::{require_level, DataError, RemoteDataSource};
use crate::grouping::{Grouping, GroupingLevel, Player, RequestScope, ScopePart};
use crate::news::NewsItem;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "http://api.espn.com/v1/sports";

/// Minimum spacing between two calls that reached ESPN.
pub const DEFAULT_MIN_CALL_SPACING: Duration = Duration::from_millis(1000);

/// Leading body byte set by the proxy when the upstream API was used.
const UPSTREAM_MARKER: char = '1';

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EspnSettings {
    pub base_url: String,
    pub api_key: String,
    /// Prepended verbatim to every request URL. Empty means no proxy.
    pub proxy_prefix: String,
    pub min_call_spacing: Duration,
}

impl Default for EspnSettings {
    fn default() -> Self {
        EspnSettings {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            proxy_prefix: String::new(),
            min_call_spacing: DEFAULT_MIN_CALL_SPACING,
        }
    }
}

// ---------------------------------------------------------------------------
// ThrottleGate
// ---------------------------------------------------------------------------

/// Global gate in front of the network: one call at a time, and at least
/// `min_spacing` after the last call that reached the upstream API.
#[derive(Debug)]
pub struct ThrottleGate {
    min_spacing: Duration,
    last_upstream: Mutex<Option<Instant>>,
}

/// Held for the duration of one physical call.
pub struct ThrottlePermit<'a> {
    last_upstream: MutexGuard<'a, Option<Instant>>,
}

impl ThrottlePermit<'_> {
    /// Record that the call holding this permit hit the upstream API.
    pub fn mark_upstream(&mut self) {
        *self.last_upstream = Some(Instant::now());
    }
}

impl ThrottleGate {
    pub fn new(min_spacing: Duration) -> Self {
        ThrottleGate {
            min_spacing,
            last_upstream: Mutex::new(None),
        }
    }

    /// Wait for the gate. Returns once no other call is in flight and the
    /// spacing since the last upstream call has elapsed.
    pub async fn acquire(&self) -> ThrottlePermit<'_> {
        let guard = self.last_upstream.lock().await;
        if let Some(last) = *guard {
            let ready_at = last + self.min_spacing;
            if ready_at > Instant::now() {
                debug!(wait_ms = (ready_at - Instant::now()).as_millis() as u64, "throttling upstream call");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        ThrottlePermit {
            last_upstream: guard,
        }
    }
}

// ---------------------------------------------------------------------------
// EspnDataSource
// ---------------------------------------------------------------------------

pub struct EspnDataSource<F = HttpFetcher> {
    settings: EspnSettings,
    fetcher: F,
    gate: Arc<ThrottleGate>,
}

impl<F: Fetch> EspnDataSource<F> {
    /// Create a source with its own throttle gate.
    pub fn new(settings: EspnSettings, fetcher: F) -> Self {
        let gate = Arc::new(ThrottleGate::new(settings.min_call_spacing));
        Self::with_gate(settings, fetcher, gate)
    }

    /// Create a source sharing an existing throttle gate.
    pub fn with_gate(settings: EspnSettings, fetcher: F, gate: Arc<ThrottleGate>) -> Self {
        EspnDataSource {
            settings,
            fetcher,
            gate,
        }
    }

    pub fn gate(&self) -> &Arc<ThrottleGate> {
        &self.gate
    }

    /// Fetch `url` through the proxy and the throttle gate, stripping the
    /// upstream marker if present.
    async fn get_data(&self, url: &str) -> Result<String, DataError> {
        let full_url = format!("{}{}", self.settings.proxy_prefix, url);

        let mut permit = self.gate.acquire().await;
        let body = self.fetcher.fetch(&full_url).await?;

        match body.strip_prefix(UPSTREAM_MARKER) {
            Some(rest) => {
                permit.mark_upstream();
                debug!(url, "ESPN API used");
                Ok(rest.to_string())
            }
            None => Ok(body),
        }
    }

    fn endpoint(&self, segments: &[&str], resource: Option<&str>) -> String {
        let mut url = self.settings.base_url.trim_end_matches('/').to_string();
        for segment in segments.iter().chain(resource.iter()) {
            url.push('/');
            url.push_str(&segment.to_lowercase());
        }
        url.push_str("?apikey=");
        url.push_str(&self.settings.api_key);
        url
    }

    pub(crate) fn leagues_url(&self, sport: &ScopePart) -> String {
        self.endpoint(&[&sport.abbreviation], None)
    }

    pub(crate) fn teams_url(&self, sport: &ScopePart, league: &ScopePart) -> String {
        self.endpoint(&[&sport.abbreviation, &league.abbreviation], Some("teams"))
    }

    pub(crate) fn athletes_url(&self, sport: &ScopePart, league: &ScopePart) -> String {
        self.endpoint(&[&sport.abbreviation, &league.abbreviation], Some("athletes"))
    }

    /// News can't be fetched below league level, so a team's news is its
    /// league's news.
    pub(crate) fn news_url(&self, scope: &RequestScope) -> String {
        let segments: Vec<&str> = scope
            .sport
            .iter()
            .chain(scope.league.iter())
            .map(|part| part.abbreviation.as_str())
            .collect();
        self.endpoint(&segments, Some("news"))
    }
}

fn sport_of<'a>(operation: &'static str, scope: &'a RequestScope) -> Result<&'a ScopePart, DataError> {
    scope.sport.as_ref().ok_or(DataError::MissingScope {
        operation,
        level: GroupingLevel::Sport,
    })
}

fn league_of<'a>(operation: &'static str, scope: &'a RequestScope) -> Result<&'a ScopePart, DataError> {
    scope.league.as_ref().ok_or(DataError::MissingScope {
        operation,
        level: GroupingLevel::League,
    })
}

fn log_precondition<T>(result: Result<T, DataError>) -> Result<T, DataError> {
    if let Err(e @ (DataError::Precondition { .. } | DataError::MissingScope { .. })) = &result {
        error!("{e}");
    }
    result
}

#[async_trait]
impl<F: Fetch> RemoteDataSource for EspnDataSource<F> {
    async fn load_leagues(&self, sport: &RequestScope) -> Result<Vec<Grouping>, DataError> {
        const OP: &str = "loadLeagues";
        let sport_part = log_precondition(
            require_level(OP, sport, GroupingLevel::Sport).and_then(|_| sport_of(OP, sport)),
        )?;
        let body = self.get_data(&self.leagues_url(sport_part)).await?;
        parse::parse_leagues(&body).inspect_err(|e| warn!(sport = %sport.name, "{e}"))
    }

    async fn load_teams(&self, league: &RequestScope) -> Result<Vec<Grouping>, DataError> {
        const OP: &str = "loadTeams";
        let (sport_part, league_part) = log_precondition(
            require_level(OP, league, GroupingLevel::League)
                .and_then(|_| Ok((sport_of(OP, league)?, league_of(OP, league)?))),
        )?;
        let body = self.get_data(&self.teams_url(sport_part, league_part)).await?;
        parse::parse_teams(&body).inspect_err(|e| warn!(league = %league.name, "{e}"))
    }

    async fn load_players(&self, team: &RequestScope) -> Result<Vec<Player>, DataError> {
        const OP: &str = "loadPlayers";
        let (sport_part, league_part) =
            log_precondition(sport_of(OP, team).and_then(|s| Ok((s, league_of(OP, team)?))))?;
        let body = self.get_data(&self.athletes_url(sport_part, league_part)).await?;
        parse::parse_athletes(&body, team.node).inspect_err(|e| warn!(team = %team.name, "{e}"))
    }

    async fn load_news(&self, scope: &RequestScope) -> Result<Vec<NewsItem>, DataError> {
        let body = self.get_data(&self.news_url(scope)).await?;
        parse::parse_headlines(&body).inspect_err(|e| warn!(node = %scope.name, "{e}"))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::GroupingTree;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Replays canned bodies and records every URL it was asked for.
    struct ScriptedFetch {
        bodies: StdMutex<Vec<Result<String, DataError>>>,
        urls: StdMutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetch {
        fn new(bodies: Vec<Result<String, DataError>>) -> Self {
            ScriptedFetch {
                bodies: StdMutex::new(bodies),
                urls: StdMutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetch for ScriptedFetch {
        async fn fetch(&self, url: &str) -> Result<String, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_string());
            let mut bodies = self.bodies.lock().unwrap();
            if bodies.is_empty() {
                return Err(DataError::Transport("no scripted body".into()));
            }
            bodies.remove(0)
        }
    }

    fn settings() -> EspnSettings {
        EspnSettings {
            base_url: "http://api.espn.com/v1/sports".into(),
            api_key: "KEY".into(),
            proxy_prefix: "http://proxy/restcache.php?url=".into(),
            min_call_spacing: Duration::from_millis(1000),
        }
    }

    fn tree() -> (GroupingTree, crate::grouping::NodeId, crate::grouping::NodeId, crate::grouping::NodeId) {
        let mut tree = GroupingTree::new();
        let root = tree.root();
        let sport = tree.add(root, Grouping::sport("Baseball", "Baseball")).unwrap();
        let league = tree.add(sport, Grouping::league("Major League Baseball", "MLB")).unwrap();
        let team = tree.add(league, Grouping::team("Blue Jays", "TOR", "Toronto")).unwrap();
        (tree, sport, league, team)
    }

    const LEAGUES: &str = r#"{"sports":[{"leagues":[{"name":"AL","abbreviation":"AL"},{"name":"NL","abbreviation":"NL"}]}]}"#;

    #[test]
    fn urls_are_lowercased_and_scoped() {
        let (tree, sport, league, team) = tree();
        let source = EspnDataSource::new(settings(), ScriptedFetch::new(vec![]));

        let sport_scope = tree.scope(sport);
        assert_eq!(
            source.leagues_url(sport_scope.sport.as_ref().unwrap()),
            "http://api.espn.com/v1/sports/baseball?apikey=KEY"
        );

        let league_scope = tree.scope(league);
        assert_eq!(
            source.teams_url(
                league_scope.sport.as_ref().unwrap(),
                league_scope.league.as_ref().unwrap()
            ),
            "http://api.espn.com/v1/sports/baseball/mlb/teams?apikey=KEY"
        );

        assert_eq!(
            source.news_url(&tree.scope(team)),
            "http://api.espn.com/v1/sports/baseball/mlb/news?apikey=KEY"
        );
        assert_eq!(
            source.news_url(&tree.scope(tree.root())),
            "http://api.espn.com/v1/sports/news?apikey=KEY"
        );
    }

    #[tokio::test]
    async fn load_leagues_goes_through_proxy_and_strips_marker() {
        let (tree, sport, _, _) = tree();
        let fetch = ScriptedFetch::new(vec![Ok(format!("1{LEAGUES}"))]);
        let source = EspnDataSource::new(settings(), fetch);

        let leagues = source.load_leagues(&tree.scope(sport)).await.unwrap();
        assert_eq!(leagues.len(), 2);
        assert_eq!(leagues[0].name, "AL");
        assert_eq!(
            source.fetcher.urls(),
            vec!["http://proxy/restcache.php?url=http://api.espn.com/v1/sports/baseball?apikey=KEY"]
        );
    }

    #[tokio::test]
    async fn wrong_level_fails_without_network_call() {
        let (tree, _, league, team) = tree();
        let source = EspnDataSource::new(settings(), ScriptedFetch::new(vec![]));

        let err = source.load_leagues(&tree.scope(league)).await.unwrap_err();
        assert!(matches!(
            err,
            DataError::Precondition {
                expected: GroupingLevel::Sport,
                actual: GroupingLevel::League,
                ..
            }
        ));
        assert!(source.load_teams(&tree.scope(team)).await.is_err());
        assert_eq!(source.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn players_need_league_ancestry() {
        let (tree, sport, _, team) = tree();
        let athletes = r#"{"sports":[{"leagues":[{"athletes":[{"displayName":"Jose Bautista"}]}]}]}"#;
        let source = EspnDataSource::new(settings(), ScriptedFetch::new(vec![Ok(athletes.into())]));

        let err = source.load_players(&tree.scope(sport)).await.unwrap_err();
        assert!(matches!(err, DataError::MissingScope { level: GroupingLevel::League, .. }));

        let players = source.load_players(&tree.scope(team)).await.unwrap();
        assert_eq!(players[0].team, team);
        assert!(source.fetcher.urls()[0].ends_with("/baseball/mlb/athletes?apikey=KEY"));
    }

    #[tokio::test]
    async fn transport_and_parse_failures_surface_as_errors() {
        let (tree, sport, _, _) = tree();
        let source = EspnDataSource::new(
            settings(),
            ScriptedFetch::new(vec![
                Err(DataError::Transport("connection reset".into())),
                Ok("<html>oops</html>".into()),
            ]),
        );
        let scope = tree.scope(sport);
        assert!(matches!(source.load_leagues(&scope).await, Err(DataError::Transport(_))));
        assert!(matches!(source.load_leagues(&scope).await, Err(DataError::Malformed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_calls_are_spaced_out() {
        let (tree, sport, _, _) = tree();
        let fetch = ScriptedFetch::new(vec![
            Ok(format!("1{LEAGUES}")),
            Ok(format!("1{LEAGUES}")),
        ]);
        let source = EspnDataSource::new(settings(), fetch);
        let scope = tree.scope(sport);

        let start = Instant::now();
        source.load_leagues(&scope).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(10));

        source.load_leagues(&scope).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn cached_proxy_responses_do_not_throttle() {
        let (tree, sport, _, _) = tree();
        let fetch = ScriptedFetch::new(vec![
            Ok(LEAGUES.to_string()),
            Ok(LEAGUES.to_string()),
        ]);
        let source = EspnDataSource::new(settings(), fetch);
        let scope = tree.scope(sport);

        let start = Instant::now();
        source.load_leagues(&scope).await.unwrap();
        source.load_leagues(&scope).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}
