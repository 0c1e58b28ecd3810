// Memoizing front for a `RemoteDataSource`.
//
// Results are cached under a composite key built from the operation and the
// names of the scope's sport, league and team. A hit hands back the very same
// `Arc` that was cached; a miss delegates, caches successes, and turns every
// failure into `None` without caching it. There is no expiry and no
// single-flight guard: two concurrent misses on one key both reach the source.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::grouping::{Grouping, GroupingLevel, Player, RequestScope};
use crate::news::NewsItem;
use crate::source::{DataError, RemoteDataSource};

pub const DEFAULT_CACHE_CAPACITY: usize = 200;

// ---------------------------------------------------------------------------
// Cache keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    LoadLeagues,
    LoadTeams,
    LoadPlayers,
    LoadNews,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::LoadLeagues => "loadLeagues",
            Operation::LoadTeams => "loadTeams",
            Operation::LoadPlayers => "loadPlayers",
            Operation::LoadNews => "loadNews",
        }
    }
}

/// `operation|sport|league|team`, leaving out the parts the scope lacks.
///
/// News is keyed without the team because team news is league news.
/// Names are compared case-sensitively.
pub fn composite_key(op: Operation, scope: &RequestScope) -> String {
    let mut key = op.as_str().to_string();
    let parts = scope
        .sport
        .iter()
        .chain(scope.league.iter())
        .map(|part| part.name.as_str());
    for name in parts {
        key.push('|');
        key.push_str(name);
    }
    if op != Operation::LoadNews && scope.level == GroupingLevel::Team {
        key.push('|');
        key.push_str(&scope.name);
    }
    key
}

// ---------------------------------------------------------------------------
// LruCache
// ---------------------------------------------------------------------------

/// Capacity-bounded map evicting the least recently used entry.
///
/// Recency is a monotonically increasing tick; `order` maps ticks back to
/// keys so the oldest entry is always the first one.
#[derive(Debug)]
pub struct LruCache<V> {
    capacity: usize,
    tick: u64,
    entries: HashMap<String, (V, u64)>,
    order: BTreeMap<u64, String>,
}

impl<V: Clone> LruCache<V> {
    pub fn new(capacity: usize) -> Self {
        LruCache {
            capacity: capacity.max(1),
            tick: 0,
            entries: HashMap::new(),
            order: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up `key`, marking it as most recently used.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let tick = self.next_tick();
        let (value, last_used) = self.entries.get_mut(key)?;
        self.order.remove(&*last_used);
        *last_used = tick;
        self.order.insert(tick, key.to_string());
        Some(value.clone())
    }

    /// Insert or replace `key`. Returns the key evicted to make room, if any.
    pub fn put(&mut self, key: String, value: V) -> Option<String> {
        let tick = self.next_tick();
        if let Some((_, old_tick)) = self.entries.remove(&key) {
            self.order.remove(&old_tick);
        }

        let mut evicted = None;
        if self.entries.len() >= self.capacity {
            if let Some((_, oldest)) = self.order.pop_first() {
                self.entries.remove(&oldest);
                evicted = Some(oldest);
            }
        }

        self.order.insert(tick, key.clone());
        self.entries.insert(key, (value, tick));
        evicted
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

// ---------------------------------------------------------------------------
// Cached values
// ---------------------------------------------------------------------------

/// One cache holds every operation's results.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Groupings(Arc<Vec<Grouping>>),
    Players(Arc<Vec<Player>>),
    News(Arc<Vec<NewsItem>>),
}

trait CacheSlot: Sized {
    fn into_cached(value: Arc<Vec<Self>>) -> CachedValue;
    fn from_cached(value: CachedValue) -> Option<Arc<Vec<Self>>>;
}

impl CacheSlot for Grouping {
    fn into_cached(value: Arc<Vec<Self>>) -> CachedValue {
        CachedValue::Groupings(value)
    }

    fn from_cached(value: CachedValue) -> Option<Arc<Vec<Self>>> {
        match value {
            CachedValue::Groupings(v) => Some(v),
            _ => None,
        }
    }
}

impl CacheSlot for Player {
    fn into_cached(value: Arc<Vec<Self>>) -> CachedValue {
        CachedValue::Players(value)
    }

    fn from_cached(value: CachedValue) -> Option<Arc<Vec<Self>>> {
        match value {
            CachedValue::Players(v) => Some(v),
            _ => None,
        }
    }
}

impl CacheSlot for NewsItem {
    fn into_cached(value: Arc<Vec<Self>>) -> CachedValue {
        CachedValue::News(value)
    }

    fn from_cached(value: CachedValue) -> Option<Arc<Vec<Self>>> {
        match value {
            CachedValue::News(v) => Some(v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// DataLoader
// ---------------------------------------------------------------------------

pub struct DataLoader {
    source: Arc<dyn RemoteDataSource>,
    cache: Mutex<LruCache<CachedValue>>,
}

impl DataLoader {
    pub fn new(source: Arc<dyn RemoteDataSource>) -> Self {
        Self::with_capacity(source, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(source: Arc<dyn RemoteDataSource>, capacity: usize) -> Self {
        DataLoader {
            source,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn load_leagues(&self, sport: &RequestScope) -> Option<Arc<Vec<Grouping>>> {
        let key = composite_key(Operation::LoadLeagues, sport);
        self.load(key, self.source.load_leagues(sport)).await
    }

    pub async fn load_teams(&self, league: &RequestScope) -> Option<Arc<Vec<Grouping>>> {
        let key = composite_key(Operation::LoadTeams, league);
        self.load(key, self.source.load_teams(league)).await
    }

    pub async fn load_players(&self, team: &RequestScope) -> Option<Arc<Vec<Player>>> {
        let key = composite_key(Operation::LoadPlayers, team);
        self.load(key, self.source.load_players(team)).await
    }

    pub async fn load_news(&self, scope: &RequestScope) -> Option<Arc<Vec<NewsItem>>> {
        let key = composite_key(Operation::LoadNews, scope);
        self.load(key, self.source.load_news(scope)).await
    }

    pub fn cached_len(&self) -> usize {
        self.lock_cache().len()
    }

    /// Shared hit/miss path. `fetch` is only polled on a miss; the cache lock
    /// is never held across it.
    async fn load<T, Fut>(&self, key: String, fetch: Fut) -> Option<Arc<Vec<T>>>
    where
        T: CacheSlot,
        Fut: std::future::Future<Output = Result<Vec<T>, DataError>>,
    {
        let hit = self.lock_cache().get(&key).and_then(T::from_cached);
        if let Some(value) = hit {
            debug!(%key, "cache hit");
            return Some(value);
        }

        debug!(%key, "cache miss");
        match fetch.await {
            Ok(items) => {
                let value = Arc::new(items);
                let evicted = self.lock_cache().put(key, T::into_cached(Arc::clone(&value)));
                if let Some(old) = evicted {
                    debug!(key = %old, "evicted from cache");
                }
                Some(value)
            }
            Err(e) => {
                warn!(%key, "load failed: {e}");
                None
            }
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, LruCache<CachedValue>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
