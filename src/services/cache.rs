//! Layered in-memory TTL caches.
//!
//! Four independently keyed namespaces back the aggregation engine: full
//! query results, author lists, per-pull-request comment flags, and
//! per-pull-request reviewer sets. Each namespace has a fixed capacity and a
//! shared five-minute TTL. The service is constructed once at startup and
//! injected wherever caching is needed; there is no global cache state.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::models::{CommentFlags, PrListResponse, ReviewerSets};

/// Time-to-live applied to every namespace.
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Maximum entries in the full-query cache.
const LIST_QUERY_CAPACITY: usize = 256;

/// Maximum entries in the author-list cache.
const AUTHOR_LIST_CAPACITY: usize = 64;

/// Maximum entries in each per-pull-request cache.
const PER_ITEM_CAPACITY: usize = 4096;

/// Cache key for a full dashboard query:
/// (since, until, repo, author, status, show_ignored).
pub type ListQueryKey = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
);

/// Cache key for a date window: (since, until).
pub type WindowKey = (String, String);

/// Cache key for per-pull-request lookups: (repo, number).
pub type ItemKey = (String, u64);

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    last_access: Instant,
}

/// A bounded key-value store whose entries expire after a fixed duration.
///
/// Expired entries are evicted lazily: a lookup that finds one removes it,
/// and an insert at capacity purges all expired entries before falling back
/// to evicting the least-recently-used live entry.
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    ttl: Duration,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    /// Create a cache with the given capacity and time-to-live.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity,
        }
    }

    /// Look up a live entry, refreshing its recency.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(entry) if now.duration_since(entry.inserted_at) < self.ttl => {
                entry.last_access = now;
                Some(entry.value.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a value, evicting as needed to stay within capacity.
    pub fn insert(&mut self, key: K, value: V) {
        let now = Instant::now();

        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.entries
                .retain(|_, entry| now.duration_since(entry.inserted_at) < self.ttl);
        }
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                last_access: now,
            },
        );
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The four cache namespaces used by the aggregation engine.
///
/// Mutations go through a mutex per namespace, so concurrent enrichment
/// tasks never tear an entry. A reader racing `clear_all` may still complete
/// with the value it already cloned out.
pub struct CacheService {
    list_queries: Mutex<TtlCache<ListQueryKey, PrListResponse>>,
    author_lists: Mutex<TtlCache<WindowKey, Vec<String>>>,
    comment_flags: Mutex<TtlCache<ItemKey, CommentFlags>>,
    reviewer_sets: Mutex<TtlCache<ItemKey, ReviewerSets>>,
}

impl CacheService {
    /// Create the four namespaces at their configured capacities.
    pub fn new() -> Self {
        Self {
            list_queries: Mutex::new(TtlCache::new(LIST_QUERY_CAPACITY, CACHE_TTL)),
            author_lists: Mutex::new(TtlCache::new(AUTHOR_LIST_CAPACITY, CACHE_TTL)),
            comment_flags: Mutex::new(TtlCache::new(PER_ITEM_CAPACITY, CACHE_TTL)),
            reviewer_sets: Mutex::new(TtlCache::new(PER_ITEM_CAPACITY, CACHE_TTL)),
        }
    }

    /// Look up a cached full-query result.
    pub async fn get_list_query(&self, key: &ListQueryKey) -> Option<PrListResponse> {
        self.list_queries.lock().await.get(key)
    }

    /// Store a full-query result.
    pub async fn put_list_query(&self, key: ListQueryKey, value: PrListResponse) {
        self.list_queries.lock().await.insert(key, value);
    }

    /// Look up a cached author list.
    pub async fn get_author_list(&self, key: &WindowKey) -> Option<Vec<String>> {
        self.author_lists.lock().await.get(key)
    }

    /// Store an author list.
    pub async fn put_author_list(&self, key: WindowKey, value: Vec<String>) {
        self.author_lists.lock().await.insert(key, value);
    }

    /// Look up cached comment flags for a pull request.
    pub async fn get_comment_flags(&self, key: &ItemKey) -> Option<CommentFlags> {
        self.comment_flags.lock().await.get(key)
    }

    /// Store comment flags for a pull request.
    pub async fn put_comment_flags(&self, key: ItemKey, value: CommentFlags) {
        self.comment_flags.lock().await.insert(key, value);
    }

    /// Look up cached reviewer sets for a pull request.
    pub async fn get_reviewer_sets(&self, key: &ItemKey) -> Option<ReviewerSets> {
        self.reviewer_sets.lock().await.get(key)
    }

    /// Store reviewer sets for a pull request.
    pub async fn put_reviewer_sets(&self, key: ItemKey, value: ReviewerSets) {
        self.reviewer_sets.lock().await.insert(key, value);
    }

    /// Empty all four namespaces.
    pub async fn clear_all(&self) {
        self.list_queries.lock().await.clear();
        self.author_lists.lock().await.clear();
        self.comment_flags.lock().await.clear();
        self.reviewer_sets.lock().await.clear();
    }
}

impl Default for CacheService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_inserted_value() {
        let mut cache: TtlCache<&str, u32> = TtlCache::new(4, Duration::from_secs(60));
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let mut cache: TtlCache<&str, u32> = TtlCache::new(4, Duration::from_millis(10));
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let mut cache: TtlCache<&str, u32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b", 2);
        std::thread::sleep(Duration::from_millis(2));

        // Touch "a" so "b" becomes the least recently used.
        assert_eq!(cache.get(&"a"), Some(1));
        std::thread::sleep(Duration::from_millis(2));

        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_insert_at_capacity_purges_expired_first() {
        let mut cache: TtlCache<&str, u32> = TtlCache::new(2, Duration::from_millis(10));
        cache.insert("a", 1);
        cache.insert("b", 2);
        std::thread::sleep(Duration::from_millis(25));

        cache.insert("c", 3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let mut cache: TtlCache<&str, u32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[tokio::test]
    async fn test_clear_all_empties_every_namespace() {
        let service = CacheService::new();
        let item_key = ("org/repo".to_string(), 7);

        service
            .put_comment_flags(item_key.clone(), CommentFlags::default())
            .await;
        service
            .put_reviewer_sets(item_key.clone(), ReviewerSets::default())
            .await;
        service
            .put_author_list(
                ("2024-01-01".to_string(), "2024-01-07".to_string()),
                vec!["alice".to_string()],
            )
            .await;

        service.clear_all().await;

        assert_eq!(service.get_comment_flags(&item_key).await, None);
        assert_eq!(service.get_reviewer_sets(&item_key).await, None);
        assert_eq!(
            service
                .get_author_list(&("2024-01-01".to_string(), "2024-01-07".to_string()))
                .await,
            None
        );
    }
}
