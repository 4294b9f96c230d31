use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension, params};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{Endpoint, SportsApi};
use crate::error::{RemoteError, StoreError};

const CACHE_VERSION: i64 = 1;
pub const CACHE_DIR: &str = "superliga_sync";
pub const CACHE_FILE: &str = "apicache.sqlite";

const CACHE_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS response_cache (
    key TEXT PRIMARY KEY,
    outcome TEXT NOT NULL
);";

/// What the cache remembers. One policy per cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Only successful results are stored; failures are retried next time.
    #[default]
    SuccessOnly,
    /// Failures are stored too and replayed until the cache file is cleared.
    Everything,
}

/// Canonical identity of a memoized call: call name plus its arguments.
pub trait CacheKey {
    fn cache_key(&self) -> String;
}

impl CacheKey for Endpoint {
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum CachedOutcome<V> {
    Ok { value: V },
    Failed { status: Option<u16>, message: String },
}

/// Durable key/value memo backed by one sqlite row per key. Entries never
/// expire and are never evicted.
pub struct DiskCache<V> {
    path: Option<PathBuf>,
    policy: CachePolicy,
    conn: Mutex<Connection>,
    _value: PhantomData<fn() -> V>,
}

impl<V> DiskCache<V>
where
    V: Serialize + DeserializeOwned,
{
    pub fn open(path: impl Into<PathBuf>, policy: CachePolicy) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).ok();
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        let cache = Self::from_connection(conn, Some(path), policy)?;
        if let Some(path) = cache.path.as_deref() {
            debug!(path = %path.display(), entries = cache.len()?, "opened response cache");
        }
        Ok(cache)
    }

    /// A cache that lives only as long as the process.
    pub fn in_memory(policy: CachePolicy) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, None, policy)
    }

    fn from_connection(
        conn: Connection,
        path: Option<PathBuf>,
        policy: CachePolicy,
    ) -> Result<Self, StoreError> {
        prepare_cache_db(&conn)?;
        Ok(Self {
            path,
            policy,
            conn: Mutex::new(conn),
            _value: PhantomData,
        })
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let n = self
            .lock()
            .query_row("SELECT COUNT(*) FROM response_cache", [], |row| row.get::<_, i64>(0))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    pub fn contains<K: CacheKey + ?Sized>(&self, key: &K) -> Result<bool, StoreError> {
        let found = self
            .lock()
            .query_row(
                "SELECT 1 FROM response_cache WHERE key = ?1",
                params![key.cache_key()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Returns the stored outcome for `key`, or runs `fetch` and stores its
    /// outcome according to the cache policy. A cache that cannot be read
    /// or written degrades to a pass-through.
    pub fn get_or_fetch<K, F>(&self, key: &K, fetch: F) -> Result<V, RemoteError>
    where
        K: CacheKey + ?Sized,
        F: FnOnce() -> Result<V, RemoteError>,
    {
        let key = key.cache_key();
        match self.lookup(&key) {
            Ok(Some(CachedOutcome::Ok { value })) => {
                debug!(%key, "response cache hit");
                return Ok(value);
            }
            Ok(Some(CachedOutcome::Failed { status, message })) => {
                debug!(%key, "response cache hit (recorded failure)");
                return Err(RemoteError::Cached {
                    call: key,
                    status,
                    message,
                });
            }
            Ok(None) => {}
            Err(err) => warn!(%key, error = %err, "response cache read failed"),
        }

        let result = fetch();
        match &result {
            Ok(value) => self.insert(&key, &CachedOutcome::<&V>::Ok { value }),
            Err(err) if self.policy == CachePolicy::Everything => self.insert(
                &key,
                &CachedOutcome::<&V>::Failed {
                    status: err.status(),
                    message: err.to_string(),
                },
            ),
            Err(_) => {}
        }
        result
    }

    fn lookup(&self, key: &str) -> Result<Option<CachedOutcome<V>>, StoreError> {
        let raw = self
            .lock()
            .query_row(
                "SELECT outcome FROM response_cache WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str::<CachedOutcome<V>>(&raw) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(err) => {
                warn!(%key, error = %err, "ignoring unreadable cache entry");
                Ok(None)
            }
        }
    }

    fn insert(&self, key: &str, outcome: &CachedOutcome<&V>) {
        let raw = match serde_json::to_string(outcome) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%key, error = %err, "failed to serialize cache entry");
                return;
            }
        };
        if let Err(err) = self.lock().execute(
            "INSERT OR REPLACE INTO response_cache(key, outcome) VALUES (?1, ?2)",
            params![key, raw],
        ) {
            warn!(%key, error = %err, "failed to persist cache entry");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Memoizing wrapper around any [`SportsApi`].
pub struct CachedApi<A> {
    inner: A,
    cache: DiskCache<Value>,
}

impl<A: SportsApi> CachedApi<A> {
    pub fn new(inner: A, cache: DiskCache<Value>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &DiskCache<Value> {
        &self.cache
    }

    pub fn into_inner(self) -> A {
        self.inner
    }
}

impl<A: SportsApi> SportsApi for CachedApi<A> {
    fn fetch(&self, endpoint: &Endpoint) -> Result<Value, RemoteError> {
        self.cache
            .get_or_fetch(endpoint, || self.inner.fetch(endpoint))
    }
}

/// Entries written under another cache version are dropped.
fn prepare_cache_db(conn: &Connection) -> Result<(), StoreError> {
    let version = conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))?;
    if version != CACHE_VERSION {
        if version != 0 {
            warn!(found = version, expected = CACHE_VERSION, "discarding stale response cache");
        }
        conn.execute_batch("DROP TABLE IF EXISTS response_cache;")?;
        conn.execute_batch(&format!("PRAGMA user_version = {CACHE_VERSION};"))?;
    }
    conn.execute_batch(CACHE_SCHEMA)?;
    Ok(())
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn default_cache_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(CACHE_FILE))
}
