use crate::memory::{batch_keys, derive_batch};
use async_trait::async_trait;
use pinhole_core::error::Result;
use pinhole_core::{BatchKey, BatchRequest, KeyDeriver, Repository, ShortCode, StorageError};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyConnection, AnyPool, Connection, Row};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

const SQLITE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS link (
    id INTEGER PRIMARY KEY,
    "key" TEXT NOT NULL,
    value TEXT NOT NULL
)"#;

const POSTGRES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS link (
    id SERIAL PRIMARY KEY,
    "key" TEXT NOT NULL,
    value TEXT NOT NULL
)"#;

// Not unique: tables written by older deployments may hold duplicate keys.
const KEY_INDEX: &str = r#"CREATE INDEX IF NOT EXISTS link_key_idx ON link ("key")"#;

const INSERT_LINK: &str = r#"
INSERT INTO link ("key", value)
SELECT $1, $2
WHERE NOT EXISTS (SELECT 1 FROM link WHERE "key" = $1)
"#;

const SELECT_LINK: &str = r#"SELECT value FROM link WHERE "key" = $1 ORDER BY id LIMIT 1"#;

// Serializes concurrent inserts of the same key across PostgreSQL sessions.
const LOCK_KEY: &str = "SELECT 1 FROM pg_advisory_xact_lock(hashtext($1))";

/// SQL dialect of the configured database, which decides the DDL variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Resolves a driver name such as `sqlite`, `sqlite3`, `postgres` or `pgx`.
    pub fn from_driver_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "pg" | "pgx" => Ok(Dialect::Postgres),
            _ => Err(StorageError::UnsupportedDriver(name.to_string())),
        }
    }

    /// Resolves the dialect from the scheme of a connection string.
    pub fn from_dsn(dsn: &str) -> Result<Self> {
        let scheme = dsn
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| StorageError::UnsupportedDriver(dsn.to_string()))?;
        Self::from_driver_name(scheme)
    }

    /// Whether `dsn` names a private in-memory SQLite database.
    fn is_in_memory(self, dsn: &str) -> bool {
        self == Dialect::Sqlite && (dsn.contains(":memory:") || dsn.contains("mode=memory"))
    }

    fn schema(self) -> &'static str {
        match self {
            Dialect::Sqlite => SQLITE_SCHEMA,
            Dialect::Postgres => POSTGRES_SCHEMA,
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Sqlite => write!(f, "sqlite"),
            Dialect::Postgres => write!(f, "postgres"),
        }
    }
}

/// Connection settings for [`DatabaseRepository`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct DatabaseOptions {
    #[builder(default = 10)]
    pub max_connections: u32,
    /// Upper bound for every statement. `None` leaves statements unbounded.
    #[builder(default)]
    pub query_timeout: Option<Duration>,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Relational implementation of the [`Repository`] trait.
///
/// Mappings live in the `link(id, key, value)` table. A unique index on
/// `key` lets inserts detect collisions atomically: an insert that hits an
/// existing row reads the stored URL back and succeeds only if it is the
/// same URL.
#[derive(Debug, Clone)]
pub struct DatabaseRepository {
    pool: AnyPool,
    dialect: Dialect,
    query_timeout: Option<Duration>,
}

impl DatabaseRepository {
    /// Connects with default options and runs the schema migration.
    pub async fn connect(dsn: &str) -> Result<Self> {
        Self::connect_with(dsn, DatabaseOptions::default()).await
    }

    /// Connects to `dsn` and runs the schema migration.
    ///
    /// Fails with `UnsupportedDriver` before connecting if the DSN scheme is
    /// neither SQLite nor PostgreSQL.
    pub async fn connect_with(dsn: &str, options: DatabaseOptions) -> Result<Self> {
        let dialect = Dialect::from_dsn(dsn)?;
        sqlx::any::install_default_drivers();

        // every connection to an in-memory database opens a fresh one, so
        // the pool must keep exactly one alive for the whole lifetime
        let pool_options = if dialect.is_in_memory(dsn) {
            AnyPoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            AnyPoolOptions::new().max_connections(options.max_connections)
        };
        let pool = pool_options.connect(dsn).await.map_err(map_sqlx_error)?;

        let repository = Self {
            pool,
            dialect,
            query_timeout: options.query_timeout,
        };
        repository.migrate().await?;
        info!(dialect = %dialect, "connected to database");
        Ok(repository)
    }

    /// Creates the `link` table and its key index if they do not exist.
    pub async fn migrate(&self) -> Result<()> {
        self.bounded(self.query_timeout, async {
            let mut conn = self.pool.acquire().await?;
            sqlx::query(self.dialect.schema())
                .execute(&mut *conn)
                .await?;
            sqlx::query(KEY_INDEX).execute(&mut *conn).await?;
            Ok::<_, sqlx::Error>(())
        })
        .await
    }

    /// Returns the dialect resolved at connection time.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    async fn bounded<T, F>(&self, timeout: Option<Duration>, operation: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| StorageError::Timeout(format!("no response within {limit:?}")))?
                .map_err(map_sqlx_error),
            None => operation.await.map_err(map_sqlx_error),
        }
    }
}

/// Outcome of inserting one mapping.
enum Stored {
    Url,
    Conflict,
}

/// Inserts `url` under `code` unless the key is already present, then reads
/// the first stored row back to tell a repeated add from a collision.
async fn insert_link(
    conn: &mut AnyConnection,
    code: &ShortCode,
    url: &str,
) -> std::result::Result<Stored, sqlx::Error> {
    let inserted = sqlx::query(INSERT_LINK)
        .bind(code.as_str())
        .bind(url)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if inserted > 0 {
        return Ok(Stored::Url);
    }

    let existing: String = sqlx::query(SELECT_LINK)
        .bind(code.as_str())
        .fetch_one(&mut *conn)
        .await?
        .try_get("value")?;

    if existing == url {
        Ok(Stored::Url)
    } else {
        Ok(Stored::Conflict)
    }
}

/// Takes the per-key transaction locks, in key order so that concurrent
/// batches cannot deadlock. SQLite already serializes writers.
async fn lock_keys<'a>(
    conn: &mut AnyConnection,
    dialect: Dialect,
    codes: impl IntoIterator<Item = &'a ShortCode>,
) -> std::result::Result<(), sqlx::Error> {
    if dialect != Dialect::Postgres {
        return Ok(());
    }

    let mut codes: Vec<_> = codes.into_iter().collect();
    codes.sort();
    codes.dedup();
    for code in codes {
        sqlx::query(LOCK_KEY)
            .bind(code.as_str())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl Repository for DatabaseRepository {
    async fn add(&self, url: &str) -> Result<ShortCode> {
        let code = KeyDeriver::derive(url);

        let stored = self
            .bounded(self.query_timeout, async {
                let mut tx = self.pool.begin().await?;
                lock_keys(&mut tx, self.dialect, [&code]).await?;
                let stored = insert_link(&mut tx, &code, url).await?;
                tx.commit().await?;
                Ok::<_, sqlx::Error>(stored)
            })
            .await?;

        match stored {
            Stored::Url => {
                debug!(code = %code, "stored url in database");
                Ok(code)
            }
            Stored::Conflict => Err(StorageError::Conflict(code.to_string())),
        }
    }

    async fn get(&self, code: &ShortCode) -> Result<String> {
        let row = self
            .bounded(
                self.query_timeout,
                sqlx::query(SELECT_LINK)
                    .bind(code.as_str())
                    .fetch_optional(&self.pool),
            )
            .await?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(code.to_string()));
        };
        row.try_get("value").map_err(map_sqlx_error)
    }

    async fn add_batch(&self, requests: &[BatchRequest]) -> Result<Vec<BatchKey>> {
        let derived = derive_batch(requests);

        let conflict = self
            .bounded(self.query_timeout, async {
                let mut tx = self.pool.begin().await?;
                lock_keys(&mut tx, self.dialect, derived.iter().map(|(code, _)| code)).await?;
                for (code, url) in &derived {
                    if let Stored::Conflict = insert_link(&mut tx, code, url).await? {
                        // dropping the transaction rolls it back
                        return Ok(Some(code.clone()));
                    }
                }
                tx.commit().await?;
                Ok::<_, sqlx::Error>(None)
            })
            .await?;

        if let Some(code) = conflict {
            return Err(StorageError::Conflict(code.to_string()));
        }

        debug!(entries = derived.len(), "stored url batch in database");
        Ok(batch_keys(requests, derived))
    }

    async fn ping(&self, timeout: Duration) -> Result<()> {
        self.bounded(Some(timeout), async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await
        })
        .await
        .map_err(|err| match err {
            StorageError::Timeout(_) | StorageError::Unavailable(_) => err,
            other => StorageError::Unavailable(other.to_string()),
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
