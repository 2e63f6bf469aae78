use std::time::Duration;

use pinhole_storage::{
    BatchRequest, DatabaseRepository, Dialect, KeyDeriver, Repository, ShortCode, StorageError,
};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    repo: DatabaseRepository,
}

impl Fixture {
    async fn start() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let repo = DatabaseRepository::connect(&dsn(&dir))
            .await
            .expect("connect sqlite");
        Self { dir, repo }
    }

    async fn reopen(&self) -> DatabaseRepository {
        DatabaseRepository::connect(&dsn(&self.dir))
            .await
            .expect("reconnect sqlite")
    }

    async fn row_count(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM link")
            .fetch_one(self.repo.pool())
            .await
            .expect("count rows")
    }
}

fn dsn(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("links.db").display())
}

fn request(id: &str, url: &str) -> BatchRequest {
    BatchRequest {
        correlation_id: id.to_string(),
        original_url: url.to_string(),
    }
}

#[tokio::test]
async fn resolves_sqlite_dialect() {
    let fixture = Fixture::start().await;
    assert_eq!(fixture.repo.dialect(), Dialect::Sqlite);
}

#[tokio::test]
async fn add_and_get_round_trip() {
    let fixture = Fixture::start().await;

    let code = fixture.repo.add("https://example.com").await.unwrap();
    assert_eq!(code, KeyDeriver::derive("https://example.com"));
    assert_eq!(
        fixture.repo.get(&code).await.unwrap(),
        "https://example.com"
    );
}

#[tokio::test]
async fn get_unknown_code_is_not_found() {
    let fixture = Fixture::start().await;
    let code = ShortCode::parse("deadbeef00").unwrap();

    let err = fixture.repo.get(&code).await.unwrap_err();
    assert_eq!(err, StorageError::NotFound("deadbeef00".into()));
}

#[tokio::test]
async fn re_adding_same_url_keeps_a_single_row() {
    let fixture = Fixture::start().await;

    let first = fixture.repo.add("https://example.com").await.unwrap();
    let second = fixture.repo.add("https://example.com").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fixture.row_count().await, 1);
}

#[tokio::test]
async fn add_conflicts_when_code_maps_to_another_url() {
    let fixture = Fixture::start().await;
    let taken = KeyDeriver::derive("https://example.com");

    sqlx::query(r#"INSERT INTO link ("key", value) VALUES ($1, $2)"#)
        .bind(taken.as_str())
        .bind("https://other.example")
        .execute(fixture.repo.pool())
        .await
        .unwrap();

    let err = fixture.repo.add("https://example.com").await.unwrap_err();
    assert_eq!(err, StorageError::Conflict(taken.to_string()));
    assert_eq!(
        fixture.repo.get(&taken).await.unwrap(),
        "https://other.example"
    );
}

#[tokio::test]
async fn add_batch_preserves_order() {
    let fixture = Fixture::start().await;
    let requests = vec![
        request("c1", "https://a.com"),
        request("c2", "https://b.com"),
    ];

    let keys = fixture.repo.add_batch(&requests).await.unwrap();

    assert_eq!(keys[0].correlation_id, "c1");
    assert_eq!(keys[1].correlation_id, "c2");
    assert_eq!(
        fixture.repo.get(&keys[0].code).await.unwrap(),
        "https://a.com"
    );
    assert_eq!(
        fixture.repo.get(&keys[1].code).await.unwrap(),
        "https://b.com"
    );
}

#[tokio::test]
async fn add_batch_rolls_back_on_conflict() {
    let fixture = Fixture::start().await;
    let taken = KeyDeriver::derive("https://b.com");

    sqlx::query(r#"INSERT INTO link ("key", value) VALUES ($1, $2)"#)
        .bind(taken.as_str())
        .bind("https://not-b.com")
        .execute(fixture.repo.pool())
        .await
        .unwrap();

    let requests = vec![
        request("c1", "https://a.com"),
        request("c2", "https://b.com"),
    ];
    let err = fixture.repo.add_batch(&requests).await.unwrap_err();

    assert!(matches!(err, StorageError::Conflict(_)));
    assert_eq!(fixture.row_count().await, 1);
}

#[tokio::test]
async fn data_survives_reconnect_and_migration_is_idempotent() {
    let fixture = Fixture::start().await;
    let code = fixture.repo.add("https://example.com").await.unwrap();
    fixture.repo.close().await.unwrap();

    let reopened = fixture.reopen().await;
    assert_eq!(reopened.get(&code).await.unwrap(), "https://example.com");
}

#[tokio::test]
async fn ping_reports_closed_pool_as_unavailable() {
    let fixture = Fixture::start().await;
    fixture.repo.ping(Duration::from_secs(1)).await.unwrap();

    fixture.repo.close().await.unwrap();
    let err = fixture.repo.ping(Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)));
}

#[tokio::test]
async fn opens_legacy_table_with_duplicate_keys() {
    let dir = TempDir::new().unwrap();
    let legacy = sqlx::SqlitePool::connect(&dsn(&dir)).await.unwrap();
    sqlx::query(
        "CREATE TABLE link (id INTEGER PRIMARY KEY, key TEXT NOT NULL, value TEXT NOT NULL)",
    )
    .execute(&legacy)
    .await
    .unwrap();
    for url in ["https://first.example", "https://second.example"] {
        sqlx::query("INSERT INTO link (key, value) VALUES ($1, $2)")
            .bind("abc1234567")
            .bind(url)
            .execute(&legacy)
            .await
            .unwrap();
    }
    legacy.close().await;

    let repo = DatabaseRepository::connect(&dsn(&dir)).await.unwrap();
    let code = ShortCode::parse("abc1234567").unwrap();

    assert_eq!(repo.get(&code).await.unwrap(), "https://first.example");
    let added = repo.add("https://example.com").await.unwrap();
    assert_eq!(repo.get(&added).await.unwrap(), "https://example.com");
}

#[tokio::test]
async fn batch_repeating_a_url_stores_it_once() {
    let fixture = Fixture::start().await;
    let requests = vec![
        request("c1", "https://a.com"),
        request("c2", "https://a.com"),
    ];

    let keys = fixture.repo.add_batch(&requests).await.unwrap();

    assert_eq!(keys[0].code, keys[1].code);
    assert_eq!(fixture.row_count().await, 1);
}
