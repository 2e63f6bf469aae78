//! Requires Docker. Run with `cargo test -- --ignored`.

use std::time::Duration;

use pinhole_storage::{
    BatchRequest, DatabaseRepository, Dialect, KeyDeriver, Repository, StorageError,
};
use pinhole_test_infra::postgres::{PostgresConfig, PostgresServer};

struct Fixture {
    _postgres: PostgresServer,
    repo: DatabaseRepository,
}

impl Fixture {
    async fn start() -> Self {
        let postgres = PostgresServer::new(PostgresConfig::builder().build())
            .await
            .expect("start postgres");
        let url = postgres.database_url().await.expect("postgres url");
        let repo = connect_with_retry(&url).await;

        Self {
            _postgres: postgres,
            repo,
        }
    }
}

// the image restarts once after init, so the first attempts may be refused
async fn connect_with_retry(url: &str) -> DatabaseRepository {
    let mut last_error = None;

    for _ in 0..20 {
        match DatabaseRepository::connect(url).await {
            Ok(repo) => return repo,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect postgres: {last_error:?}");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn add_and_get_round_trip() {
    let fixture = Fixture::start().await;
    assert_eq!(fixture.repo.dialect(), Dialect::Postgres);

    let code = fixture.repo.add("https://example.com").await.unwrap();
    assert_eq!(
        fixture.repo.get(&code).await.unwrap(),
        "https://example.com"
    );
    assert_eq!(
        fixture.repo.add("https://example.com").await.unwrap(),
        code
    );
}

#[tokio::test]
#[ignore = "requires docker"]
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
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn add_batch_preserves_order() {
    let fixture = Fixture::start().await;
    let requests = vec![
        BatchRequest {
            correlation_id: "c1".into(),
            original_url: "https://a.com".into(),
        },
        BatchRequest {
            correlation_id: "c2".into(),
            original_url: "https://b.com".into(),
        },
    ];

    let keys = fixture.repo.add_batch(&requests).await.unwrap();
    assert_eq!(keys[0].correlation_id, "c1");
    assert_eq!(
        fixture.repo.get(&keys[1].code).await.unwrap(),
        "https://b.com"
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn ping_succeeds_against_live_server() {
    let fixture = Fixture::start().await;
    fixture.repo.ping(Duration::from_secs(1)).await.unwrap();
}
