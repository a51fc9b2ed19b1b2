//! End-to-end HTTP tests against a real PostgreSQL instance, driven through
//! `axum_test::TestServer` over the full `create_app` router and middleware
//! stack.
//!
//! Grounded on `rest/tests/common/harness.rs`'s `TestServer`-over-`create_app`
//! pattern, adapted to the one storage backend this system has: a disposable
//! `testcontainers_modules::postgres::Postgres` container, matching
//! `abr-persistence`'s own `tests/postgres_tests.rs` helper. All marked
//! `#[ignore]` since they need Docker.
//!
//! Run with: `cargo test -p abr-server -- --ignored` (requires Docker).

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::Value;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

use abr_domain::NormalizedBusiness;
use abr_persistence::{DatabaseConfig, Repository};
use abr_server::{create_app, AppState, ServerConfig};

async fn test_server(max_candidates: u64) -> (TestServer, ContainerAsync<Postgres>) {
    let container = Postgres::default()
        .start()
        .await
        .expect("failed to start PostgreSQL container");

    let host_port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get host port");
    let host = container.get_host().await.expect("failed to get host");

    let database_config = DatabaseConfig {
        url: format!("postgres://postgres:postgres@{host}:{host_port}/postgres"),
        ssl: false,
        pool_min: 1,
        pool_max: 4,
        idle_timeout_ms: None,
    };

    let pool = database_config.build_pool().expect("failed to build pool");
    {
        let client = pool.get().await.expect("failed to acquire connection");
        abr_persistence::schema::initialize(&client)
            .await
            .expect("failed to initialize schema");
    }

    let repository = Arc::new(Repository::new(pool, max_candidates));
    let config = ServerConfig {
        search_max_candidates: max_candidates,
        ..ServerConfig::for_testing()
    };
    let state = AppState::new(repository, config);
    let app = create_app(state);

    (TestServer::new(app).expect("failed to build test server"), container)
}

fn business(abn: &str, entity_name: &str, state: &str) -> NormalizedBusiness {
    NormalizedBusiness {
        abn: abn.to_string(),
        abn_status: "ACT".to_string(),
        abn_status_from: None,
        entity_type_code: "PRV".to_string(),
        entity_type_text: Some("Australian Private Company".to_string()),
        entity_name: entity_name.to_string(),
        given_name: None,
        family_name: None,
        state: Some(state.to_string()),
        postcode: Some("2000".to_string()),
        gst_status: None,
        gst_from_date: None,
        acn: None,
        record_last_updated: None,
        other_names: vec![
            abr_domain::RawBusinessName { name_type: "TRD".to_string(), name_text: format!("{entity_name} TRADING") },
            abr_domain::RawBusinessName { name_type: "BN".to_string(), name_text: format!("{entity_name} BN") },
        ],
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn health_reports_ok() {
    let (server, _container) = test_server(5_000).await;
    let response = server.get("/api/v1/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
}

/// S3 — by-key hit: after ingesting a business with two alternate names,
/// the lookup returns it with both names attached.
#[tokio::test]
#[ignore = "requires Docker"]
async fn by_abn_returns_business_with_its_names() {
    let (server, container) = test_server(5_000).await;

    seed(&container, &[business("53004085616", "VANTAGE SEARCH PTY LTD", "NSW")]).await;

    let response = server.get("/api/v1/businesses/53004085616").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["entityName"], "VANTAGE SEARCH PTY LTD");
    assert_eq!(body["data"]["businessNames"].as_array().unwrap().len(), 2);
}

/// S4 — by-key miss.
#[tokio::test]
#[ignore = "requires Docker"]
async fn by_abn_miss_returns_404_with_operational_message() {
    let (server, _container) = test_server(5_000).await;

    let response = server.get("/api/v1/businesses/00000000000").await;
    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Business not found: 00000000000");
}

/// S5 — filter-only listing: 100 NSW + 50 elsewhere, page 2 of 20 per page.
#[tokio::test]
#[ignore = "requires Docker"]
async fn filter_only_search_paginates_per_s5() {
    let (server, container) = test_server(5_000).await;

    let nsw: Vec<NormalizedBusiness> = (0..100)
        .map(|i| business(&format!("{:011}", 10_000_000_000u64 + i), &format!("NSW CO {i} PTY LTD"), "NSW"))
        .collect();
    let other: Vec<NormalizedBusiness> = (0..50)
        .map(|i| business(&format!("{:011}", 20_000_000_000u64 + i), &format!("VIC CO {i} PTY LTD"), "VIC"))
        .collect();
    seed(&container, &nsw).await;
    seed(&container, &other).await;

    let response = server
        .get("/api/v1/businesses/search")
        .add_query_param("state", "NSW")
        .add_query_param("page", "2")
        .add_query_param("limit", "20")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["limit"], 20);
    assert_eq!(body["pagination"]["total"], 100);
    assert_eq!(body["pagination"]["totalPages"], 5);
    assert_eq!(body["data"].as_array().unwrap().len(), 20);
}

/// S6 — AI mode is not implemented.
#[tokio::test]
#[ignore = "requires Docker"]
async fn ai_mode_search_returns_501() {
    let (server, _container) = test_server(5_000).await;

    let response = server
        .get("/api/v1/businesses/search")
        .add_query_param("q", "x")
        .add_query_param("mode", "ai")
        .await;
    response.assert_status(axum::http::StatusCode::NOT_IMPLEMENTED);
    let body: Value = response.json();
    assert!(body["message"].as_str().unwrap().contains("AI search"));
}

/// An unknown `technique` is a validation error, not a crash.
#[tokio::test]
#[ignore = "requires Docker"]
async fn unknown_technique_returns_400() {
    let (server, _container) = test_server(5_000).await;

    let response = server
        .get("/api/v1/businesses/search")
        .add_query_param("q", "x")
        .add_query_param("technique", "fuzzy")
        .await;
    response.assert_status_bad_request();
}

/// S7-shaped scenario: a broad term's reported total saturates at the cap.
#[tokio::test]
#[ignore = "requires Docker"]
async fn search_total_saturates_at_the_candidate_cap() {
    let (server, container) = test_server(5).await;

    let rows: Vec<NormalizedBusiness> = (0..10)
        .map(|i| business(&format!("{:011}", 30_000_000_000u64 + i), &format!("BROAD MATCH {i} PTY LTD"), "NSW"))
        .collect();
    seed(&container, &rows).await;

    let response = server
        .get("/api/v1/businesses/search")
        .add_query_param("q", "broad")
        .add_query_param("limit", "2")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["pagination"]["total"], 5);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

async fn seed(container: &ContainerAsync<Postgres>, rows: &[NormalizedBusiness]) {
    let host_port = container.get_host_port_ipv4(5432).await.unwrap();
    let host = container.get_host().await.unwrap();
    let database_config = DatabaseConfig {
        url: format!("postgres://postgres:postgres@{host}:{host_port}/postgres"),
        ssl: false,
        pool_min: 1,
        pool_max: 4,
        idle_timeout_ms: None,
    };
    let pool = database_config.build_pool().unwrap();
    let repository = Repository::new(pool, 5_000);
    repository.bulk_upsert(rows).await.unwrap();

    let abns: Vec<String> = rows.iter().map(|r| r.abn.clone()).collect();
    let ids = repository.get_ids_by_abns(&abns).await.unwrap();
    let mut name_rows = Vec::new();
    for row in rows {
        if let Some(&id) = ids.get(&row.abn) {
            for name in &row.other_names {
                name_rows.push((id, name.clone()));
            }
        }
    }
    if !name_rows.is_empty() {
        repository.bulk_insert_names(&name_rows).await.unwrap();
    }
}
