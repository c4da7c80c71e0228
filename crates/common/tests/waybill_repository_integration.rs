#![cfg(feature = "integration-tests")]

use std::collections::HashSet;

use common::domain::{
    InsertWaybillsRepoInput, TransitionWaybillRepoInput, WaybillRepository, WaybillSource,
    WaybillStatus,
};
use common::postgres::{PostgresClient, PostgresConfig, PostgresWaybillRepository};
use goose::MigrationRunner;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

async fn setup_test_db() -> (ContainerAsync<Postgres>, PostgresWaybillRepository) {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let migrations_dir = format!("{}/migrations/postgres", env!("CARGO_MANIFEST_DIR"));
    let dsn = format!(
        "postgres://postgres:postgres@{}:{}/postgres?sslmode=disable",
        host, port
    );
    let goose_path = which::which("goose").expect("goose binary not found");

    MigrationRunner::new(
        goose_path.to_string_lossy().to_string(),
        migrations_dir,
        "postgres".to_string(),
        dsn,
    )
    .run_migrations()
    .await
    .expect("Migrations failed");

    let client = PostgresClient::from_config(&PostgresConfig {
        host: host.to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_pool_size: 10,
        ..PostgresConfig::default()
    })
    .expect("Failed to create client");

    (postgres, PostgresWaybillRepository::new(client))
}

async fn seed(repo: &PostgresWaybillRepository, waybills: &[&str]) {
    repo.insert_waybills(InsertWaybillsRepoInput {
        waybills: waybills.iter().map(|w| w.to_string()).collect(),
        source: WaybillSource::DelhiveryBulk,
        status: WaybillStatus::Generated,
    })
    .await
    .unwrap();
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_insert_skips_known_numbers() {
    let (_container, repo) = setup_test_db().await;

    seed(&repo, &["1000000000001", "1000000000002"]).await;
    let inserted = repo
        .insert_waybills(InsertWaybillsRepoInput {
            waybills: vec![
                "1000000000002".to_string(),
                "1000000000003".to_string(),
                "1000000000003".to_string(),
            ],
            source: WaybillSource::DelhiveryBulk,
            status: WaybillStatus::Generated,
        })
        .await
        .unwrap();

    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].waybill, "1000000000003");
    assert_eq!(inserted[0].status, WaybillStatus::Generated);

    let stats = repo.waybill_stats().await.unwrap();
    assert_eq!(stats.generated, 3);
    assert_eq!(stats.total(), 3);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_reserve_takes_oldest_and_exhausts() {
    let (_container, repo) = setup_test_db().await;
    seed(&repo, &["2000000000001"]).await;

    let reserved = repo.reserve_waybill("ORD-1").await.unwrap().unwrap();
    assert_eq!(reserved.waybill, "2000000000001");
    assert_eq!(reserved.status, WaybillStatus::Reserved);
    assert_eq!(reserved.order_id.as_deref(), Some("ORD-1"));
    assert!(reserved.reserved_at.is_some());

    let found = repo.find_reserved_for_order("ORD-1").await.unwrap().unwrap();
    assert_eq!(found.waybill, "2000000000001");

    let again = repo.reserve_waybill("ORD-1").await.unwrap().unwrap();
    assert_eq!(again.waybill, "2000000000001");

    assert!(repo.reserve_waybill("ORD-2").await.unwrap().is_none());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_concurrent_reservations_never_share_a_waybill() {
    let (_container, repo) = setup_test_db().await;
    let numbers: Vec<String> = (0..20).map(|i| format!("30000000000{:02}", i)).collect();
    let refs: Vec<&str> = numbers.iter().map(String::as_str).collect();
    seed(&repo, &refs).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.reserve_waybill(&format!("ORD-{}", i)).await
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let waybill = handle.await.unwrap().unwrap().expect("inventory should not run out");
        assert!(seen.insert(waybill.waybill), "waybill handed out twice");
    }
    assert_eq!(seen.len(), 20);

    let stats = repo.waybill_stats().await.unwrap();
    assert_eq!(stats.reserved, 20);
    assert_eq!(stats.generated, 0);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_concurrent_reservations_for_one_order_share_a_waybill() {
    let (_container, repo) = setup_test_db().await;
    let numbers: Vec<String> = (0..10).map(|i| format!("31000000000{:02}", i)).collect();
    let refs: Vec<&str> = numbers.iter().map(String::as_str).collect();
    seed(&repo, &refs).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move { repo.reserve_waybill("ORD-SAME").await }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let waybill = handle.await.unwrap().unwrap().expect("inventory should not run out");
        assert_eq!(waybill.order_id.as_deref(), Some("ORD-SAME"));
        seen.insert(waybill.waybill);
    }
    assert_eq!(seen.len(), 1, "one order must hold exactly one reservation");

    let stats = repo.waybill_stats().await.unwrap();
    assert_eq!(stats.reserved, 1);
    assert_eq!(stats.generated, 9);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_transition_is_conditional_on_current_status() {
    let (_container, repo) = setup_test_db().await;
    seed(&repo, &["4000000000001"]).await;

    let used = repo
        .transition_waybill(TransitionWaybillRepoInput {
            waybill: "4000000000001".to_string(),
            from: WaybillStatus::Generated,
            to: WaybillStatus::Used,
            order_id: Some("ORD-9".to_string()),
            shipment_id: Some("shp_1".to_string()),
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(used.status, WaybillStatus::Used);
    assert_eq!(used.shipment_id.as_deref(), Some("shp_1"));
    assert!(used.used_at.is_some());

    // stale expected status
    let stale = repo
        .transition_waybill(TransitionWaybillRepoInput {
            waybill: "4000000000001".to_string(),
            from: WaybillStatus::Generated,
            to: WaybillStatus::Cancelled,
            order_id: None,
            shipment_id: None,
        })
        .await
        .unwrap();
    assert!(stale.is_none());

    let cancelled = repo
        .transition_waybill(TransitionWaybillRepoInput {
            waybill: "4000000000001".to_string(),
            from: WaybillStatus::Used,
            to: WaybillStatus::Cancelled,
            order_id: None,
            shipment_id: None,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cancelled.status, WaybillStatus::Cancelled);
    assert_eq!(cancelled.shipment_id.as_deref(), Some("shp_1"));
    assert!(cancelled.cancelled_at.is_some());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_list_filters_by_status() {
    let (_container, repo) = setup_test_db().await;
    seed(&repo, &["5000000000001", "5000000000002", "5000000000003"]).await;
    repo.reserve_waybill("ORD-1").await.unwrap();

    let all = repo.list_waybills(None, 10).await.unwrap();
    assert_eq!(all.len(), 3);

    let reserved = repo
        .list_waybills(Some(WaybillStatus::Reserved), 10)
        .await
        .unwrap();
    assert_eq!(reserved.len(), 1);

    let limited = repo
        .list_waybills(Some(WaybillStatus::Generated), 1)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);

    assert!(repo.get_waybill("9999999999999").await.unwrap().is_none());
}
