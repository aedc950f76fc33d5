use crate::common::{create_test_config, mount_page, mount_shop, product_page, urlset, SOURCE};
use shelf_harvest::crawler::{read_completion_marker, CacheMode, Coordinator};
use shelf_harvest::output::{search, SearchQuery};
use shelf_harvest::storage::{ProductStore, SqliteProductStore};
use shelf_harvest::HarvestError;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_run_once_crawls_and_stores_products() {
    let server = MockServer::start().await;
    mount_shop(&server).await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());
    let coordinator = Coordinator::from_config(&config).unwrap();

    let summary = coordinator.run_once(SOURCE, None, None).await.unwrap();

    // /about is filtered out and the duplicate phone-1 entry collapses
    assert_eq!(summary.urls_processed, 5);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 3);
    assert_eq!(summary.rate_limited, 1);
    assert_eq!(summary.products_found, 2);
    assert_eq!(summary.retry_rounds, 1);
    assert_eq!(summary.total_attempts, 8);
    assert_eq!(summary.cache_mode, CacheMode::Fresh);
    assert_eq!(summary.database_success, Some(2));
    assert_eq!(summary.database_failure, Some(0));

    let store = coordinator.store();
    let store = store.lock().unwrap();
    let galaxy = store.get_by_id("phone-1").unwrap().expect("phone-1 stored");
    assert_eq!(galaxy.title, "Galaxy Phone");
    assert_eq!(galaxy.brand, "Samsung");
    assert_eq!(galaxy.category, "Phones");
    assert_eq!(galaxy.source, SOURCE);
    assert_eq!(galaxy.current_price(), Some(9999.0));
    assert_eq!(
        galaxy.images,
        vec![format!("{}/img/Samsung.jpg", server.uri())]
    );

    assert!(store.get_by_id("private").unwrap().is_none());
    assert!(store.get_by_id("broken").unwrap().is_none());
}

#[tokio::test]
async fn test_run_writes_artifacts_and_marker() {
    let server = MockServer::start().await;
    mount_shop(&server).await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());
    let coordinator = Coordinator::from_config(&config).unwrap();

    let summary = coordinator.run_once(SOURCE, None, None).await.unwrap();

    assert!(summary.run_dir.join("summary.json").exists());
    let mut products: Vec<String> = std::fs::read_dir(&summary.run_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("product_"))
        .collect();
    products.sort();
    assert_eq!(products.len(), 2);
    assert!(products[0].starts_with("product_phone-1_"));
    assert!(products[1].starts_with("product_phone-2_"));

    let source_dir = temp_dir.path().join("data").join("mock_shop");
    let marker = read_completion_marker(&source_dir).expect("marker written");
    assert_eq!(marker.summary.succeeded, 2);

    // The summary on disk carries the ingestion counts
    let text = std::fs::read_to_string(summary.run_dir.join("summary.json")).unwrap();
    let on_disk: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(on_disk["database_success"], 2);
}

#[tokio::test]
async fn test_second_run_serves_cached_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/sitemap.xml", 200, urlset(&base, &["/p/tv-1", "/p/tv-2"])).await;
    Mock::given(method("GET"))
        .and(path("/p/tv-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(product_page("OLED TV", "LG", "R 19,999")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/tv-2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(product_page("QLED TV", "Samsung", "R 15,999")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&base, temp_dir.path());
    let coordinator = Coordinator::from_config(&config).unwrap();

    let first = coordinator.run_once(SOURCE, None, None).await.unwrap();
    assert_eq!(first.cache_mode, CacheMode::Fresh);
    assert_eq!(first.succeeded, 2);

    let second = coordinator.run_once(SOURCE, None, None).await.unwrap();
    assert_eq!(second.cache_mode, CacheMode::Incremental);
    assert_eq!(second.succeeded, 2);
    assert_ne!(first.run_dir, second.run_dir);

    let store = coordinator.store();
    let stats = store.lock().unwrap().stats().unwrap();
    assert_eq!(stats.total_products, 2);
}

#[tokio::test]
async fn test_rate_limited_page_recovers_on_retry() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/sitemap.xml", 200, urlset(&base, &["/p/flaky"])).await;
    Mock::given(method("GET"))
        .and(path("/p/flaky"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/p/flaky", 200, product_page("Toaster", "Russell", "R 499")).await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&base, temp_dir.path());
    let coordinator = Coordinator::from_config(&config).unwrap();

    let summary = coordinator.run_once(SOURCE, None, None).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.rate_limited, 0);
    assert_eq!(summary.total_attempts, 2);
    assert_eq!(summary.retry_rounds, 1);
}

#[tokio::test]
async fn test_page_without_title_counts_extraction_misses() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/sitemap.xml", 200, urlset(&base, &["/p/empty"])).await;
    mount_page(
        &server,
        "/p/empty",
        200,
        "<html><body><p>Nothing to see</p></body></html>".to_string(),
    )
    .await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&base, temp_dir.path());
    let coordinator = Coordinator::from_config(&config).unwrap();

    let summary = coordinator.run_once(SOURCE, None, None).await.unwrap();

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.extraction_misses, 2);
    assert_eq!(summary.products_found, 0);
    assert_eq!(summary.database_success, Some(0));
}

#[tokio::test]
async fn test_max_urls_override_caps_the_batch() {
    let server = MockServer::start().await;
    mount_shop(&server).await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());
    let coordinator = Coordinator::from_config(&config).unwrap();

    let summary = coordinator.run_once(SOURCE, Some(2), None).await.unwrap();

    assert_eq!(summary.urls_processed, 2);
    assert_eq!(summary.succeeded, 2);
}

#[tokio::test]
async fn test_missing_sitemap_is_a_discovery_error() {
    let server = MockServer::start().await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());
    let coordinator = Coordinator::from_config(&config).unwrap();

    let err = coordinator.run_once(SOURCE, None, None).await.unwrap_err();
    assert!(matches!(err, HarvestError::Discovery { .. }));

    let source_dir = temp_dir.path().join("data").join("mock_shop");
    assert!(read_completion_marker(&source_dir).is_none());
}

#[tokio::test]
async fn test_unknown_source_is_rejected() {
    let server = MockServer::start().await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());
    let coordinator = Coordinator::from_config(&config).unwrap();

    assert!(coordinator.run_once("Nowhere", None, None).await.is_err());
}

#[tokio::test]
async fn test_search_purge_and_backup_after_run() {
    let server = MockServer::start().await;
    mount_shop(&server).await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());
    let coordinator = Coordinator::from_config(&config).unwrap();
    coordinator.run_once(SOURCE, None, None).await.unwrap();

    let store = coordinator.store();
    let mut store = store.lock().unwrap();

    let response = search(&*store, &SearchQuery::text("galaxy")).unwrap();
    assert_eq!(response.total_products, 1);
    assert_eq!(response.results[SOURCE][0].id, "phone-1");

    let backup_path = temp_dir.path().join("backup.db");
    store.backup_to(&backup_path).unwrap();
    let backup = SqliteProductStore::new(&backup_path).unwrap();
    assert_eq!(backup.stats().unwrap().total_products, 2);

    assert_eq!(store.delete_by_source("mock shop").unwrap(), 2);
    assert_eq!(store.stats().unwrap().total_products, 0);
    assert_eq!(backup.stats().unwrap().total_products, 2);
}
