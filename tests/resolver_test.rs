//! Integration tests for location resolution and selection

use async_trait::async_trait;
use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use yeyak::captcha::StaticTokenProvider;
use yeyak::client::ApiClient;
use yeyak::config::Config;
use yeyak::error::{Error, FatalError};
use yeyak::locations::{LocationPrompt, LocationResolver, SelectionCache};
use yeyak::models::{Location, LocationSource};

fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.api.rate_limit = 100.0;
    config.api.empty_result_pause_secs = 0;
    config.identity.first_name = "Jae".to_string();
    config.identity.last_name = "Kim".to_string();
    config.locations.zip_codes = vec!["78701".to_string(), "78702".to_string()];
    config
}

fn resolver_for(server: &MockServer, config: Config) -> LocationResolver {
    let client =
        ApiClient::new(&config, Arc::new(StaticTokenProvider::new("cap-tok"))).unwrap();
    LocationResolver::new(Arc::new(client), config)
}

/// Prompt stub returning a fixed subset
struct StubPrompt {
    pick_ids: Vec<u32>,
}

#[async_trait]
impl LocationPrompt for StubPrompt {
    async fn select(&self, candidates: &[Location]) -> anyhow::Result<Vec<Location>> {
        Ok(candidates
            .iter()
            .filter(|l| self.pick_ids.contains(&l.id))
            .cloned()
            .collect())
    }
}

async fn mount_zip_locations(server: &MockServer, zip: &str, locations: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/available-locations"))
        .and(body_partial_json(json!({ "zipCode": zip })))
        .respond_with(ResponseTemplate::new(200).set_body_json(locations))
        .mount(server)
        .await;
}

/// Overlapping results across zips keep the first-seen record for an id
#[tokio::test]
async fn test_dedup_keeps_first_occurrence() {
    let server = MockServer::start().await;

    mount_zip_locations(
        &server,
        "78701",
        json!([
            { "id": 42, "name": "Central Office", "address": "1 First St", "distance": 10.0 },
            { "id": 7, "name": "South Office", "address": "2 South St", "distance": 2.0 }
        ]),
    )
    .await;

    mount_zip_locations(
        &server,
        "78702",
        json!([
            { "id": 42, "name": "Central Office (east listing)", "address": "1 First St", "distance": 1.0 }
        ]),
    )
    .await;

    let resolver = resolver_for(&server, test_config(&server.uri()));
    let resolved = resolver.resolve_all().await.unwrap();

    assert_eq!(resolved.len(), 2);
    let kept = resolved.iter().find(|l| l.id == 42).unwrap();
    assert_eq!(kept.name, "Central Office");
    assert_eq!(kept.distance, 10.0);
    assert_eq!(kept.source, LocationSource::Zip("78701".to_string()));

    // Sorted ascending by distance
    assert_eq!(resolved[0].id, 7);
}

/// All candidates beyond the limit stop the run deliberately (exit 0)
#[tokio::test]
async fn test_all_filtered_out_is_deliberate_stop() {
    let server = MockServer::start().await;

    for zip in ["78701", "78702"] {
        mount_zip_locations(
            &server,
            zip,
            json!([
                { "id": 1, "name": "Far Office", "address": "9 Far Rd", "distance": 80.0 }
            ]),
        )
        .await;
    }

    let mut config = test_config(&server.uri());
    config.locations.max_distance_miles = 25.0;
    let resolver = resolver_for(&server, config);

    let cache_dir = tempfile::tempdir().unwrap();
    let cache = SelectionCache::new(cache_dir.path().join("selection.json"));
    let result = resolver
        .select_for_run(&StubPrompt { pick_ids: vec![] }, &cache)
        .await;

    match result {
        Err(err @ Error::Fatal(FatalError::NoLocationInRange { nearest, .. })) => {
            assert_eq!(nearest, 80.0);
            assert_eq!(err.exit_code(), 0);
        }
        other => panic!("expected out-of-range stop, got {other:?}"),
    }
}

/// No candidates at all is an error (exit 1), distinct from filtered-to-zero
#[tokio::test]
async fn test_nothing_returned_is_an_error() {
    let server = MockServer::start().await;

    for zip in ["78701", "78702"] {
        mount_zip_locations(&server, zip, json!([])).await;
    }

    let resolver = resolver_for(&server, test_config(&server.uri()));
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = SelectionCache::new(cache_dir.path().join("selection.json"));

    let result = resolver
        .select_for_run(&StubPrompt { pick_ids: vec![] }, &cache)
        .await;

    match result {
        Err(err @ Error::Fatal(FatalError::NoLocationsFound)) => {
            assert_eq!(err.exit_code(), 1);
        }
        other => panic!("expected no-locations error, got {other:?}"),
    }
}

/// Manual mode: a persisted selection is used verbatim, without resolution
#[tokio::test]
async fn test_manual_mode_uses_cached_selection() {
    // No mocks mounted: any HTTP call would fail the test
    let server = MockServer::start().await;

    let mut config = test_config(&server.uri());
    config.locations.manual_selection = true;

    let cache_dir = tempfile::tempdir().unwrap();
    let cache = SelectionCache::new(cache_dir.path().join("selection.json"));
    let saved = vec![Location {
        id: 5,
        name: "Saved Office".to_string(),
        address: "5 Saved St".to_string(),
        distance: 3.0,
        source: LocationSource::Zip("78701".to_string()),
        type_id: 71,
    }];
    cache.save(&saved).await.unwrap();

    let resolver = resolver_for(&server, config);
    let selected = resolver
        .select_for_run(&StubPrompt { pick_ids: vec![] }, &cache)
        .await
        .unwrap();

    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].name, "Saved Office");
}

/// Manual mode: an interactive choice is persisted for the next run
#[tokio::test]
async fn test_manual_mode_prompts_and_persists() {
    let server = MockServer::start().await;

    for zip in ["78701", "78702"] {
        mount_zip_locations(
            &server,
            zip,
            json!([
                { "id": 1, "name": "Office One", "address": "1 A St", "distance": 1.0 },
                { "id": 2, "name": "Office Two", "address": "2 B St", "distance": 2.0 }
            ]),
        )
        .await;
    }

    let mut config = test_config(&server.uri());
    config.locations.manual_selection = true;
    let resolver = resolver_for(&server, config);

    let cache_dir = tempfile::tempdir().unwrap();
    let cache = SelectionCache::new(cache_dir.path().join("selection.json"));

    let selected = resolver
        .select_for_run(&StubPrompt { pick_ids: vec![2] }, &cache)
        .await
        .unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].id, 2);

    // Persisted: a second selection replays the choice
    let replayed = cache.load().await.unwrap();
    assert_eq!(replayed[0].id, 2);
}

/// Manual mode: an empty interactive choice is fatal
#[tokio::test]
async fn test_manual_mode_empty_selection_is_fatal() {
    let server = MockServer::start().await;

    for zip in ["78701", "78702"] {
        mount_zip_locations(
            &server,
            zip,
            json!([
                { "id": 1, "name": "Office One", "address": "1 A St", "distance": 1.0 }
            ]),
        )
        .await;
    }

    let mut config = test_config(&server.uri());
    config.locations.manual_selection = true;
    let resolver = resolver_for(&server, config);

    let cache_dir = tempfile::tempdir().unwrap();
    let cache = SelectionCache::new(cache_dir.path().join("selection.json"));

    let result = resolver
        .select_for_run(&StubPrompt { pick_ids: vec![] }, &cache)
        .await;

    assert!(matches!(
        result,
        Err(Error::Fatal(FatalError::EmptySelection))
    ));
}

/// A city query is issued once instead of one query per zip
#[tokio::test]
async fn test_city_query_single_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/available-locations"))
        .and(body_partial_json(json!({ "cityName": "Austin" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 9, "name": "City Office", "address": "9 C St", "distance": 4.0 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.locations.city = Some("Austin".to_string());
    let resolver = resolver_for(&server, config);

    let resolved = resolver.resolve_all().await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].source, LocationSource::City("Austin".to_string()));
}
