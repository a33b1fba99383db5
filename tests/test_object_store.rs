//! Object-store behavior against a stubbed S3 endpoint

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use venus_report::config::ObjectStoreConfig;
use venus_report::infrastructure::object_store::ObjectStore;

fn store_for(server: &MockServer) -> ObjectStore {
    ObjectStore::from_config(&ObjectStoreConfig {
        region: "us-east-1".to_string(),
        access_key_id: "test-key".to_string(),
        secret_access_key: "test-secret".to_string(),
        endpoint_url: Some(server.uri()),
        report_bucket: "test-bucket".to_string(),
        deployment_prefix: "dev".to_string(),
    })
}

#[test]
fn report_keys_are_prefix_section_name() {
    let config = ObjectStoreConfig {
        deployment_prefix: "prod".to_string(),
        ..Default::default()
    };
    let store = ObjectStore::from_config(&config);
    assert_eq!(
        store.report_key("daily", "2020-01-01"),
        "prod/daily/2020-01-01.json"
    );
    assert_eq!(
        store.report_key("ingestion-data/epv", "2020-01"),
        "prod/ingestion-data/epv/2020-01.json"
    );
    assert_eq!(
        store.prefixed_key("user-input-data/collated-weekly.json"),
        "prod/user-input-data/collated-weekly.json"
    );
}

#[tokio::test]
async fn put_json_writes_pretty_document() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/test-bucket/dev/daily/2020-01-01.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let content = json!({"report": {"from": "2019-12-31", "to": "2020-01-01"}});
    store
        .put_json("test-bucket", "dev/daily/2020-01-01.json", &content)
        .await
        .unwrap();
}

#[tokio::test]
async fn get_json_parses_the_stored_document() {
    let server = MockServer::start().await;
    let document = json!({"stacks_summary": {"total_stack_requests_count": 2}});
    Mock::given(method("GET"))
        .and(path("/test-bucket/dev/daily/2020-01-01.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(document.to_string(), "application/json"),
        )
        .mount(&server)
        .await;

    let store = store_for(&server);
    let fetched: Option<serde_json::Value> = store
        .get_json("test-bucket", "dev/daily/2020-01-01.json")
        .await
        .unwrap();
    assert_eq!(fetched, Some(document));
}

#[tokio::test]
async fn missing_key_is_none_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404).set_body_raw(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <Error><Code>NoSuchKey</Code>\
                 <Message>The specified key does not exist.</Message></Error>",
                "application/xml",
            ),
        )
        .mount(&server)
        .await;

    let store = store_for(&server);
    let fetched: Option<serde_json::Value> = store
        .get_json("test-bucket", "dev/daily/1999-01-01.json")
        .await
        .unwrap();
    assert!(fetched.is_none());
}

#[tokio::test]
async fn round_trip_preserves_structure() {
    let server = MockServer::start().await;
    let document = json!({
        "report": {"from": "2019-12-31", "to": "2020-01-01"},
        "stacks_summary": {
            "npm": {"stack_requests_count": 1},
            "total_stack_requests_count": 1
        },
        "stacks_details": [{"ecosystem": "npm", "stack": ["lodash 4.17.4"]}]
    });

    Mock::given(method("PUT"))
        .and(path("/test-bucket/dev/daily/2020-01-02.json"))
        .and(body_json(&document))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/test-bucket/dev/daily/2020-01-02.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(serde_json::to_vec_pretty(&document).unwrap(), "application/json"),
        )
        .mount(&server)
        .await;

    let store = store_for(&server);
    store
        .put_json("test-bucket", "dev/daily/2020-01-02.json", &document)
        .await
        .unwrap();
    let restored: Option<serde_json::Value> = store
        .get_json("test-bucket", "dev/daily/2020-01-02.json")
        .await
        .unwrap();
    assert_eq!(restored, Some(document));
}
