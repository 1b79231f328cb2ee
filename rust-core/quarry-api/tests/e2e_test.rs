// SPDX-License-Identifier: PMPL-1.0-or-later
//! End-to-end tests: a real server on an ephemeral port, driven by the client SDK.

use std::collections::HashMap;
use std::net::SocketAddr;

use serde_json::json;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;

use quarry_api::{build_grpc_router, ApiConfig, AppState};
use quarry_client::{
    Aggregate, AggregateResponse, ClientConfig, Credentials, Document, FieldOperator, Filter, Key,
    KeyMeta, QuarryClient, QuarryError, Request, Sort,
};

async fn spawn_server(config: ApiConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_grpc_router(AppState::new(&config), &config);
    tokio::spawn(async move {
        router
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    addr
}

async fn client_for(addr: SocketAddr, credentials: Credentials) -> QuarryClient {
    let config = ClientConfig::new(&format!("http://{addr}"))
        .unwrap()
        .with_credentials(credentials);
    QuarryClient::connect(config).await.unwrap()
}

fn catalogue() -> Vec<Document> {
    [
        json!({"id": "a", "price": 150, "category": "electronics", "color": "red"}),
        json!({"id": "b", "price": 50, "category": "electronics", "color": "red"}),
        json!({"id": "c", "price": 300, "category": "books", "color": "blue"}),
        json!({"id": "d", "price": 120, "category": "electronics", "color": "blue"}),
    ]
    .into_iter()
    .map(|v| Document::from_json(v).unwrap())
    .collect()
}

fn pricey_electronics() -> Request {
    Request::new()
        .with_filter(Filter::all(vec![
            Filter::field(FieldOperator::GreaterThan, "price", json!(100)),
            Filter::field(FieldOperator::EqualTo, "category", json!("electronics")),
        ]))
        .with_sort(Sort::desc("price"))
        .with_aggregate("colors", Aggregate::count("color"))
}

fn id_of(meta: &HashMap<String, Vec<u8>>) -> String {
    serde_json::from_slice(&meta["id"]).unwrap()
}

#[tokio::test]
async fn test_document_lifecycle_and_search() {
    let addr = spawn_server(ApiConfig::default()).await;
    let client = client_for(addr, Credentials::None).await;

    let keys = client.add(catalogue()).await.unwrap();
    assert_eq!(keys.len(), 4);
    assert_eq!(keys[0], Key::new("id", &json!("a")));

    let response = client.search(pricey_electronics()).await.unwrap();
    assert_eq!(response.reads, 4);
    assert_eq!(response.total_results, 2);
    let ids: Vec<String> = response.results.iter().map(|r| id_of(&r.meta)).collect();
    assert_eq!(ids, vec!["a", "d"]);
    match &response.aggregates["colors"] {
        AggregateResponse::Count(counts) => {
            assert_eq!(counts.get("red"), Some(&1));
            assert_eq!(counts.get("blue"), Some(&1));
        }
        other => panic!("unexpected aggregate {other:?}"),
    }

    client
        .patch(vec![KeyMeta {
            key: Key::new("id", &json!("a")),
            meta: HashMap::from([("price".to_string(), b"99".to_vec())]),
        }])
        .await
        .unwrap();
    let fetched = client.get(vec![Key::new("id", &json!("a"))]).await.unwrap();
    assert_eq!(fetched[0].value("price").unwrap(), Some(json!(99)));

    let response = client.search(pricey_electronics()).await.unwrap();
    assert_eq!(response.total_results, 1);

    client.delete(vec![Key::new("id", &json!("d"))]).await.unwrap();
    let response = client.search(pricey_electronics()).await.unwrap();
    assert_eq!(response.reads, 3);
    assert_eq!(response.total_results, 0);
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn test_evaluate_and_compare_without_storing() {
    let addr = spawn_server(ApiConfig::default()).await;
    let client = client_for(addr, Credentials::None).await;
    let doc = Document::from_json(json!({"id": 1, "title": "red wool scarf"})).unwrap();

    let request = Request::new().with_filter(Filter::field(
        FieldOperator::Contains,
        "title",
        json!("wool"),
    ));
    let response = client.evaluate(request, doc.clone()).await.unwrap();
    assert_eq!(response.reads, 1);
    assert_eq!(response.total_results, 1);

    let reference = Document::from_json(json!({"title": "wool scarf"})).unwrap();
    let response = client.compare(Request::new(), reference, doc).await.unwrap();
    assert_eq!(response.total_results, 1);
    assert!(response.results[0].score > 0.0);

    assert!(client.search(Request::new()).await.unwrap().results.is_empty());
}

#[tokio::test]
async fn test_invalid_request_reports_validation() {
    let addr = spawn_server(ApiConfig::default()).await;
    let client = client_for(addr, Credentials::None).await;

    let err = client
        .search(Request::new().with_filter(Filter::one(vec![])))
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::Validation(_)), "got {err:?}");

    let missing = Key::new("id", &json!("missing"));
    assert!(client.get(vec![missing.clone()]).await.unwrap().is_empty());
    let err = client
        .patch(vec![KeyMeta {
            key: missing,
            meta: HashMap::from([("price".to_string(), b"1".to_vec())]),
        }])
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn test_api_keys_are_enforced() {
    let config = ApiConfig {
        api_keys: vec!["secret".to_string()],
        ..ApiConfig::default()
    };
    let addr = spawn_server(config).await;

    let anonymous = client_for(addr, Credentials::None).await;
    let err = anonymous.search(Request::new()).await.unwrap_err();
    assert!(matches!(err, QuarryError::Unauthorized(_)), "got {err:?}");

    let wrong = client_for(addr, Credentials::ApiKey("guess".into())).await;
    assert!(matches!(
        wrong.search(Request::new()).await,
        Err(QuarryError::Unauthorized(_))
    ));

    let keyed = client_for(addr, Credentials::ApiKey("secret".into())).await;
    assert!(keyed.search(Request::new()).await.is_ok());

    let bearer = client_for(addr, Credentials::Bearer("secret".into())).await;
    assert!(bearer.add(catalogue()).await.is_ok());
}
