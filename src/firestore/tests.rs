use super::*;
use crate::firestore::models::{
    Direction, DocumentTransform, FieldOperator, FieldTransform, ReadWrite, ServerValue,
    TransformType, Value as FirestoreValue, ValueType,
};
use crate::firestore::query::Query;
use httpmock::prelude::*;
use reqwest::{Client, Method};
use reqwest_middleware::ClientBuilder;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct User {
    name: String,
    age: i32,
}

fn alice() -> Document {
    Document::from_serializable(&User {
        name: "Alice".to_string(),
        age: 30,
    })
    .unwrap()
}

fn query_of(request: &FirestoreRequest) -> Vec<(&str, &str)> {
    request
        .query
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

fn firestore_for(server: &MockServer) -> FirebaseFirestore {
    let client = ClientBuilder::new(Client::new()).build();
    FirebaseFirestore::new_with_client(client, server.url("/v1"))
}

#[test]
fn test_database_path_defaults() {
    assert_eq!(request::database_path("p", ""), "projects/p/databases/(default)");
    assert_eq!(request::database_path("p", "audit"), "projects/p/databases/audit");
}

#[test]
fn test_export_and_import_requests() {
    let export = request::export_documents("p", "", "p.appspot.com", "/backups/today", "users, orders");
    assert_eq!(export.method, Method::POST);
    assert_eq!(export.path, "projects/p/databases/(default):exportDocuments");
    assert_eq!(
        export.body,
        Some(json!({
            "outputUriPrefix": "gs://p.appspot.com/backups/today",
            "collectionIds": ["users", "orders"]
        }))
    );

    let import = request::import_documents("p", "", "p.appspot.com", "backups/today", "");
    assert_eq!(import.path, "projects/p/databases/(default):importDocuments");
    assert_eq!(
        import.body,
        Some(json!({ "inputUriPrefix": "gs://p.appspot.com/backups/today" }))
    );
}

#[test]
fn test_create_document_splits_path() {
    let request = request::create_document("p", "", "users/alice/notes/n1", &alice(), "name,age").unwrap();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.path, "projects/p/databases/(default)/documents/users/alice/notes");
    assert_eq!(
        query_of(&request),
        vec![
            ("documentId", "n1"),
            ("mask.fieldPaths", "name"),
            ("mask.fieldPaths", "age")
        ]
    );
    assert_eq!(
        request.body,
        Some(json!({
            "fields": {
                "name": { "stringValue": "Alice" },
                "age": { "integerValue": "30" }
            }
        }))
    );
}

#[test]
fn test_create_document_without_parent_is_rejected() {
    let result = request::create_document("p", "", "users", &alice(), "");
    assert!(matches!(result, Err(FirestoreError::InvalidArgument(_))));
}

#[test]
fn test_create_document_in_with_generated_id() {
    let request = request::create_document_in("p", "", "users", "", &alice(), "").unwrap();
    assert_eq!(request.path, "projects/p/databases/(default)/documents/users");
    assert!(request.query.is_empty());
}

#[test]
fn test_patch_document_request() {
    let precondition = Precondition {
        exists: Some(true),
        update_time: Some("2014-10-02T15:01:23.045123456Z".to_string()),
    };
    let request = request::patch_document(
        "p",
        "",
        "users/alice",
        &alice(),
        "age",
        "",
        Some(&precondition),
    )
    .unwrap();

    assert_eq!(request.method, Method::PATCH);
    assert_eq!(request.path, "projects/p/databases/(default)/documents/users/alice");
    assert_eq!(
        query_of(&request),
        vec![
            ("updateMask.fieldPaths", "age"),
            ("currentDocument.exists", "true"),
            ("currentDocument.updateTime", "2014-10-02T15:01:23.045123456Z")
        ]
    );
}

#[test]
fn test_commit_request_with_transforms() {
    let writes = vec![
        Write::update(alice()).with_update_mask(vec!["age".to_string()]),
        Write::delete("projects/p/databases/(default)/documents/users/bob"),
        Write::transform(DocumentTransform {
            document: "projects/p/databases/(default)/documents/counters/visits".to_string(),
            field_transforms: vec![
                FieldTransform {
                    field_path: "count".to_string(),
                    transform_type: TransformType::Increment(FirestoreValue::integer(1)),
                },
                FieldTransform {
                    field_path: "updated".to_string(),
                    transform_type: TransformType::SetToServerValue(ServerValue::RequestTime),
                },
            ],
        }),
    ];

    let request = request::commit_document("p", "", &writes, "dHJhbnM=", false).unwrap();
    assert_eq!(request.path, "projects/p/databases/(default)/documents:commit");
    assert!(!request.detached);

    let body = request.body.unwrap();
    assert_eq!(body["transaction"], "dHJhbnM=");
    assert_eq!(body["writes"][0]["updateMask"], json!({ "fieldPaths": ["age"] }));
    assert_eq!(body["writes"][1], json!({ "delete": "projects/p/databases/(default)/documents/users/bob" }));
    assert_eq!(
        body["writes"][2]["transform"]["fieldTransforms"],
        json!([
            { "fieldPath": "count", "increment": { "integerValue": "1" } },
            { "fieldPath": "updated", "setToServerValue": "REQUEST_TIME" }
        ])
    );
}

#[test]
fn test_commit_async_is_detached() {
    let request = request::commit_document("p", "", &[], "", true).unwrap();
    assert!(request.detached);
    assert_eq!(request.body, Some(json!({ "writes": [] })));
}

#[test]
fn test_get_and_delete_requests() {
    let get = request::get_document("p", "db2", "users/alice", "name", "dHJhbnM=", "");
    assert_eq!(get.method, Method::GET);
    assert_eq!(get.path, "projects/p/databases/db2/documents/users/alice");
    assert_eq!(
        query_of(&get),
        vec![("mask.fieldPaths", "name"), ("transaction", "dHJhbnM=")]
    );
    assert!(get.body.is_none());

    let delete = request::delete_document(
        "p",
        "",
        "users/alice",
        Some(&Precondition {
            exists: Some(false),
            update_time: None,
        }),
    );
    assert_eq!(delete.method, Method::DELETE);
    assert_eq!(query_of(&delete), vec![("currentDocument.exists", "false")]);
}

#[test]
fn test_transaction_requests() {
    let begin = request::begin_transaction(
        "p",
        "",
        Some(&TransactionOptions::ReadWrite(ReadWrite {
            retry_transaction: Some("b2xk".to_string()),
        })),
    )
    .unwrap();
    assert_eq!(begin.path, "projects/p/databases/(default)/documents:beginTransaction");
    assert_eq!(
        begin.body,
        Some(json!({ "options": { "readWrite": { "retryTransaction": "b2xk" } } }))
    );

    let rollback = request::rollback("p", "", "dHJhbnM=");
    assert_eq!(rollback.path, "projects/p/databases/(default)/documents:rollback");
    assert_eq!(rollback.body, Some(json!({ "transaction": "dHJhbnM=" })));
}

#[test]
fn test_run_query_request() {
    let query = Query::new("users")
        .where_filter("age", FieldOperator::GreaterThanOrEqual, 18)
        .unwrap()
        .where_filter("name", FieldOperator::NotEqual, "Bob")
        .unwrap()
        .order_by("age", Direction::Descending)
        .limit(5);

    let request = request::run_query(
        "p",
        "",
        "",
        query.structured_query(),
        &ConsistencySelector::ReadTime("2014-10-02T15:01:23Z".to_string()),
    )
    .unwrap();

    assert_eq!(request.path, "projects/p/databases/(default)/documents:runQuery");
    let body = request.body.unwrap();
    assert_eq!(body["readTime"], "2014-10-02T15:01:23Z");
    assert_eq!(body["structuredQuery"]["from"], json!([{ "collectionId": "users" }]));
    assert_eq!(body["structuredQuery"]["limit"], 5);

    let filters = &body["structuredQuery"]["where"]["compositeFilter"];
    assert_eq!(filters["op"], "AND");
    assert_eq!(filters["filters"].as_array().unwrap().len(), 2);
    assert_eq!(
        filters["filters"][0]["fieldFilter"],
        json!({
            "field": { "fieldPath": "age" },
            "op": "GREATER_THAN_OR_EQUAL",
            "value": { "integerValue": "18" }
        })
    );

    let nested = request::run_query(
        "p",
        "",
        "users/alice",
        &StructuredQuery::default(),
        &ConsistencySelector::Undefined,
    )
    .unwrap();
    assert_eq!(nested.path, "projects/p/databases/(default)/documents/users/alice:runQuery");
    assert_eq!(nested.body, Some(json!({ "structuredQuery": {} })));
}

#[test]
fn test_list_requests() {
    let list = request::list_documents(
        "p",
        "",
        "users",
        &ListDocumentsOptions {
            page_size: Some(10),
            page_token: Some("next".to_string()),
            order_by: Some("age desc".to_string()),
            mask: Some("name".to_string()),
            show_missing: true,
        },
    );
    assert_eq!(list.method, Method::GET);
    assert_eq!(
        query_of(&list),
        vec![
            ("pageSize", "10"),
            ("pageToken", "next"),
            ("orderBy", "age desc"),
            ("mask.fieldPaths", "name"),
            ("showMissing", "true")
        ]
    );

    let ids = request::list_collection_ids("p", "", "", Some(50), "");
    assert_eq!(ids.path, "projects/p/databases/(default)/documents:listCollectionIds");
    assert_eq!(ids.body, Some(json!({ "pageSize": 50 })));
}

#[test]
fn test_request_url_encodes_query() {
    let request = request::list_documents(
        "p",
        "",
        "users",
        &ListDocumentsOptions {
            order_by: Some("age desc".to_string()),
            ..Default::default()
        },
    );
    let url = request.url("https://firestore.googleapis.com/v1/").unwrap();
    assert_eq!(
        url.as_str(),
        "https://firestore.googleapis.com/v1/projects/p/databases/(default)/documents/users?orderBy=age+desc"
    );
}

#[test]
fn test_document_conversion_round_trip() {
    let doc = alice();
    assert_eq!(
        doc.fields.get("age").map(|v| &v.value_type),
        Some(&ValueType::IntegerValue("30".to_string()))
    );
    let user: User = doc.to_deserializable().unwrap();
    assert_eq!(user, User { name: "Alice".to_string(), age: 30 });

    assert!(Document::from_serializable(&vec![1, 2]).is_err());
    assert_eq!(FirestoreValue::bytes(b"hi").value_type, ValueType::BytesValue("aGk=".to_string()));
}

#[tokio::test]
async fn test_get_document() {
    let server = MockServer::start();
    let firestore = firestore_for(&server);

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/projects/p/databases/(default)/documents/users/alice")
            .query_param("mask.fieldPaths", "name");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "name": "projects/p/databases/(default)/documents/users/alice",
                "fields": {
                    "name": { "stringValue": "Alice" },
                    "age": { "integerValue": "30" }
                },
                "createTime": "2021-01-01T00:00:00Z",
                "updateTime": "2021-01-01T00:00:00Z"
            }));
    });

    let doc = firestore
        .get_document("p", None::<&str>, "users/alice", "name", "", "")
        .await
        .unwrap();

    mock.assert();
    assert_eq!(doc.id(), "alice");
    assert_eq!(doc.update_time.as_deref(), Some("2021-01-01T00:00:00Z"));
    let user: User = doc.to_deserializable().unwrap();
    assert_eq!(user.age, 30);
}

#[tokio::test]
async fn test_create_document_posts_content() {
    let server = MockServer::start();
    let firestore = firestore_for(&server);

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/projects/p/databases/(default)/documents/users")
            .query_param("documentId", "alice")
            .header("content-type", "application/json")
            .json_body(json!({
                "fields": {
                    "name": { "stringValue": "Alice" },
                    "age": { "integerValue": "30" }
                }
            }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "name": "projects/p/databases/(default)/documents/users/alice",
                "fields": { "name": { "stringValue": "Alice" } }
            }));
    });

    let doc = firestore
        .create_document("p", "", String::from("users/alice"), &alice(), "")
        .await
        .unwrap();

    mock.assert();
    assert_eq!(doc.id(), "alice");
}

#[tokio::test]
async fn test_api_error_is_reported() {
    let server = MockServer::start();
    let firestore = firestore_for(&server);

    let _mock = server.mock(|when, then| {
        when.method(DELETE)
            .path("/v1/projects/p/databases/(default)/documents/users/ghost");
        then.status(404)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": {
                    "code": 404,
                    "message": "Document not found",
                    "status": "NOT_FOUND"
                }
            }));
    });

    let result = firestore.delete_document("p", "", "users/ghost", None).await;

    match result {
        Err(FirestoreError::ApiError(msg)) => assert!(msg.contains("Document not found")),
        other => panic!("Expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transaction_flow() {
    let server = MockServer::start();
    let firestore = firestore_for(&server);

    let begin_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/projects/p/databases/(default)/documents:beginTransaction")
            .json_body(json!({}));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "transaction": "trans123" }));
    });

    let commit_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/projects/p/databases/(default)/documents:commit")
            .body_includes("trans123");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "writeResults": [{ "updateTime": "2021-01-01T00:00:01Z" }],
                "commitTime": "2021-01-01T00:00:01Z"
            }));
    });

    let rollback_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/projects/p/databases/(default)/documents:rollback")
            .json_body(json!({ "transaction": "trans123" }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({}));
    });

    let transaction = firestore.begin_transaction("p", "", None).await.unwrap();
    assert_eq!(transaction.transaction, "trans123");

    let mut doc = alice();
    doc.name = "projects/p/databases/(default)/documents/users/alice".to_string();
    let result = firestore
        .commit_document("p", "", &[Write::update(doc)], &transaction.transaction)
        .await
        .unwrap();
    assert_eq!(result.write_results.len(), 1);
    assert_eq!(result.commit_time.as_deref(), Some("2021-01-01T00:00:01Z"));

    firestore.rollback("p", "", &transaction.transaction).await.unwrap();

    begin_mock.assert();
    commit_mock.assert();
    rollback_mock.assert();
}

#[tokio::test]
async fn test_commit_async_ignores_payload() {
    let server = MockServer::start();
    let firestore = firestore_for(&server);

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/projects/p/databases/(default)/documents:commit");
        then.status(200).body("not json");
    });

    firestore
        .commit_document_async("p", "", &[Write::delete("projects/p/databases/(default)/documents/users/bob")], "")
        .await
        .unwrap();

    mock.assert();
}

#[tokio::test]
async fn test_run_query_collects_documents() {
    let server = MockServer::start();
    let firestore = firestore_for(&server);

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/projects/p/databases/(default)/documents:runQuery")
            .body_includes("\"newTransaction\"");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([
                {
                    "transaction": "trans456",
                    "document": {
                        "name": "projects/p/databases/(default)/documents/users/alice",
                        "fields": { "age": { "integerValue": "30" } }
                    },
                    "readTime": "2021-01-01T00:00:00Z"
                },
                { "readTime": "2021-01-01T00:00:00Z" }
            ]));
    });

    let results = firestore
        .run_query(
            "p",
            "",
            "",
            Query::new("users").limit(1),
            &ConsistencySelector::NewTransaction(TransactionOptions::ReadWrite(ReadWrite::default())),
        )
        .await
        .unwrap();

    mock.assert();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].transaction.as_deref(), Some("trans456"));
    assert!(results[1].document.is_none());
}

#[tokio::test]
async fn test_list_documents_and_collection_ids() {
    let server = MockServer::start();
    let firestore = firestore_for(&server);

    let list_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/projects/p/databases/(default)/documents/users")
            .query_param("pageSize", "2");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "documents": [
                    { "name": "projects/p/databases/(default)/documents/users/alice", "fields": {} },
                    { "name": "projects/p/databases/(default)/documents/users/bob", "fields": {} }
                ],
                "nextPageToken": "page2"
            }));
    });

    let ids_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/projects/p/databases/(default)/documents/users/alice:listCollectionIds")
            .json_body(json!({ "pageSize": 10, "pageToken": "tok" }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "collectionIds": ["notes", "orders"] }));
    });

    let list = firestore
        .list_documents(
            "p",
            "",
            "users",
            &ListDocumentsOptions {
                page_size: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(list.documents.len(), 2);
    assert_eq!(list.next_page_token.as_deref(), Some("page2"));

    let ids = firestore
        .list_collection_ids("p", "", "users/alice", Some(10), "tok")
        .await
        .unwrap();
    assert_eq!(ids.collection_ids, vec!["notes".to_string(), "orders".to_string()]);
    assert!(ids.next_page_token.is_none());

    list_mock.assert();
    ids_mock.assert();
}

#[tokio::test]
async fn test_export_returns_operation() {
    let server = MockServer::start();
    let firestore = firestore_for(&server);

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/projects/p/databases/(default):exportDocuments")
            .json_body(json!({ "outputUriPrefix": "gs://bucket/backup" }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "name": "projects/p/databases/(default)/operations/op1",
                "metadata": { "operationState": "PROCESSING" }
            }));
    });

    let operation = firestore
        .export_documents("p", "", "bucket", "backup", "")
        .await
        .unwrap();

    mock.assert();
    assert_eq!(operation.name, "projects/p/databases/(default)/operations/op1");
    assert!(!operation.done);
}

#[test]
fn test_request_url_escapes_document_ids() {
    let base = "https://firestore.googleapis.com/v1";

    let get = request::get_document("p", "", "users/what?x#y", "", "", "");
    let url = get.url(base).unwrap();
    assert_eq!(
        url.path(),
        "/v1/projects/p/databases/(default)/documents/users/what%3Fx%23y"
    );
    assert!(url.query().is_none());
    assert!(url.fragment().is_none());

    let patch = request::patch_document("p", "", "users/100%", &alice(), "", "", None).unwrap();
    assert_eq!(
        patch.url(base).unwrap().path(),
        "/v1/projects/p/databases/(default)/documents/users/100%25"
    );

    let query = request::run_query(
        "p",
        "",
        "users/a?b",
        &StructuredQuery::default(),
        &ConsistencySelector::Undefined,
    )
    .unwrap();
    assert_eq!(
        query.url(base).unwrap().path(),
        "/v1/projects/p/databases/(default)/documents/users/a%3Fb:runQuery"
    );
}

#[test]
fn test_request_url_rejects_dot_segments() {
    let base = "https://firestore.googleapis.com/v1";

    let delete = request::delete_document("p", "", "users/../admins/root", None);
    assert!(matches!(
        delete.url(base),
        Err(FirestoreError::InvalidArgument(_))
    ));

    let get = request::get_document("p", "", "users/./alice", "", "", "");
    assert!(matches!(get.url(base), Err(FirestoreError::InvalidArgument(_))));

    let get = request::get_document("p", "", "users//alice", "", "", "");
    assert!(matches!(get.url(base), Err(FirestoreError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_delete_with_dot_segment_sends_nothing() {
    let server = MockServer::start();
    let firestore = firestore_for(&server);

    // Any request reaching the server would surface as an ApiError.
    let _mock = server.mock(|when, then| {
        when.method(DELETE);
        then.status(500);
    });

    let result = firestore
        .delete_document("p", "", "users/../admins/root", None)
        .await;

    assert!(matches!(result, Err(FirestoreError::InvalidArgument(_))));
}

#[test]
fn test_non_finite_doubles() {
    let nan: FirestoreValue = serde_json::from_value(json!({ "doubleValue": "NaN" })).unwrap();
    assert!(matches!(nan.value_type, ValueType::DoubleValue(d) if d.is_nan()));

    let neg: FirestoreValue =
        serde_json::from_value(json!({ "doubleValue": "-Infinity" })).unwrap();
    assert_eq!(neg.value_type, ValueType::DoubleValue(f64::NEG_INFINITY));

    let plain: FirestoreValue = serde_json::from_value(json!({ "doubleValue": 1.5 })).unwrap();
    assert_eq!(plain.value_type, ValueType::DoubleValue(1.5));

    assert_eq!(
        serde_json::to_value(FirestoreValue::double(f64::INFINITY)).unwrap(),
        json!({ "doubleValue": "Infinity" })
    );
    assert_eq!(
        serde_json::to_value(FirestoreValue::double(2.5)).unwrap(),
        json!({ "doubleValue": 2.5 })
    );
}

#[tokio::test]
async fn test_get_document_with_infinite_double() {
    let server = MockServer::start();
    let firestore = firestore_for(&server);

    let _mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/projects/p/databases/(default)/documents/metrics/m1");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "name": "projects/p/databases/(default)/documents/metrics/m1",
                "fields": {
                    "ceiling": { "doubleValue": "Infinity" },
                    "ratio": { "doubleValue": 0.25 }
                }
            }));
    });

    let doc = firestore
        .get_document("p", "", "metrics/m1", "", "", "")
        .await
        .unwrap();

    assert_eq!(
        doc.fields.get("ceiling").map(|v| &v.value_type),
        Some(&ValueType::DoubleValue(f64::INFINITY))
    );
    assert_eq!(
        doc.fields.get("ratio").map(|v| &v.value_type),
        Some(&ValueType::DoubleValue(0.25))
    );
}
