//! Request descriptors for the Firestore REST operations.
//!
//! Each builder turns already-coerced arguments into one [`FirestoreRequest`]. Nothing here
//! touches the network; [`FirebaseFirestore::dispatch`](super::FirebaseFirestore::dispatch)
//! performs the exchange.

use super::models::{
    ConsistencySelector, Document, Precondition, StructuredQuery, TransactionOptions, Write,
};
use super::FirestoreError;
use crate::core::arg::split_list;
use crate::core::resource_url;
use reqwest::Method;
use serde_json::{json, Map, Value};
use url::Url;

/// One Firestore REST call: method, resource path, query parameters and JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct FirestoreRequest {
    /// Operation name, used in logs and error messages.
    pub operation: &'static str,
    pub method: Method,
    /// Resource path relative to the API base, e.g. `projects/p/databases/(default)/documents/users`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Send without reading the response payload.
    pub detached: bool,
}

impl FirestoreRequest {
    fn new(operation: &'static str, method: Method, path: String) -> Self {
        Self {
            operation,
            method,
            path,
            query: Vec::new(),
            body: None,
            detached: false,
        }
    }

    fn param(mut self, key: &str, value: &str) -> Self {
        if !value.is_empty() {
            self.query.push((key.to_string(), value.to_string()));
        }
        self
    }

    /// One parameter per entry of a comma separated list.
    fn list_param(mut self, key: &str, values: &str) -> Self {
        for value in split_list(values) {
            self.query.push((key.to_string(), value.to_string()));
        }
        self
    }

    fn precondition(self, precondition: Option<&Precondition>) -> Self {
        match precondition {
            Some(p) => self
                .param(
                    "currentDocument.exists",
                    &p.exists.map(|e| e.to_string()).unwrap_or_default(),
                )
                .param(
                    "currentDocument.updateTime",
                    p.update_time.as_deref().unwrap_or_default(),
                ),
            None => self,
        }
    }

    fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Resolves the full URL against the API base. Each path segment is percent-encoded.
    ///
    /// Empty, `.` and `..` segments are rejected: they are not valid Firestore ids and would
    /// otherwise address a different resource.
    pub fn url(&self, base_url: &str) -> Result<Url, FirestoreError> {
        if let Some(segment) = self
            .path
            .split('/')
            .find(|s| matches!(*s, "" | "." | ".."))
        {
            return Err(FirestoreError::InvalidArgument(format!(
                "Invalid segment '{}' in path '{}'",
                segment, self.path
            )));
        }

        let mut url = resource_url(base_url, self.path.split('/'))?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        Ok(url)
    }
}

/// `projects/{project}/databases/{database}`; an empty database id means `(default)`.
pub fn database_path(project_id: &str, database_id: &str) -> String {
    let database_id = if database_id.is_empty() {
        "(default)"
    } else {
        database_id
    };
    format!("projects/{}/databases/{}", project_id, database_id)
}

fn documents_path(project_id: &str, database_id: &str, path: &str) -> String {
    let root = format!("{}/documents", database_path(project_id, database_id));
    match path.trim_matches('/') {
        "" => root,
        path => format!("{}/{}", root, path),
    }
}

fn uri_prefix(bucket_id: &str, storage_path: &str) -> String {
    format!("gs://{}/{}", bucket_id, storage_path.trim_start_matches('/'))
}

fn collection_ids(values: &str) -> Vec<Value> {
    split_list(values).map(|s| Value::String(s.to_string())).collect()
}

fn transfer_body(prefix_key: &str, prefix: String, ids: &str) -> Value {
    let mut body = Map::new();
    body.insert(prefix_key.to_string(), Value::String(prefix));
    let ids = collection_ids(ids);
    if !ids.is_empty() {
        body.insert("collectionIds".to_string(), Value::Array(ids));
    }
    Value::Object(body)
}

pub(crate) fn export_documents(
    project_id: &str,
    database_id: &str,
    bucket_id: &str,
    storage_path: &str,
    ids: &str,
) -> FirestoreRequest {
    FirestoreRequest::new(
        "exportDocuments",
        Method::POST,
        format!("{}:exportDocuments", database_path(project_id, database_id)),
    )
    .body(transfer_body("outputUriPrefix", uri_prefix(bucket_id, storage_path), ids))
}

pub(crate) fn import_documents(
    project_id: &str,
    database_id: &str,
    bucket_id: &str,
    storage_path: &str,
    ids: &str,
) -> FirestoreRequest {
    FirestoreRequest::new(
        "importDocuments",
        Method::POST,
        format!("{}:importDocuments", database_path(project_id, database_id)),
    )
    .body(transfer_body("inputUriPrefix", uri_prefix(bucket_id, storage_path), ids))
}

/// Creates the document at `document_path`; the last segment becomes the document id.
pub(crate) fn create_document(
    project_id: &str,
    database_id: &str,
    document_path: &str,
    content: &Document,
    mask: &str,
) -> Result<FirestoreRequest, FirestoreError> {
    let (collection, document_id) = document_path
        .trim_matches('/')
        .rsplit_once('/')
        .ok_or_else(|| {
            FirestoreError::InvalidArgument(format!(
                "Document path '{}' has no parent collection",
                document_path
            ))
        })?;

    create_document_in(project_id, database_id, collection, document_id, content, mask)
}

/// Creates a document in `collection_id`; an empty `document_id` lets the server pick one.
pub(crate) fn create_document_in(
    project_id: &str,
    database_id: &str,
    collection_id: &str,
    document_id: &str,
    content: &Document,
    mask: &str,
) -> Result<FirestoreRequest, FirestoreError> {
    Ok(FirestoreRequest::new(
        "createDocument",
        Method::POST,
        documents_path(project_id, database_id, collection_id),
    )
    .param("documentId", document_id)
    .list_param("mask.fieldPaths", mask)
    .body(serde_json::to_value(content)?))
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn patch_document(
    project_id: &str,
    database_id: &str,
    document_path: &str,
    content: &Document,
    update_mask: &str,
    mask: &str,
    precondition: Option<&Precondition>,
) -> Result<FirestoreRequest, FirestoreError> {
    Ok(FirestoreRequest::new(
        "patchDocument",
        Method::PATCH,
        documents_path(project_id, database_id, document_path),
    )
    .list_param("updateMask.fieldPaths", update_mask)
    .list_param("mask.fieldPaths", mask)
    .precondition(precondition)
    .body(serde_json::to_value(content)?))
}

pub(crate) fn commit_document(
    project_id: &str,
    database_id: &str,
    writes: &[Write],
    transaction: &str,
    detached: bool,
) -> Result<FirestoreRequest, FirestoreError> {
    let mut body = Map::new();
    body.insert("writes".to_string(), serde_json::to_value(writes)?);
    if !transaction.is_empty() {
        body.insert("transaction".to_string(), Value::String(transaction.to_string()));
    }

    let mut request = FirestoreRequest::new(
        "commit",
        Method::POST,
        format!("{}:commit", documents_path(project_id, database_id, "")),
    )
    .body(Value::Object(body));
    request.detached = detached;
    Ok(request)
}

pub(crate) fn get_document(
    project_id: &str,
    database_id: &str,
    document_path: &str,
    mask: &str,
    transaction: &str,
    read_time: &str,
) -> FirestoreRequest {
    FirestoreRequest::new(
        "getDocument",
        Method::GET,
        documents_path(project_id, database_id, document_path),
    )
    .list_param("mask.fieldPaths", mask)
    .param("transaction", transaction)
    .param("readTime", read_time)
}

pub(crate) fn begin_transaction(
    project_id: &str,
    database_id: &str,
    options: Option<&TransactionOptions>,
) -> Result<FirestoreRequest, FirestoreError> {
    let body = match options {
        Some(options) => json!({ "options": options }),
        None => json!({}),
    };

    Ok(FirestoreRequest::new(
        "beginTransaction",
        Method::POST,
        format!("{}:beginTransaction", documents_path(project_id, database_id, "")),
    )
    .body(body))
}

pub(crate) fn rollback(project_id: &str, database_id: &str, transaction: &str) -> FirestoreRequest {
    FirestoreRequest::new(
        "rollback",
        Method::POST,
        format!("{}:rollback", documents_path(project_id, database_id, "")),
    )
    .body(json!({ "transaction": transaction }))
}

pub(crate) fn run_query(
    project_id: &str,
    database_id: &str,
    document_path: &str,
    structured_query: &StructuredQuery,
    consistency: &ConsistencySelector,
) -> Result<FirestoreRequest, FirestoreError> {
    let mut body = Map::new();
    body.insert("structuredQuery".to_string(), serde_json::to_value(structured_query)?);
    match consistency {
        ConsistencySelector::Undefined => {}
        ConsistencySelector::Transaction(transaction) => {
            body.insert("transaction".to_string(), Value::String(transaction.clone()));
        }
        ConsistencySelector::NewTransaction(options) => {
            body.insert("newTransaction".to_string(), serde_json::to_value(options)?);
        }
        ConsistencySelector::ReadTime(read_time) => {
            body.insert("readTime".to_string(), Value::String(read_time.clone()));
        }
    }

    Ok(FirestoreRequest::new(
        "runQuery",
        Method::POST,
        format!("{}:runQuery", documents_path(project_id, database_id, document_path)),
    )
    .body(Value::Object(body)))
}

pub(crate) fn delete_document(
    project_id: &str,
    database_id: &str,
    document_path: &str,
    precondition: Option<&Precondition>,
) -> FirestoreRequest {
    FirestoreRequest::new(
        "deleteDocument",
        Method::DELETE,
        documents_path(project_id, database_id, document_path),
    )
    .precondition(precondition)
}

/// Optional parameters of [`FirebaseFirestore::list_documents`](super::FirebaseFirestore::list_documents).
#[derive(Debug, Clone, Default)]
pub struct ListDocumentsOptions {
    /// Maximum number of documents to return.
    pub page_size: Option<usize>,
    /// The `nextPageToken` of a previous list call.
    pub page_token: Option<String>,
    /// Sort order, e.g. `priority desc, name`.
    pub order_by: Option<String>,
    /// Comma separated fields to return; all fields when unset.
    pub mask: Option<String>,
    /// Also list missing documents, i.e. documents that do not exist but have sub-documents.
    pub show_missing: bool,
}

pub(crate) fn list_documents(
    project_id: &str,
    database_id: &str,
    collection_id: &str,
    options: &ListDocumentsOptions,
) -> FirestoreRequest {
    let request = FirestoreRequest::new(
        "listDocuments",
        Method::GET,
        documents_path(project_id, database_id, collection_id),
    )
    .param(
        "pageSize",
        &options.page_size.map(|s| s.to_string()).unwrap_or_default(),
    )
    .param("pageToken", options.page_token.as_deref().unwrap_or_default())
    .param("orderBy", options.order_by.as_deref().unwrap_or_default())
    .list_param("mask.fieldPaths", options.mask.as_deref().unwrap_or_default());

    if options.show_missing {
        request.param("showMissing", "true")
    } else {
        request
    }
}

pub(crate) fn list_collection_ids(
    project_id: &str,
    database_id: &str,
    document_path: &str,
    page_size: Option<usize>,
    page_token: &str,
) -> FirestoreRequest {
    let mut body = Map::new();
    if let Some(size) = page_size {
        body.insert("pageSize".to_string(), Value::from(size));
    }
    if !page_token.is_empty() {
        body.insert("pageToken".to_string(), Value::String(page_token.to_string()));
    }

    FirestoreRequest::new(
        "listCollectionIds",
        Method::POST,
        format!(
            "{}:listCollectionIds",
            documents_path(project_id, database_id, document_path)
        ),
    )
    .body(Value::Object(body))
}
