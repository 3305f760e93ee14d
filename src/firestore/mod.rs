//! Cloud Firestore module.
//!
//! [`FirebaseFirestore`] exposes the Firestore v1 REST operations: export/import, document CRUD,
//! transactions, queries and listing. Every operation builds a [`FirestoreRequest`] from its
//! arguments (see [`request`]) and hands it to [`FirebaseFirestore::dispatch`], which performs the
//! HTTP exchange and returns the response payload.
//!
//! Project and database ids are given per call; an empty database id means `(default)`.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use firebase_rest_sdk::FirebaseApp;
//! # use firebase_rest_sdk::firestore::models::Document;
//! # use serde_json::json;
//! # async fn run(app: FirebaseApp) -> Result<(), Box<dyn std::error::Error>> {
//! let firestore = app.firestore();
//! let content = Document::from_serializable(&json!({ "name": "Alice", "age": 30 }))?;
//!
//! firestore.create_document("my-project", "", "users/alice", &content, "").await?;
//! let doc = firestore.get_document("my-project", "", "users/alice", "name", "", "").await?;
//! # Ok(())
//! # }
//! ```

pub mod models;
pub mod query;
pub mod request;
pub mod value;

#[cfg(test)]
mod tests;

use self::models::{
    BeginTransactionResponse, CommitResponse, ConsistencySelector, Document,
    ListCollectionIdsResponse, ListDocumentsResponse, Operation, Precondition, RunQueryResponse,
    StructuredQuery, TransactionOptions, Write,
};
use self::request::{FirestoreRequest, ListDocumentsOptions};
use crate::core::arg::StringArg;
use crate::core::middleware::AuthMiddleware;
use crate::core::{build_client, parse_error_response};
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

const FIRESTORE_V1_API: &str = "https://firestore.googleapis.com/v1";

/// Errors that can occur during Firestore operations.
#[derive(Error, Debug)]
pub enum FirestoreError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Firestore API.
    #[error("API error: {0}")]
    ApiError(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    /// An argument cannot be turned into a request.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The request URL could not be built.
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

/// Client for interacting with Cloud Firestore.
pub struct FirebaseFirestore {
    client: ClientWithMiddleware,
    base_url: String,
}

impl FirebaseFirestore {
    /// Creates a new `FirebaseFirestore` instance.
    ///
    /// This is typically called via `FirebaseApp::firestore()`.
    pub fn new(middleware: AuthMiddleware) -> Self {
        Self::new_with_url(middleware, FIRESTORE_V1_API.to_string())
    }

    /// Creates a new `FirebaseFirestore` instance with a custom base URL (e.g. an emulator).
    pub fn new_with_url(middleware: AuthMiddleware, base_url: String) -> Self {
        Self {
            client: build_client(middleware),
            base_url,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_with_client(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Sends a request and returns its JSON payload.
    ///
    /// Detached requests only check the status and return `Value::Null`. An empty response
    /// body is also returned as `Value::Null`.
    pub async fn dispatch(&self, request: FirestoreRequest) -> Result<Value, FirestoreError> {
        let url = request.url(&self.base_url)?;
        tracing::debug!(operation = request.operation, method = %request.method, %url, "dispatching Firestore request");

        let mut builder = self.client.request(request.method.clone(), url);
        if let Some(body) = &request.body {
            builder = builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            tracing::warn!(operation = request.operation, status = %response.status(), "Firestore request failed");
            let default_msg = format!("{} failed", request.operation);
            return Err(FirestoreError::ApiError(
                parse_error_response(response, &default_msg).await,
            ));
        }

        if request.detached {
            return Ok(Value::Null);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn dispatch_as<T: DeserializeOwned>(
        &self,
        request: FirestoreRequest,
    ) -> Result<T, FirestoreError> {
        let payload = self.dispatch(request).await?;
        Ok(serde_json::from_value(payload)?)
    }

    /// Exports documents to a Cloud Storage bucket.
    ///
    /// # Arguments
    ///
    /// * `bucket_id` - The storage bucket, e.g. `my-project.appspot.com`.
    /// * `storage_path` - The path in the bucket to export to.
    /// * `collection_ids` - Comma separated collection ids to export; empty means all.
    ///
    /// Requires OAuth2 (service account) authentication.
    pub async fn export_documents(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        bucket_id: impl StringArg,
        storage_path: impl StringArg,
        collection_ids: impl StringArg,
    ) -> Result<Operation, FirestoreError> {
        let request = request::export_documents(
            &project_id.to_arg(),
            &database_id.to_arg(),
            &bucket_id.to_arg(),
            &storage_path.to_arg(),
            &collection_ids.to_arg(),
        );
        self.dispatch_as(request).await
    }

    /// Imports documents previously exported to a Cloud Storage bucket.
    ///
    /// `collection_ids` is comma separated; empty means every collection in the export.
    pub async fn import_documents(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        bucket_id: impl StringArg,
        storage_path: impl StringArg,
        collection_ids: impl StringArg,
    ) -> Result<Operation, FirestoreError> {
        let request = request::import_documents(
            &project_id.to_arg(),
            &database_id.to_arg(),
            &bucket_id.to_arg(),
            &storage_path.to_arg(),
            &collection_ids.to_arg(),
        );
        self.dispatch_as(request).await
    }

    /// Creates a document at `document_path` (e.g. `users/alice`).
    ///
    /// `mask` lists the fields to return, comma separated; empty returns all fields.
    pub async fn create_document(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        document_path: impl StringArg,
        content: &Document,
        mask: impl StringArg,
    ) -> Result<Document, FirestoreError> {
        let request = request::create_document(
            &project_id.to_arg(),
            &database_id.to_arg(),
            &document_path.to_arg(),
            content,
            &mask.to_arg(),
        )?;
        self.dispatch_as(request).await
    }

    /// Creates a document in `collection_id`. An empty `document_id` lets Firestore assign one.
    pub async fn create_document_in(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        collection_id: impl StringArg,
        document_id: impl StringArg,
        content: &Document,
        mask: impl StringArg,
    ) -> Result<Document, FirestoreError> {
        let request = request::create_document_in(
            &project_id.to_arg(),
            &database_id.to_arg(),
            &collection_id.to_arg(),
            &document_id.to_arg(),
            content,
            &mask.to_arg(),
        )?;
        self.dispatch_as(request).await
    }

    /// Patches (or creates) the document at `document_path`.
    ///
    /// # Arguments
    ///
    /// * `update_mask` - Comma separated fields to update. Fields in the mask but missing from
    ///   `content` are deleted; fields outside the mask are left unchanged. Empty replaces the
    ///   whole document.
    /// * `mask` - Comma separated fields to return.
    /// * `precondition` - Require the document to exist (or not), or to have a given update time.
    #[allow(clippy::too_many_arguments)]
    pub async fn patch_document(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        document_path: impl StringArg,
        content: &Document,
        update_mask: impl StringArg,
        mask: impl StringArg,
        precondition: Option<&Precondition>,
    ) -> Result<Document, FirestoreError> {
        let request = request::patch_document(
            &project_id.to_arg(),
            &database_id.to_arg(),
            &document_path.to_arg(),
            content,
            &update_mask.to_arg(),
            &mask.to_arg(),
            precondition,
        )?;
        self.dispatch_as(request).await
    }

    /// Commits writes atomically, optionally as the end of `transaction` (base64 id).
    pub async fn commit_document(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        writes: &[Write],
        transaction: impl StringArg,
    ) -> Result<CommitResponse, FirestoreError> {
        let request = request::commit_document(
            &project_id.to_arg(),
            &database_id.to_arg(),
            writes,
            &transaction.to_arg(),
            false,
        )?;
        self.dispatch_as(request).await
    }

    /// Like [`commit_document`](Self::commit_document), but does not read the response payload.
    pub async fn commit_document_async(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        writes: &[Write],
        transaction: impl StringArg,
    ) -> Result<(), FirestoreError> {
        let request = request::commit_document(
            &project_id.to_arg(),
            &database_id.to_arg(),
            writes,
            &transaction.to_arg(),
            true,
        )?;
        self.dispatch(request).await?;
        Ok(())
    }

    /// Gets the document at `document_path`.
    ///
    /// # Arguments
    ///
    /// * `mask` - Comma separated fields to return.
    /// * `transaction` - Read within this transaction (base64 id).
    /// * `read_time` - Read the document as of this RFC3339 time (at most 270 seconds old).
    pub async fn get_document(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        document_path: impl StringArg,
        mask: impl StringArg,
        transaction: impl StringArg,
        read_time: impl StringArg,
    ) -> Result<Document, FirestoreError> {
        let request = request::get_document(
            &project_id.to_arg(),
            &database_id.to_arg(),
            &document_path.to_arg(),
            &mask.to_arg(),
            &transaction.to_arg(),
            &read_time.to_arg(),
        );
        self.dispatch_as(request).await
    }

    /// Starts a new transaction and returns its id.
    pub async fn begin_transaction(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        options: Option<&TransactionOptions>,
    ) -> Result<BeginTransactionResponse, FirestoreError> {
        let request =
            request::begin_transaction(&project_id.to_arg(), &database_id.to_arg(), options)?;
        self.dispatch_as(request).await
    }

    /// Rolls back a transaction.
    pub async fn rollback(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        transaction: impl StringArg,
    ) -> Result<(), FirestoreError> {
        let request = request::rollback(
            &project_id.to_arg(),
            &database_id.to_arg(),
            &transaction.to_arg(),
        );
        self.dispatch(request).await?;
        Ok(())
    }

    /// Runs a structured query under `document_path` (empty for the database root).
    ///
    /// `query` can be a [`query::Query`] or a raw [`StructuredQuery`].
    pub async fn run_query(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        document_path: impl StringArg,
        query: impl Into<StructuredQuery>,
        consistency: &ConsistencySelector,
    ) -> Result<Vec<RunQueryResponse>, FirestoreError> {
        let request = request::run_query(
            &project_id.to_arg(),
            &database_id.to_arg(),
            &document_path.to_arg(),
            &query.into(),
            consistency,
        )?;
        self.dispatch_as(request).await
    }

    /// Deletes the document at `document_path`.
    pub async fn delete_document(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        document_path: impl StringArg,
        precondition: Option<&Precondition>,
    ) -> Result<(), FirestoreError> {
        let request = request::delete_document(
            &project_id.to_arg(),
            &database_id.to_arg(),
            &document_path.to_arg(),
            precondition,
        );
        self.dispatch(request).await?;
        Ok(())
    }

    /// Lists the documents of a collection.
    pub async fn list_documents(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        collection_id: impl StringArg,
        options: &ListDocumentsOptions,
    ) -> Result<ListDocumentsResponse, FirestoreError> {
        let request = request::list_documents(
            &project_id.to_arg(),
            &database_id.to_arg(),
            &collection_id.to_arg(),
            options,
        );
        self.dispatch_as(request).await
    }

    /// Lists the collection ids under `document_path` (empty for the root collections).
    pub async fn list_collection_ids(
        &self,
        project_id: impl StringArg,
        database_id: impl StringArg,
        document_path: impl StringArg,
        page_size: Option<usize>,
        page_token: impl StringArg,
    ) -> Result<ListCollectionIdsResponse, FirestoreError> {
        let request = request::list_collection_ids(
            &project_id.to_arg(),
            &database_id.to_arg(),
            &document_path.to_arg(),
            page_size,
            &page_token.to_arg(),
        );
        self.dispatch_as(request).await
    }
}
