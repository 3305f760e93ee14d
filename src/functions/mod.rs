//! Cloud Functions IAM module.
//!
//! This module builds IAM policies for Cloud Functions ([`policy`]) and reads or writes them
//! through the Cloud Functions v1 REST API.
//!
//! # Optimistic Concurrency
//!
//! The policy returned by [`FirebaseFunctions::get_iam_policy`] carries an etag. Rebuild it with
//! [`PolicyBuilder::from_policy`], change it, and pass it to [`FirebaseFunctions::set_iam_policy`].
//! If the policy changed on the server in the meantime, the write fails.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use firebase_rest_sdk::FirebaseApp;
//! # use firebase_rest_sdk::functions::policy::{Binding, PolicyBuilder};
//! # async fn run(app: FirebaseApp) -> Result<(), Box<dyn std::error::Error>> {
//! let functions = app.functions();
//! let current = functions.get_iam_policy("my-project", "us-central1", "hello", Some(3)).await?;
//!
//! let mut policy = PolicyBuilder::from_policy(&current);
//! let mut binding = Binding::new();
//! binding.set_role("roles/cloudfunctions.invoker");
//! binding.add_member("allUsers");
//! policy.add_binding(&mut binding, true);
//!
//! functions.set_iam_policy("my-project", "us-central1", "hello", &policy, "").await?;
//! # Ok(())
//! # }
//! ```

pub mod models;
pub mod policy;


use crate::core::arg::StringArg;
use crate::core::middleware::AuthMiddleware;
use crate::core::{build_client, parse_error_response, resource_url};
use self::models::{Policy, TestIamPermissionsRequest, TestIamPermissionsResponse};
use self::policy::PolicyBuilder;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

const FUNCTIONS_V1_API: &str = "https://cloudfunctions.googleapis.com/v1";

/// Errors that can occur during Cloud Functions operations.
#[derive(Error, Debug)]
pub enum FunctionsError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Cloud Functions API.
    #[error("API error: {0}")]
    ApiError(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    /// The request URL could not be built.
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

/// Client for the IAM endpoints of Cloud Functions.
pub struct FirebaseFunctions {
    client: ClientWithMiddleware,
    base_url: String,
}

impl FirebaseFunctions {
    /// Creates a new `FirebaseFunctions` instance.
    ///
    /// This is typically called via `FirebaseApp::functions()`.
    pub fn new(middleware: AuthMiddleware) -> Self {
        Self::new_with_url(middleware, FUNCTIONS_V1_API.to_string())
    }

    /// Creates a new `FirebaseFunctions` instance with a custom base URL.
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

    fn function_url(
        &self,
        project_id: &str,
        location_id: &str,
        function_id: &str,
        method: &str,
    ) -> Result<Url, FunctionsError> {
        let function = format!("{}:{}", function_id, method);
        Ok(resource_url(
            &self.base_url,
            [
                "projects",
                project_id,
                "locations",
                location_id,
                "functions",
                function.as_str(),
            ],
        )?)
    }

    /// Gets the IAM policy of a function.
    ///
    /// # Arguments
    ///
    /// * `requested_policy_version` - The maximum policy version to format the result with.
    ///   Policies with conditional bindings require `3`.
    pub async fn get_iam_policy(
        &self,
        project_id: impl StringArg,
        location_id: impl StringArg,
        function_id: impl StringArg,
        requested_policy_version: Option<i32>,
    ) -> Result<Policy, FunctionsError> {
        let mut url = self.function_url(
            &project_id.to_arg(),
            &location_id.to_arg(),
            &function_id.to_arg(),
            "getIamPolicy",
        )?;
        if let Some(version) = requested_policy_version {
            url.query_pairs_mut()
                .append_pair("options.requestedPolicyVersion", &version.to_string());
        }

        tracing::debug!(%url, "GET getIamPolicy");
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "getIamPolicy failed");
            return Err(FunctionsError::ApiError(
                parse_error_response(response, "Get IAM policy failed").await,
            ));
        }

        Ok(response.json().await?)
    }

    /// Replaces the IAM policy of a function.
    ///
    /// # Arguments
    ///
    /// * `policy` - The complete policy to apply. Include the etag of the policy it was derived
    ///   from to avoid overwriting concurrent changes.
    /// * `update_mask` - Comma separated policy fields to modify, e.g. `bindings,etag`. Empty
    ///   means `bindings, etag`.
    pub async fn set_iam_policy(
        &self,
        project_id: impl StringArg,
        location_id: impl StringArg,
        function_id: impl StringArg,
        policy: &PolicyBuilder,
        update_mask: impl StringArg,
    ) -> Result<Policy, FunctionsError> {
        let url = self.function_url(
            &project_id.to_arg(),
            &location_id.to_arg(),
            &function_id.to_arg(),
            "setIamPolicy",
        )?;

        let mut body = Map::new();
        body.insert("policy".to_string(), policy.to_json());
        let update_mask = update_mask.to_arg();
        if !update_mask.is_empty() {
            body.insert("updateMask".to_string(), Value::String(update_mask.into_owned()));
        }

        tracing::debug!(%url, "POST setIamPolicy");
        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&Value::Object(body))?)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "setIamPolicy failed");
            return Err(FunctionsError::ApiError(
                parse_error_response(response, "Set IAM policy failed").await,
            ));
        }

        Ok(response.json().await?)
    }

    /// Returns the subset of `permissions` the caller holds on a function.
    pub async fn test_iam_permissions(
        &self,
        project_id: impl StringArg,
        location_id: impl StringArg,
        function_id: impl StringArg,
        permissions: &[&str],
    ) -> Result<Vec<String>, FunctionsError> {
        let url = self.function_url(
            &project_id.to_arg(),
            &location_id.to_arg(),
            &function_id.to_arg(),
            "testIamPermissions",
        )?;

        let request = TestIamPermissionsRequest { permissions };

        tracing::debug!(%url, "POST testIamPermissions");
        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "testIamPermissions failed");
            return Err(FunctionsError::ApiError(
                parse_error_response(response, "Test IAM permissions failed").await,
            ));
        }

        let result: TestIamPermissionsResponse = response.json().await?;
        Ok(result.permissions)
    }
}
