//! Firebase REST client.
//!
//! - [`firestore`]: Cloud Firestore REST operations (documents, transactions, queries,
//!   export/import).
//! - [`functions`]: Cloud Functions IAM policies, with a builder for the policy JSON.
//!
//! Clients authenticate with a service account key; see [`FirebaseApp`].

pub mod core;
#[cfg(feature = "firestore")]
pub mod firestore;
#[cfg(feature = "functions")]
pub mod functions;

pub use yup_oauth2;

use crate::core::middleware::AuthMiddleware;
#[cfg(feature = "firestore")]
use firestore::FirebaseFirestore;
#[cfg(feature = "functions")]
use functions::FirebaseFunctions;
use std::path::Path;
use yup_oauth2::ServiceAccountKey;

/// Entry point holding the service account credentials shared by the service clients.
pub struct FirebaseApp {
    middleware: AuthMiddleware,
}

impl FirebaseApp {
    pub fn new(service_account_key: ServiceAccountKey) -> Self {
        Self {
            middleware: AuthMiddleware::new(service_account_key),
        }
    }

    /// Reads a service account key JSON file, as downloaded from the Google Cloud console.
    pub async fn from_key_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let key = yup_oauth2::read_service_account_key(path).await?;
        Ok(Self::new(key))
    }

    /// The project id of the service account key, or an empty string.
    pub fn project_id(&self) -> &str {
        self.middleware.project_id()
    }

    #[cfg(feature = "firestore")]
    pub fn firestore(&self) -> FirebaseFirestore {
        FirebaseFirestore::new(self.middleware.clone())
    }

    #[cfg(feature = "functions")]
    pub fn functions(&self) -> FirebaseFunctions {
        FirebaseFunctions::new(self.middleware.clone())
    }
}
