pub mod arg;
pub mod middleware;

use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use url::Url;

use self::middleware::AuthMiddleware;

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorResponse {
    pub error: FirebaseErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorDetails {
    pub code: u16,
    pub message: String,
    pub status: Option<String>,
    pub errors: Option<Vec<FirebaseSubError>>,
}

#[derive(Debug, Deserialize)]
pub struct FirebaseSubError {
    pub message: String,
    pub domain: Option<String>,
    pub reason: Option<String>,
}

impl FirebaseErrorResponse {
    pub fn display_message(&self) -> String {
        match &self.error.status {
            Some(status) => format!("{} (code: {}, status: {})", self.error.message, self.error.code, status),
            None => format!("{} (code: {})", self.error.message, self.error.code),
        }
    }
}

/// Turns a non-success response into a readable message, preferring Google's error envelope.
pub async fn parse_error_response(response: reqwest::Response, default_msg: &str) -> String {
    let status = response.status();
    match response.json::<FirebaseErrorResponse>().await {
        Ok(error_resp) => error_resp.display_message(),
        Err(_) => format!("{}: {}", default_msg, status),
    }
}

/// Appends `segments` to the path of `base_url`, percent-encoding each one.
///
/// `?`, `#`, `%` and `/` inside a segment are escaped, so a segment can never spill into the
/// query, the fragment or a neighbouring segment. `.` and `..` segments are skipped by the
/// encoder; callers that accept user paths must reject them first.
pub(crate) fn resource_url<'a>(
    base_url: &str,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base_url)?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Builds the HTTP session shared by the service clients: transient retries, then auth.
pub(crate) fn build_client(middleware: AuthMiddleware) -> ClientWithMiddleware {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

    ClientBuilder::new(Client::new())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .with(middleware)
        .build()
}
