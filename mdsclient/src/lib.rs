/*!
`mdsclient` provides high-level methods to interact with the GCE metadata server.

The metadata server is only reachable from within the hosting VM, at a fixed
hostname.  Every request carries the required `Metadata-Flavor: Google` header
and a bounded timeout; responses are plain-text bodies.

Each public method is explicitly targeted and returns a `String` or decoded
JSON.  For example, if we need a piece of metadata, like the project ID, a
method `fetch_project_id` will send a request to:

`http://metadata.google.internal/computeMetadata/v1/project/project-id`

The result is returned as a `String` _(ex. my-project-123456)_.

There is deliberately no retry: the caller is a single-shot bootstrap, and a
failed fetch means the VM is torn down and recreated rather than repaired.
*/

#![deny(rust_2018_idioms)]

use log::debug;
use serde_json::Value;
use snafu::{OptionExt, ResultExt};
use std::time::Duration;

const BASE_URI: &str = "http://metadata.google.internal";
const METADATA_PREFIX: &str = "computeMetadata/v1";
const SECRETS_BASE_URI: &str = "https://secretmanager.googleapis.com/v1";

const FLAVOR_HEADER: &str = "Metadata-Flavor";
const FLAVOR_VALUE: &str = "Google";

// The instance attribute holding the runner's just-in-time configuration.
const JIT_CONFIG_TARGET: &str = "instance/attributes/JIT_CONFIG";

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const SECRETS_TIMEOUT: Duration = Duration::from_secs(30);

/// A client for making metadata server queries.
/// The underlying HTTP client is reused between helper functions.
pub struct Client {
    client: reqwest::Client,
    base_uri: String,
    secrets_base_uri: String,
}

impl Client {
    pub fn new() -> Self {
        Self::new_impl(BASE_URI.to_string(), SECRETS_BASE_URI.to_string())
    }

    /// Points the client at an alternate metadata endpoint, for tests and
    /// local development outside a VM.
    pub fn new_with_base_uri(base_uri: String) -> Self {
        Self::new_impl(base_uri, SECRETS_BASE_URI.to_string())
    }

    fn new_impl(base_uri: String, secrets_base_uri: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_uri,
            secrets_base_uri,
        }
    }

    /// Gets the project ID the instance belongs to.
    pub async fn fetch_project_id(&self) -> Result<String> {
        let project_id = self.fetch_metadata("project/project-id").await?;
        let project_id = project_id.trim().to_string();
        debug!("Retrieved project ID: {}", project_id);
        Ok(project_id)
    }

    /// Gets the full zone path of the instance.
    /// Zone format: `projects/12345/zones/us-central1-a`
    pub async fn fetch_zone(&self) -> Result<String> {
        let zone = self.fetch_metadata("instance/zone").await?;
        let zone = zone.trim().to_string();
        debug!("Retrieved zone: {}", zone);
        Ok(zone)
    }

    /// Gets the region the instance runs in, derived from its zone.
    pub async fn fetch_region(&self) -> Result<String> {
        let zone = self.fetch_zone().await?;
        Ok(region_from_zone(&zone))
    }

    /// Gets the runner's just-in-time configuration from the `JIT_CONFIG`
    /// instance attribute.  The value is an opaque credential blob and must
    /// not be logged.
    pub async fn fetch_jit_config(&self) -> Result<String> {
        self.fetch_metadata(JIT_CONFIG_TARGET).await
    }

    /// Gets an OAuth2 access token for the instance's default service
    /// account.  The token must not be logged.
    pub async fn fetch_access_token(&self) -> Result<String> {
        let body = self
            .fetch_metadata("instance/service-accounts/default/token")
            .await?;
        let token_response: Value = serde_json::from_str(&body).context(error::SerdeSnafu)?;
        token_response
            .get("access_token")
            .and_then(|value| value.as_str())
            .map(|token| token.to_string())
            .context(error::MissingFieldSnafu {
                field: "access_token",
            })
    }

    /// Fetches a secret from Secret Manager and decodes its payload, which is
    /// expected to be a base64-encoded JSON document.
    pub async fn fetch_secret(
        &self,
        secret_name: &str,
        project_id: &str,
        access_token: &str,
    ) -> Result<Value> {
        let uri = format!(
            "{}/projects/{}/secrets/{}/versions/latest:access",
            self.secrets_base_uri, project_id, secret_name
        );
        let response = self
            .client
            .get(&uri)
            .header("Authorization", format!("Bearer {}", access_token))
            .timeout(SECRETS_TIMEOUT)
            .send()
            .await
            .context(error::RequestSnafu {
                method: "GET",
                uri: &uri,
            })?;
        let body = read_body("GET", &uri, response).await?;

        let secret_response: Value = serde_json::from_str(&body).context(error::SerdeSnafu)?;
        let data = secret_response
            .pointer("/payload/data")
            .and_then(|value| value.as_str())
            .context(error::MissingFieldSnafu {
                field: "payload.data",
            })?;
        let payload = base64::decode(data).context(error::Base64DecodeSnafu)?;
        let payload = String::from_utf8(payload).context(error::NonUtf8ResponseSnafu)?;
        debug!("Successfully fetched secret: {}", secret_name);
        serde_json::from_str(&payload).context(error::SerdeSnafu)
    }

    /// Fetch a plain-text value from the metadata server.
    async fn fetch_metadata<S>(&self, target: S) -> Result<String>
    where
        S: AsRef<str>,
    {
        let uri = format!("{}/{}/{}", self.base_uri, METADATA_PREFIX, target.as_ref());
        debug!("Requesting {}", &uri);
        let response = self
            .client
            .get(&uri)
            .header(FLAVOR_HEADER, FLAVOR_VALUE)
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .context(error::RequestSnafu {
                method: "GET",
                uri: &uri,
            })?;
        read_body("GET", &uri, response).await
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks the response status and returns the body, turning any non-2xx
/// response into an error that carries a printable copy of the body.
async fn read_body(method: &str, uri: &str, response: reqwest::Response) -> Result<String> {
    let code = response.status();
    if code.is_success() {
        let body = response
            .bytes()
            .await
            .context(error::ResponseBodySnafu { method, uri, code })?;
        String::from_utf8(body.to_vec()).context(error::NonUtf8ResponseSnafu)
    } else {
        let response_body = match response.bytes().await {
            Ok(body) => printable_string(&body),
            Err(_) => "<unreadable>".to_string(),
        };
        error::ResponseSnafu {
            method,
            uri,
            code,
            response_body,
        }
        .fail()
    }
}

/// Derives the region from a zone path by taking the substring after the
/// `/zones/` marker and dropping the trailing zone-letter suffix.
/// (ex. `projects/12345/zones/us-central1-a` -> `us-central1`)
fn region_from_zone(zone: &str) -> String {
    let zone = zone.split_once("/zones/").map(|(_, tail)| tail).unwrap_or(zone);
    match zone.rsplit_once('-') {
        Some((region, _suffix)) => region.to_string(),
        None => zone.to_string(),
    }
}

/// Converts `bytes` to a `String` if it is a UTF-8 encoded string.
/// Truncates the string if it is too long for an error message.
fn printable_string(bytes: &[u8]) -> String {
    if let Ok(s) = String::from_utf8(bytes.into()) {
        if s.len() < 2048 {
            s
        } else {
            format!("{}<truncated...>", &s[0..2034])
        }
    } else {
        "<binary>".to_string()
    }
}

mod error {
    use http::StatusCode;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Unable to decode base64 in secret payload: {}", source))]
        Base64Decode { source: base64::DecodeError },

        #[snafu(display("Response missing expected field '{}'", field))]
        MissingField { field: &'static str },

        #[snafu(display("Response was not UTF-8: {}", source))]
        NonUtf8Response { source: std::string::FromUtf8Error },

        #[snafu(display("Error {}ing '{}': {}", method, uri, source))]
        Request {
            method: String,
            uri: String,
            source: reqwest::Error,
        },

        #[snafu(display("Error {} when {}ing '{}': {}", code, method, uri, response_body))]
        Response {
            method: String,
            uri: String,
            code: StatusCode,
            response_body: String,
        },

        #[snafu(display(
            "Unable to read response body when {}ing '{}' (code {}) - {}",
            method,
            uri,
            code,
            source
        ))]
        ResponseBody {
            method: String,
            uri: String,
            code: StatusCode,
            source: reqwest::Error,
        },

        #[snafu(display("Deserialization error: {}", source))]
        Serde { source: serde_json::Error },
    }
}

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
