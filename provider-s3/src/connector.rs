//! S3-compatible store connector implementation
//!
//! Implements the `ObjectStore` trait against any S3-compatible HTTP
//! endpoint (ListObjectsV2 + object GET/HEAD).

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use bridge_traits::store::{ObjectBody, ObjectStore, RemoteObject};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::S3Error;
use crate::types::ListBucketResult;

/// Maximum results per listing page (S3 API limit)
const MAX_KEYS: u32 = 1000;

/// Timeout for metadata requests (listing, HEAD)
const METADATA_TIMEOUT: Duration = Duration::from_secs(30);

/// S3-compatible store connector
///
/// # Features
///
/// - Paginated listing via ListObjectsV2 continuation tokens
/// - Streaming object downloads with declared size/digest from HEAD
/// - Listing hygiene: directory markers and zero-byte objects are dropped
/// - Static bearer-token authentication (issued at provisioning time)
///
/// # Example
///
/// ```ignore
/// use provider_s3::S3Connector;
/// use bridge_traits::store::ObjectStore;
///
/// let connector = S3Connector::new(http_client, endpoint, bucket, token);
/// let objects = connector.list("lobby/dev1/media/").await?;
/// ```
pub struct S3Connector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Base URL of the store endpoint, no trailing slash
    endpoint: String,

    /// Bucket name
    bucket: String,

    /// Optional static bearer token
    access_token: Option<String>,
}

impl S3Connector {
    /// Create a new connector.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_token: Option<String>,
    ) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            http_client,
            access_token,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    fn list_url(&self, prefix: &str, continuation: Option<&str>) -> String {
        let mut url = format!(
            "{}/{}?list-type=2&prefix={}&max-keys={}",
            self.endpoint,
            self.bucket,
            urlencoding::encode(prefix),
            MAX_KEYS
        );
        if let Some(token) = continuation {
            url.push_str(&format!(
                "&continuation-token={}",
                urlencoding::encode(token)
            ));
        }
        url
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        let mut request = HttpRequest::new(method, url).timeout(METADATA_TIMEOUT);
        if let Some(token) = &self.access_token {
            request = request.bearer_token(token);
        }
        request
    }

    fn auth_headers(&self) -> std::collections::HashMap<String, String> {
        let mut headers = std::collections::HashMap::new();
        if let Some(token) = &self.access_token {
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }
        headers
    }

    /// Parse RFC 3339 timestamp to Unix timestamp
    fn parse_timestamp(rfc3339: &str) -> Option<i64> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).timestamp())
    }

    /// Interpret an ETag as a SHA-256 hex digest when it has that shape.
    ///
    /// Stores that checksum with SHA-256 report it here; multipart or
    /// MD5-style tags do not match and yield no digest, pushing the diff
    /// onto its size + timestamp fallback.
    fn digest_from_etag(etag: &str) -> Option<String> {
        let trimmed = etag.trim_matches('"');
        if trimmed.len() == 64 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(trimmed.to_ascii_lowercase())
        } else {
            None
        }
    }
}

#[async_trait]
impl ObjectStore for S3Connector {
    #[instrument(skip(self))]
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;
        let mut pages = 0u32;

        loop {
            pages += 1;
            let url = self.list_url(prefix, continuation.as_deref());
            debug!(page = pages, "Fetching listing page");

            let response = self
                .http_client
                .execute_with_retry(self.request(HttpMethod::Get, url), RetryPolicy::default())
                .await
                .map_err(|e| BridgeError::Unavailable(e.to_string()))?;

            if !response.is_success() {
                return Err(S3Error::ApiError {
                    status_code: response.status,
                    message: response.text().unwrap_or_default(),
                }
                .into());
            }

            let text = response
                .text()
                .map_err(|e| S3Error::ParseError(e.to_string()))?;
            let page: ListBucketResult = quick_xml::de::from_str(&text)
                .map_err(|e| S3Error::ParseError(e.to_string()))?;

            for entry in page.contents {
                // Directory markers and empty objects are not playable
                // content.
                if entry.key.ends_with('/') || entry.size == 0 {
                    debug!(key = %entry.key, "Skipping non-content listing entry");
                    continue;
                }
                objects.push(RemoteObject {
                    digest: entry.e_tag.as_deref().and_then(Self::digest_from_etag),
                    modified_at: entry
                        .last_modified
                        .as_deref()
                        .and_then(Self::parse_timestamp),
                    size: entry.size,
                    key: entry.key,
                });
            }

            if !page.is_truncated {
                break;
            }
            continuation = page.next_continuation_token;
            if continuation.is_none() {
                warn!("Truncated listing without continuation token");
                break;
            }
        }

        info!(objects = objects.len(), pages, "Listed remote objects");
        Ok(objects)
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn fetch(&self, key: &str) -> Result<ObjectBody> {
        let url = self.object_url(key);

        // HEAD first: existence check plus the declared size/digest the
        // downloaded bytes will be verified against.
        let head = self
            .http_client
            .execute(self.request(HttpMethod::Head, url.clone()))
            .await
            .map_err(|e| BridgeError::Unavailable(e.to_string()))?;

        match head.status {
            200 => {}
            404 => {
                return Err(S3Error::ObjectNotFound {
                    key: key.to_string(),
                }
                .into())
            }
            status => {
                return Err(S3Error::ApiError {
                    status_code: status,
                    message: head.text().unwrap_or_default(),
                }
                .into())
            }
        }

        let declared_size = head
            .header("Content-Length")
            .and_then(|v| v.parse::<u64>().ok());
        let digest = head.header("ETag").and_then(Self::digest_from_etag);

        let reader = self
            .http_client
            .download_stream(url, self.auth_headers())
            .await
            .map_err(|e| BridgeError::Unavailable(e.to_string()))?;

        debug!(?declared_size, has_digest = digest.is_some(), "Opened object stream");
        Ok(ObjectBody {
            declared_size,
            digest,
            reader,
        })
    }
}
